use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use shared::{ProductRecord, SourceKind};
use url::Url;

use super::price::price_fields;
use super::sample::{sample_records, SampleTemplate};
use super::{fetch_json, title_or_default, SourceAdapter, SourceError};

const SEARCH_API: &str = "https://shopee.vn/api/v4/search/search_items";
const IMAGE_BASE: &str = "https://cf.shopee.vn/file";
const PLACEHOLDER_IMAGE: &str = "https://cf.shopee.vn/file/placeholder_image";
// Shopee reports prices in units of 1/100000 VND.
const PRICE_SCALE: f64 = 100_000.0;

const SAMPLES: &[SampleTemplate] = &[
    SampleTemplate {
        suffix: "High quality",
        price: 299_000.0,
        original_price: Some(399_000.0),
        rating: 4.8,
        sold: 150,
    },
    SampleTemplate {
        suffix: "Genuine product",
        price: 499_000.0,
        original_price: Some(599_000.0),
        rating: 4.7,
        sold: 120,
    },
];

#[derive(Clone)]
pub struct ShopeeAdapter {
    client: HttpClient,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchItem {
    item_basic: Option<ItemBasic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemBasic {
    name: Option<String>,
    image: Option<String>,
    shopid: Option<u64>,
    itemid: Option<u64>,
    price: Option<f64>,
    price_before_discount: Option<f64>,
    item_rating: Option<ItemRating>,
    historical_sold: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemRating {
    rating_star: Option<f32>,
}

impl ShopeeAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn search_page_url(query: &str) -> String {
        format!(
            "https://shopee.vn/search?keyword={}",
            urlencoding::encode(query)
        )
    }

    fn api_url(query: &str, limit: usize) -> Result<Url, SourceError> {
        let limit = limit.to_string();
        let url = Url::parse_with_params(
            SEARCH_API,
            &[
                ("by", "relevancy"),
                ("keyword", query),
                ("limit", limit.as_str()),
                ("newest", "0"),
                ("order", "desc"),
                ("page_type", "search"),
                ("scenario", "PAGE_GLOBAL_SEARCH"),
                ("version", "2"),
            ],
        )?;
        Ok(url)
    }
}

/// Maps a `search_items` payload to records. A missing `items` key means the
/// API shape moved; `items: null` is Shopee's way of saying "no results".
pub fn parse_search_response(
    body: &Value,
    query: &str,
    limit: usize,
) -> Result<Vec<ProductRecord>, SourceError> {
    let items = match body.get("items") {
        None => {
            return Err(SourceError::FormatChanged(
                "shopee response has no `items` field".into(),
            ));
        }
        Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(SourceError::FormatChanged(
                "shopee `items` is not an array".into(),
            ));
        }
    };

    let mut products = Vec::new();
    for raw in items {
        if products.len() >= limit {
            break;
        }
        let item: SearchItem = match serde_json::from_value(raw.clone()) {
            Ok(item) => item,
            Err(e) => {
                log::debug!("Skipping malformed Shopee item: {}", e);
                continue;
            }
        };
        if let Some(basic) = item.item_basic {
            products.push(to_record(basic, query));
        }
    }
    Ok(products)
}

fn to_record(basic: ItemBasic, query: &str) -> ProductRecord {
    let title = title_or_default(basic.name.as_deref(), SourceKind::Shopee);

    let amount = basic.price.map(|p| p / PRICE_SCALE);
    let (price, price_text) = price_fields(amount);
    let original_price = basic
        .price_before_discount
        .map(|p| p / PRICE_SCALE)
        .filter(|original| {
            *original > 0.0 && price.amount().is_none_or(|value| *original > value)
        });

    let image_url = match basic.image.as_deref() {
        Some(image) if !image.is_empty() => format!("{}/{}", IMAGE_BASE, image),
        _ => String::new(),
    };
    let product_url = match (basic.shopid, basic.itemid) {
        (Some(shop_id), Some(item_id)) => format!(
            "https://shopee.vn/{}-i.{}.{}",
            urlencoding::encode(&title.replace(' ', "-")),
            shop_id,
            item_id
        ),
        _ => ShopeeAdapter::search_page_url(query),
    };

    ProductRecord {
        title,
        price,
        price_text,
        original_price,
        image_url,
        product_url,
        source: SourceKind::Shopee.label().to_string(),
        rating: basic.item_rating.and_then(|r| r.rating_star),
        sold_count: basic.historical_sold,
        sample: false,
    }
}

impl SourceAdapter for ShopeeAdapter {
    const KIND: SourceKind = SourceKind::Shopee;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        log::info!("Searching Shopee for '{}' (limit {})", query, limit);
        let url = Self::api_url(query, limit)?;
        let body = fetch_json(&self.client, url.as_str()).await?;
        parse_search_response(&body, query, limit)
    }

    fn sample_products(&self, query: &str, limit: usize) -> Vec<ProductRecord> {
        sample_records(
            Self::KIND,
            query,
            limit,
            SAMPLES,
            &Self::search_page_url(query),
            PLACEHOLDER_IMAGE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::Price;

    #[test]
    fn parses_search_items() {
        let body = json!({
            "items": [
                {"item_basic": {
                    "name": "Laptop Dell Inspiron",
                    "image": "abc123",
                    "shopid": 11,
                    "itemid": 22,
                    "price": 1599000000000u64,
                    "price_before_discount": 1899000000000u64,
                    "item_rating": {"rating_star": 4.9},
                    "historical_sold": 321
                }},
                {"item_basic": {"name": "Balo laptop"}},
                {"item_basic": {"name": "Third"}}
            ]
        });
        let records = parse_search_response(&body, "laptop", 2).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title, "Laptop Dell Inspiron");
        assert_eq!(first.price, Price::Amount(15_990_000.0));
        assert_eq!(first.price_text, "15.990.000đ");
        assert_eq!(first.original_price, Some(18_990_000.0));
        assert_eq!(first.image_url, "https://cf.shopee.vn/file/abc123");
        assert_eq!(first.product_url, "https://shopee.vn/Laptop-Dell-Inspiron-i.11.22");
        assert_eq!(first.rating, Some(4.9));
        assert_eq!(first.sold_count, Some(321));
        assert_eq!(first.source, "Shopee");
        assert!(!first.sample);

        let second = &records[1];
        assert_eq!(second.price, Price::unknown());
        assert_eq!(second.original_price, None);
        assert_eq!(second.product_url, "https://shopee.vn/search?keyword=laptop");
        assert_eq!(second.rating, None);
    }

    #[test]
    fn null_items_means_no_results() {
        let records = parse_search_response(&json!({"items": null}), "x", 5).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_items_is_format_change() {
        let err = parse_search_response(&json!({"error": 90309999}), "x", 5).unwrap_err();
        assert!(matches!(err, SourceError::FormatChanged(_)));
    }

    #[test]
    fn blank_names_get_default_title() {
        let body = json!({"items": [{"item_basic": {"name": "", "price": 100000000}}]});
        let records = parse_search_response(&body, "x", 5).unwrap();
        assert_eq!(records[0].title, "Shopee product");
        assert_eq!(records[0].price, Price::Amount(1000.0));
    }

    #[test]
    fn api_url_encodes_query() {
        let url = ShopeeAdapter::api_url("máy tính xách tay", 3).unwrap();
        let keyword = url
            .query_pairs()
            .find(|(k, _)| k == "keyword")
            .map(|(_, v)| v.into_owned());
        assert_eq!(keyword.as_deref(), Some("máy tính xách tay"));
        assert!(url.as_str().contains("limit=3"));
    }

    #[test]
    fn product_url_slug_is_escaped() {
        let body = json!({
            "items": [{"item_basic": {"name": "Ốp lưng 50/50 ?mới #1", "shopid": 1, "itemid": 2}}]
        });
        let records = parse_search_response(&body, "x", 5).unwrap();
        let url = &records[0].product_url;
        assert_eq!(
            url,
            "https://shopee.vn/%E1%BB%90p-l%C6%B0ng-50%2F50-%3Fm%E1%BB%9Bi-%231-i.1.2"
        );
        assert!(Url::parse(url).unwrap().query().is_none());
    }
}
