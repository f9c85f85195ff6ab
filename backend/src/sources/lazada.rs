use reqwest::Client as HttpClient;
use scraper::Html;
use serde_json::Value;
use shared::{ProductRecord, SourceKind};

use super::price::price_fields;
use super::sample::{sample_records, SampleTemplate};
use super::{
    fetch_text, json_f64, json_str, json_u64, selector, title_or_default, SourceAdapter,
    SourceError,
};

const PAGE_DATA_MARKER: &str = "window.pageData=";
const PLACEHOLDER_IMAGE: &str = "https://lzd-img-global.slatic.net/placeholder_image";

const SAMPLES: &[SampleTemplate] = &[
    SampleTemplate {
        suffix: "Premium",
        price: 349_000.0,
        original_price: Some(499_000.0),
        rating: 4.6,
        sold: 80,
    },
    SampleTemplate {
        suffix: "Imported",
        price: 599_000.0,
        original_price: Some(799_000.0),
        rating: 4.7,
        sold: 65,
    },
];

#[derive(Clone)]
pub struct LazadaAdapter {
    client: HttpClient,
}

impl LazadaAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn search_page_url(query: &str) -> String {
        format!(
            "https://www.lazada.vn/catalog/?q={}",
            urlencoding::encode(query)
        )
    }
}

/// Pulls the `window.pageData=` blob embedded in a catalog page.
fn extract_page_data(html: &str) -> Result<Value, SourceError> {
    let document = Html::parse_document(html);
    let script_sel = selector("script")?;

    for script in document.select(&script_sel) {
        let text = script.text().collect::<String>();
        let Some(start) = text.find(PAGE_DATA_MARKER) else {
            continue;
        };
        let json_text = text[start + PAGE_DATA_MARKER.len()..].trim_start();
        // Only the first JSON value matters; trailing `;` and statements are ignored.
        let mut stream = serde_json::Deserializer::from_str(json_text).into_iter::<Value>();
        return match stream.next() {
            Some(Ok(data)) => Ok(data),
            Some(Err(e)) => Err(e.into()),
            None => Err(SourceError::FormatChanged("empty lazada page data".into())),
        };
    }

    Err(SourceError::FormatChanged(
        "lazada page has no pageData script".into(),
    ))
}

pub fn parse_catalog_page(
    html: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<ProductRecord>, SourceError> {
    let data = extract_page_data(html)?;
    let items = data
        .pointer("/mods/listItems")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::FormatChanged("lazada pageData has no mods.listItems".into()))?;

    Ok(items
        .iter()
        .filter(|item| item.is_object())
        .take(limit)
        .map(|item| to_record(item, query))
        .collect())
}

fn to_record(item: &Value, query: &str) -> ProductRecord {
    let name = json_str(item.get("name"));
    let title = title_or_default(Some(name.as_str()), SourceKind::Lazada);

    let amount = json_f64(item.get("price"));
    let (price, price_text) = price_fields(amount);
    let original_price = json_f64(item.get("originalPrice"))
        .filter(|original| price.amount().is_none_or(|value| *original > value));

    let item_url = json_str(item.get("itemUrl"));
    let nid = json_str(item.get("nid"));
    let product_url = if item_url.starts_with("//") {
        format!("https:{}", item_url)
    } else if item_url.starts_with("http") {
        item_url
    } else if !nid.is_empty() {
        format!("https://www.lazada.vn/products/{}", nid)
    } else {
        LazadaAdapter::search_page_url(query)
    };

    let sold_count =
        json_u64(item.get("sold")).or_else(|| json_u64(item.get("itemSoldCntShow")));

    ProductRecord {
        title,
        price,
        price_text,
        original_price,
        image_url: json_str(item.get("image")),
        product_url,
        source: SourceKind::Lazada.label().to_string(),
        rating: json_f64(item.get("ratingScore")).map(|r| r as f32),
        sold_count,
        sample: false,
    }
}

impl SourceAdapter for LazadaAdapter {
    const KIND: SourceKind = SourceKind::Lazada;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        log::info!("Searching Lazada for '{}' (limit {})", query, limit);
        let html = fetch_text(&self.client, &Self::search_page_url(query)).await?;
        parse_catalog_page(&html, query, limit)
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
