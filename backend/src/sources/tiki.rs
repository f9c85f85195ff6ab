use reqwest::Client as HttpClient;
use serde_json::Value;
use shared::{ProductRecord, SourceKind};
use url::Url;

use super::price::price_fields;
use super::sample::{sample_records, SampleTemplate};
use super::{
    fetch_json, json_f64, json_str, json_u64, title_or_default, SourceAdapter, SourceError,
};

const PRODUCTS_API: &str = "https://tiki.vn/api/v2/products";
const PLACEHOLDER_IMAGE: &str = "https://salt.tikicdn.com/cache/280x280/placeholder_image.jpg";

const SAMPLES: &[SampleTemplate] = &[
    SampleTemplate {
        suffix: "Official store",
        price: 419_000.0,
        original_price: Some(519_000.0),
        rating: 4.8,
        sold: 95,
    },
    SampleTemplate {
        suffix: "2h delivery",
        price: 559_000.0,
        original_price: Some(659_000.0),
        rating: 4.5,
        sold: 70,
    },
];

#[derive(Clone)]
pub struct TikiAdapter {
    client: HttpClient,
}

impl TikiAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn search_page_url(query: &str) -> String {
        format!("https://tiki.vn/search?q={}", urlencoding::encode(query))
    }

    fn api_url(query: &str, limit: usize) -> Result<Url, SourceError> {
        let limit = limit.to_string();
        Ok(Url::parse_with_params(
            PRODUCTS_API,
            &[("limit", limit.as_str()), ("q", query)],
        )?)
    }
}

pub fn parse_products_response(
    body: &Value,
    query: &str,
    limit: usize,
) -> Result<Vec<ProductRecord>, SourceError> {
    let items = match body.get("data") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) => return Ok(Vec::new()),
        _ => {
            return Err(SourceError::FormatChanged(
                "tiki response has no `data` array".into(),
            ));
        }
    };

    Ok(items
        .iter()
        .filter(|item| item.is_object())
        .take(limit)
        .map(|item| to_record(item, query))
        .collect())
}

fn to_record(item: &Value, query: &str) -> ProductRecord {
    let name = json_str(item.get("name"));
    let amount = json_f64(item.get("price"));
    let (price, price_text) = price_fields(amount);
    let original_price = json_f64(item.get("original_price"))
        .filter(|original| price.amount().is_some_and(|value| *original > value));

    let url_path = json_str(item.get("url_path"));
    let product_url = if url_path.is_empty() {
        TikiAdapter::search_page_url(query)
    } else {
        format!("https://tiki.vn/{}", url_path.trim_start_matches('/'))
    };

    ProductRecord {
        title: title_or_default(Some(name.as_str()), SourceKind::Tiki),
        price,
        price_text,
        original_price,
        image_url: json_str(item.get("thumbnail_url")),
        product_url,
        source: SourceKind::Tiki.label().to_string(),
        rating: json_f64(item.get("rating_average")).map(|r| r as f32),
        sold_count: json_u64(item.pointer("/quantity_sold/value")),
        sample: false,
    }
}

impl SourceAdapter for TikiAdapter {
    const KIND: SourceKind = SourceKind::Tiki;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        log::info!("Searching Tiki for '{}' (limit {})", query, limit);
        let url = Self::api_url(query, limit)?;
        let body = fetch_json(&self.client, url.as_str()).await?;
        parse_products_response(&body, query, limit)
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
