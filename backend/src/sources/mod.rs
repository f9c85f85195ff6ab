pub mod google_shopping;
pub mod lazada;
pub mod price;
pub mod sample;
pub mod shopee;
pub mod tiki;

use rand::seq::IndexedRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, USER_AGENT,
};
use reqwest::Client as HttpClient;
use scraper::Selector;
use serde_json::Value;
use shared::{ProductRecord, SourceKind};
use std::time::Duration;

use google_shopping::GoogleShoppingAdapter;
use lazada::LazadaAdapter;
use shopee::ShopeeAdapter;
use tiki::TikiAdapter;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("URL building failed: {0}")]
    Url(#[from] url::ParseError),
    #[error("Upstream format changed: {0}")]
    FormatChanged(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::FormatChanged(format!("invalid JSON: {}", err))
    }
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.131 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
];

/// One product catalog behind a single upstream access pattern.
#[allow(async_fn_in_trait)]
pub trait SourceAdapter {
    const KIND: SourceKind;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>, SourceError>;

    /// Flagged placeholder records for when the upstream cannot be reached.
    fn sample_products(&self, query: &str, limit: usize) -> Vec<ProductRecord>;
}

/// Dispatch seam between the recommender and the concrete adapters.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    async fn search(
        &self,
        source: SourceKind,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProductRecord>, SourceError>;

    fn sample_products(&self, source: SourceKind, query: &str, limit: usize) -> Vec<ProductRecord>;
}

#[derive(Clone)]
pub struct SourceRegistry {
    shopee: ShopeeAdapter,
    lazada: LazadaAdapter,
    tiki: TikiAdapter,
    google_shopping: GoogleShoppingAdapter,
}

impl SourceRegistry {
    pub fn new(request_timeout: Duration) -> Result<Self, SourceError> {
        let client = build_http_client(request_timeout)?;
        Ok(Self {
            shopee: ShopeeAdapter::new(client.clone()),
            lazada: LazadaAdapter::new(client.clone()),
            tiki: TikiAdapter::new(client.clone()),
            google_shopping: GoogleShoppingAdapter::new(client),
        })
    }
}

impl ProductCatalog for SourceRegistry {
    async fn search(
        &self,
        source: SourceKind,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProductRecord>, SourceError> {
        match source {
            SourceKind::Shopee => self.shopee.search(query, limit).await,
            SourceKind::Lazada => self.lazada.search(query, limit).await,
            SourceKind::Tiki => self.tiki.search(query, limit).await,
            SourceKind::GoogleShopping => self.google_shopping.search(query, limit).await,
        }
    }

    fn sample_products(&self, source: SourceKind, query: &str, limit: usize) -> Vec<ProductRecord> {
        match source {
            SourceKind::Shopee => self.shopee.sample_products(query, limit),
            SourceKind::Lazada => self.lazada.sample_products(query, limit),
            SourceKind::Tiki => self.tiki.sample_products(query, limit),
            SourceKind::GoogleShopping => self.google_shopping.sample_products(query, limit),
        }
    }
}

pub fn build_http_client(request_timeout: Duration) -> Result<HttpClient, SourceError> {
    let client = HttpClient::builder()
        .timeout(request_timeout)
        .connect_timeout(request_timeout)
        .build()?;
    Ok(client)
}

/// Browser-like headers with a rotated User-Agent.
fn browser_headers() -> HeaderMap {
    let user_agent = USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,vi;q=0.8"),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

pub(crate) async fn fetch_text(client: &HttpClient, url: &str) -> Result<String, SourceError> {
    log::debug!("GET {}", url);
    let response = client.get(url).headers(browser_headers()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status));
    }
    Ok(response.text().await?)
}

pub(crate) async fn fetch_json(client: &HttpClient, url: &str) -> Result<Value, SourceError> {
    let body = fetch_text(client, url).await?;
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css)
        .map_err(|e| SourceError::FormatChanged(format!("bad selector {}: {:?}", css, e)))
}

/// Title with a per-source default for blank upstream names.
pub(crate) fn title_or_default(title: Option<&str>, source: SourceKind) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => format!("{} product", source.label()),
    }
}

pub(crate) fn json_str(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Accepts plain numbers as well as display strings such as `"₫299.000"`.
pub(crate) fn json_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .or_else(|| price::parse_price_text(s)),
        _ => None,
    }
}

pub(crate) fn json_u64(value: Option<&Value>) -> Option<u64> {
    match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Some(Value::String(s)) => price::parse_count(s),
        _ => None,
    }
}
