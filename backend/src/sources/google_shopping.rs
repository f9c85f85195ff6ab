use reqwest::Client as HttpClient;
use scraper::{ElementRef, Html, Selector};
use shared::{Price, ProductRecord, SourceKind};
use url::Url;

use super::price::parse_price_text;
use super::sample::{sample_records, SampleTemplate};
use super::{fetch_text, selector, SourceAdapter, SourceError};

const SEARCH_URL: &str = "https://www.google.com/search";
const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

const SAMPLES: &[SampleTemplate] = &[
    SampleTemplate {
        suffix: "Sample 1",
        price: 1_500_000.0,
        original_price: None,
        rating: 4.2,
        sold: 0,
    },
    SampleTemplate {
        suffix: "Sample 2",
        price: 5_000_000.0,
        original_price: None,
        rating: 4.5,
        sold: 0,
    },
    SampleTemplate {
        suffix: "Sample 3",
        price: 11_000_000.0,
        original_price: None,
        rating: 4.7,
        sold: 0,
    },
];

#[derive(Clone)]
pub struct GoogleShoppingAdapter {
    client: HttpClient,
}

struct CardSelectors {
    card: Selector,
    name: Selector,
    price: Selector,
    merchant: Selector,
    link: Selector,
    image: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self, SourceError> {
        Ok(Self {
            card: selector(".sh-dgr__grid-result")?,
            name: selector(".Xjkr3b")?,
            price: selector(".a8Pemb")?,
            merchant: selector(".aULzUe")?,
            link: selector(".Lq5OHe")?,
            image: selector("img.ArOc1c")?,
        })
    }
}

impl GoogleShoppingAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn search_page_url(query: &str) -> Result<Url, SourceError> {
        Ok(Url::parse_with_params(SEARCH_URL, &[("q", query), ("tbm", "shop")])?)
    }
}

fn inner_text(card: &ElementRef, sel: &Selector) -> Option<String> {
    card.select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn attr(card: &ElementRef, sel: &Selector, name: &str) -> Option<String> {
    card.select(sel)
        .next()
        .and_then(|el| el.value().attr(name))
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

/// Scrapes the shopping results grid. A page with no result cards at all means
/// the markup moved (or we were served a consent/captcha page).
pub fn parse_shopping_page(html: &str, limit: usize) -> Result<Vec<ProductRecord>, SourceError> {
    let document = Html::parse_document(html);
    let selectors = CardSelectors::new()?;

    let cards: Vec<ElementRef> = document.select(&selectors.card).collect();
    if cards.is_empty() {
        return Err(SourceError::FormatChanged(
            "google shopping page has no result cards".into(),
        ));
    }

    let mut products = Vec::new();
    for card in cards {
        if products.len() >= limit {
            break;
        }
        let (Some(title), Some(price_text), Some(link)) = (
            inner_text(&card, &selectors.name),
            inner_text(&card, &selectors.price),
            attr(&card, &selectors.link, "href"),
        ) else {
            log::debug!("Skipping incomplete Google Shopping card");
            continue;
        };

        let product_url = if link.starts_with('/') {
            format!("https://www.google.com{}", link)
        } else {
            link
        };
        let source = match inner_text(&card, &selectors.merchant) {
            Some(merchant) => format!("{} - {}", SourceKind::GoogleShopping.label(), merchant),
            None => SourceKind::GoogleShopping.label().to_string(),
        };
        let price = parse_price_text(&price_text)
            .map(Price::from_amount)
            .unwrap_or_else(Price::unknown);

        products.push(ProductRecord {
            title,
            price,
            price_text,
            original_price: None,
            image_url: attr(&card, &selectors.image, "src").unwrap_or_default(),
            product_url,
            source,
            rating: None,
            sold_count: None,
            sample: false,
        });
    }
    Ok(products)
}

impl SourceAdapter for GoogleShoppingAdapter {
    const KIND: SourceKind = SourceKind::GoogleShopping;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        log::info!("Searching Google Shopping for '{}' (limit {})", query, limit);
        let url = Self::search_page_url(query)?;
        let html = fetch_text(&self.client, url.as_str()).await?;
        parse_shopping_page(&html, limit)
    }

    fn sample_products(&self, query: &str, limit: usize) -> Vec<ProductRecord> {
        let search_url = Self::search_page_url(query)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| SEARCH_URL.to_string());
        sample_records(Self::KIND, query, limit, SAMPLES, &search_url, PLACEHOLDER_IMAGE)
    }
}
