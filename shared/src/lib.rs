use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    #[serde(default)]
    pub class_id: String,
    /// Percentage in `0..=100`.
    pub confidence: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ClassificationResult {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

/// The closed set of product catalogs the backend knows how to query.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SourceKind {
    Shopee,
    Lazada,
    Tiki,
    GoogleShopping,
}

impl SourceKind {
    pub fn all() -> Vec<SourceKind> {
        SourceKind::iter().collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Shopee => "Shopee",
            SourceKind::Lazada => "Lazada",
            SourceKind::Tiki => "Tiki",
            SourceKind::GoogleShopping => "Google Shopping",
        }
    }

    /// Source string carried by synthetic records.
    pub fn sample_label(&self) -> String {
        format!("{} (sample data)", self.label())
    }
}

pub const UNKNOWN_PRICE: &str = "unknown";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Price {
    Amount(f64),
    Display(String),
}

impl Price {
    pub fn from_amount(amount: f64) -> Self {
        if amount.is_finite() && amount >= 0.0 {
            Price::Amount(amount)
        } else {
            Price::unknown()
        }
    }

    pub fn unknown() -> Self {
        Price::Display(UNKNOWN_PRICE.to_string())
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            Price::Amount(v) => Some(*v),
            Price::Display(_) => None,
        }
    }
}

impl Default for Price {
    fn default() -> Self {
        Price::unknown()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProductRecord {
    pub title: String,
    pub price: Price,
    #[serde(default)]
    pub price_text: String,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub product_url: String,
    pub source: String,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub sold_count: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sample: bool,
}

impl ProductRecord {
    pub fn is_on_sale(&self) -> bool {
        match (self.original_price, self.price.amount()) {
            (Some(original), Some(price)) => original > price,
            _ => false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub classification_id: Option<String>,
    #[serde(default)]
    pub num_products: Option<usize>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub include_categories: Option<bool>,
    #[serde(default)]
    pub use_cache: Option<bool>,
}

/// A record in a cross-source view, tagged with the catalog it came from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CategorizedProduct {
    pub platform: SourceKind,
    #[serde(flatten)]
    pub product: ProductRecord,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PriceRangeBucket {
    pub label: String,
    pub min: f64,
    pub max: Option<f64>,
    pub products: Vec<CategorizedProduct>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Categories {
    pub price_ranges: Vec<PriceRangeBucket>,
    pub by_rating: BTreeMap<SourceKind, Vec<ProductRecord>>,
    pub best_selling: Vec<CategorizedProduct>,
    pub on_sale: Vec<CategorizedProduct>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RecommendationResponse {
    pub success: bool,
    pub based_on: ClassificationResult,
    pub recommendations: BTreeMap<SourceKind, Vec<ProductRecord>>,
    pub search_queries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Categories>,
}
