use shared::{Price, ProductRecord, SourceKind};

use super::price::format_vnd;

pub struct SampleTemplate {
    pub suffix: &'static str,
    pub price: f64,
    pub original_price: Option<f64>,
    pub rating: f32,
    pub sold: u64,
}

/// Deterministic placeholder records, flagged as samples and pointing at the
/// source's own search page for `query`.
pub fn sample_records(
    source: SourceKind,
    query: &str,
    limit: usize,
    templates: &[SampleTemplate],
    search_url: &str,
    image_url: &str,
) -> Vec<ProductRecord> {
    templates
        .iter()
        .take(limit)
        .map(|template| ProductRecord {
            title: format!("{} - {}", query.trim(), template.suffix),
            price: Price::from_amount(template.price),
            price_text: format_vnd(template.price),
            original_price: template.original_price,
            image_url: image_url.to_string(),
            product_url: search_url.to_string(),
            source: source.sample_label(),
            rating: Some(template.rating),
            sold_count: Some(template.sold),
            sample: true,
        })
        .collect()
}
