use shared::{Categories, CategorizedProduct, PriceRangeBucket, ProductRecord, SourceKind};
use std::collections::BTreeMap;

const BEST_SELLING_LIMIT: usize = 10;

/// VND price buckets, lower bound inclusive.
const PRICE_RANGES: &[(&str, f64, Option<f64>)] = &[
    ("under_100k", 0.0, Some(100_000.0)),
    ("100k_500k", 100_000.0, Some(500_000.0)),
    ("500k_1m", 500_000.0, Some(1_000_000.0)),
    ("1m_5m", 1_000_000.0, Some(5_000_000.0)),
    ("5m_10m", 5_000_000.0, Some(10_000_000.0)),
    ("over_10m", 10_000_000.0, None),
];

fn bucket_index(price: f64) -> Option<usize> {
    PRICE_RANGES
        .iter()
        .position(|(_, min, max)| price >= *min && max.is_none_or(|max| price < max))
}

/// Builds the derived views over the merged per-source lists. The input is
/// only read; every view holds its own copies.
pub fn categorize(recommendations: &BTreeMap<SourceKind, Vec<ProductRecord>>) -> Categories {
    let all_products: Vec<CategorizedProduct> = recommendations
        .iter()
        .flat_map(|(platform, products)| {
            products.iter().map(|product| CategorizedProduct {
                platform: *platform,
                product: product.clone(),
            })
        })
        .collect();

    let mut price_ranges: Vec<PriceRangeBucket> = PRICE_RANGES
        .iter()
        .map(|(label, min, max)| PriceRangeBucket {
            label: label.to_string(),
            min: *min,
            max: *max,
            products: Vec::new(),
        })
        .collect();
    for entry in &all_products {
        if let Some(index) = entry.product.price.amount().and_then(bucket_index) {
            price_ranges[index].products.push(entry.clone());
        }
    }

    let by_rating = recommendations
        .iter()
        .map(|(platform, products)| {
            let mut sorted = products.clone();
            sorted.sort_by(|a, b| {
                let a = a.rating.unwrap_or(0.0);
                let b = b.rating.unwrap_or(0.0);
                b.total_cmp(&a)
            });
            (*platform, sorted)
        })
        .collect();

    let mut best_selling = all_products.clone();
    best_selling.sort_by(|a, b| {
        b.product
            .sold_count
            .unwrap_or(0)
            .cmp(&a.product.sold_count.unwrap_or(0))
    });
    best_selling.truncate(BEST_SELLING_LIMIT);

    let on_sale = all_products
        .into_iter()
        .filter(|entry| entry.product.is_on_sale())
        .collect();

    Categories {
        price_ranges,
        by_rating,
        best_selling,
        on_sale,
    }
}
