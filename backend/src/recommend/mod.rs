pub mod categories;
pub mod translator;

use futures::future::join_all;
use log::{debug, info, warn};
use shared::{
    Categories, ClassificationResult, Prediction, ProductRecord, RecommendationResponse,
    SourceKind,
};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use crate::cache::cache_service::CacheService;
use crate::sources::ProductCatalog;
use translator::LabelTranslator;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecommendError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Resolves source names, dropping repeats but keeping request order.
pub fn parse_sources(names: &[String]) -> Result<Vec<SourceKind>, RecommendError> {
    let mut sources = Vec::with_capacity(names.len());
    for name in names {
        let source = SourceKind::from_str(name.trim())
            .map_err(|_| RecommendError::UnknownSource(name.clone()))?;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    Ok(sources)
}

#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub num_products: usize,
    pub sources: Vec<SourceKind>,
    pub include_categories: bool,
    pub use_cache: bool,
}

#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub based_on: ClassificationResult,
    pub recommendations: BTreeMap<SourceKind, Vec<ProductRecord>>,
    pub search_queries: Vec<String>,
    pub categories: Option<Categories>,
}

impl From<AggregateResult> for RecommendationResponse {
    fn from(result: AggregateResult) -> Self {
        RecommendationResponse {
            success: true,
            based_on: result.based_on,
            recommendations: result.recommendations,
            search_queries: result.search_queries,
            categories: result.categories,
        }
    }
}

pub struct Recommender<C> {
    catalog: C,
    cache: Option<CacheService>,
    translator: LabelTranslator,
    top_k: usize,
    sample_fallback: bool,
}

impl<C: ProductCatalog> Recommender<C> {
    pub fn new(catalog: C, translator: LabelTranslator, top_k: usize) -> Self {
        Self {
            catalog,
            cache: None,
            translator,
            top_k: top_k.max(1),
            sample_fallback: false,
        }
    }

    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace failed upstream calls with flagged sample records.
    pub fn with_sample_fallback(mut self, enabled: bool) -> Self {
        self.sample_fallback = enabled;
        self
    }

    pub fn cache(&self) -> Option<&CacheService> {
        self.cache.as_ref()
    }

    pub fn sample_fallback(&self) -> bool {
        self.sample_fallback
    }

    pub async fn recommend(
        &self,
        classification: &ClassificationResult,
        options: &RecommendOptions,
    ) -> Result<AggregateResult, RecommendError> {
        validate(classification, options)?;

        let class_names = self.top_class_names(&classification.predictions);
        let search_queries = self.translator.translate(&class_names);
        if search_queries.is_empty() {
            return Err(RecommendError::InvalidInput(
                "no search queries could be built".into(),
            ));
        }
        info!("Built search queries: {:?}", search_queries);

        let per_query_limit = (options.num_products / search_queries.len()).max(1);

        let mut sources: Vec<SourceKind> = Vec::with_capacity(options.sources.len());
        for source in &options.sources {
            if !sources.contains(source) {
                sources.push(*source);
            }
        }

        let calls: Vec<(SourceKind, &str)> = sources
            .iter()
            .flat_map(|source| search_queries.iter().map(|query| (*source, query.as_str())))
            .collect();
        let results = join_all(calls.iter().map(|(source, query)| {
            self.fetch(*source, query, per_query_limit, options.use_cache)
        }))
        .await;

        let mut recommendations: BTreeMap<SourceKind, Vec<ProductRecord>> =
            sources.iter().map(|source| (*source, Vec::new())).collect();
        for ((source, _), records) in calls.iter().zip(results) {
            if let Some(merged) = recommendations.get_mut(source) {
                merged.extend(records);
            }
        }

        for (source, records) in recommendations.iter_mut() {
            let mut seen = HashSet::new();
            records.retain(|r| seen.insert((r.title.clone(), r.product_url.clone())));
            records.truncate(options.num_products);
            info!("{} records from {}", records.len(), source);
        }

        let categories = options
            .include_categories
            .then(|| categories::categorize(&recommendations));

        Ok(AggregateResult {
            based_on: classification.clone(),
            recommendations,
            search_queries,
            categories,
        })
    }

    fn top_class_names(&self, predictions: &[Prediction]) -> Vec<String> {
        let mut ranked: Vec<&Prediction> = predictions.iter().collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked
            .into_iter()
            .take(self.top_k)
            .map(|p| p.class_name.clone())
            .collect()
    }

    async fn fetch(
        &self,
        source: SourceKind,
        query: &str,
        limit: usize,
        use_cache: bool,
    ) -> Vec<ProductRecord> {
        let cache = self.cache.as_ref().filter(|_| use_cache);

        if let Some(cache) = cache {
            if let Some(cached) = cache.get_covering(source, query, limit).await {
                return cached;
            }
        }

        debug!("Searching {} for '{}' (limit {})", source, query, limit);
        match self.catalog.search(source, query, limit).await {
            Ok(records) => {
                if let Some(cache) = cache {
                    if !records.is_empty() {
                        cache.put_fetched(source, query, records.clone(), limit).await;
                    }
                }
                records
            }
            Err(e) => {
                warn!("Search on {} for '{}' failed: {}", source, query, e);
                if self.sample_fallback {
                    self.catalog.sample_products(source, query, limit)
                } else {
                    Vec::new()
                }
            }
        }
    }
}

fn validate(
    classification: &ClassificationResult,
    options: &RecommendOptions,
) -> Result<(), RecommendError> {
    if classification.predictions.is_empty() {
        return Err(RecommendError::InvalidInput(
            "classification result has no predictions".into(),
        ));
    }
    for prediction in &classification.predictions {
        if prediction.class_name.trim().is_empty() {
            return Err(RecommendError::InvalidInput(
                "prediction with an empty class_name".into(),
            ));
        }
        if !prediction.confidence.is_finite() {
            return Err(RecommendError::InvalidInput(format!(
                "prediction '{}' has a non-finite confidence",
                prediction.class_name
            )));
        }
    }
    if options.num_products == 0 {
        return Err(RecommendError::InvalidInput(
            "num_products must be at least 1".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceError;
    use chrono::Duration;
    use shared::Price;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Call = (SourceKind, String, usize);

    /// Catalog with canned answers keyed by `(source, query)`. Unlisted
    /// keys fail with a 502.
    #[derive(Default)]
    struct StubCatalog {
        answers: HashMap<(SourceKind, String), Vec<ProductRecord>>,
        slow_queries: Vec<String>,
        calls: Mutex<Vec<Call>>,
    }

    impl StubCatalog {
        fn answer(mut self, source: SourceKind, query: &str, titles: &[&str]) -> Self {
            let records = titles.iter().map(|t| record(t, source)).collect();
            self.answers.insert((source, query.to_string()), records);
            self
        }

        fn slow(mut self, query: &str) -> Self {
            self.slow_queries.push(query.to_string());
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProductCatalog for StubCatalog {
        async fn search(
            &self,
            source: SourceKind,
            query: &str,
            limit: usize,
        ) -> Result<Vec<ProductRecord>, SourceError> {
            self.calls
                .lock()
                .unwrap()
                .push((source, query.to_string(), limit));
            if self.slow_queries.iter().any(|q| q == query) {
                actix_web::rt::time::sleep(std::time::Duration::from_millis(30)).await;
            }
            match self.answers.get(&(source, query.to_string())) {
                Some(records) => Ok(records.iter().take(limit).cloned().collect()),
                None => Err(SourceError::Status(reqwest::StatusCode::BAD_GATEWAY)),
            }
        }

        fn sample_products(&self, source: SourceKind, query: &str, limit: usize) -> Vec<ProductRecord> {
            (0..limit)
                .map(|i| {
                    let mut r = record(&format!("{} sample {}", query, i), source);
                    r.source = source.sample_label();
                    r.sample = true;
                    r
                })
                .collect()
        }
    }

    fn record(title: &str, source: SourceKind) -> ProductRecord {
        ProductRecord {
            title: title.to_string(),
            price: Price::Amount(200_000.0),
            price_text: "200.000đ".to_string(),
            original_price: None,
            image_url: String::new(),
            product_url: format!("https://example.com/{}/{}", source, title.replace(' ', "-")),
            source: source.label().to_string(),
            rating: None,
            sold_count: None,
            sample: false,
        }
    }

    fn classification(items: &[(&str, f64)]) -> ClassificationResult {
        ClassificationResult {
            predictions: items
                .iter()
                .map(|(name, confidence)| Prediction {
                    class_name: name.to_string(),
                    class_id: String::new(),
                    confidence: *confidence,
                })
                .collect(),
        }
    }

    fn options(num_products: usize, sources: &[SourceKind]) -> RecommendOptions {
        RecommendOptions {
            num_products,
            sources: sources.to_vec(),
            include_categories: false,
            use_cache: true,
        }
    }

    fn plain_translator() -> LabelTranslator {
        LabelTranslator::new(false, Vec::new())
    }

    fn titles(records: &[ProductRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[actix_web::test]
    async fn empty_classification_is_invalid_input() {
        let recommender = Recommender::new(StubCatalog::default(), plain_translator(), 2);
        let result = recommender
            .recommend(&ClassificationResult::default(), &options(4, &[SourceKind::Tiki]))
            .await;
        assert!(matches!(result, Err(RecommendError::InvalidInput(_))));
        assert!(recommender.catalog.calls().is_empty());
    }

    #[actix_web::test]
    async fn rejects_blank_labels_bad_confidence_and_zero_products() {
        let recommender = Recommender::new(StubCatalog::default(), plain_translator(), 2);
        let tiki = [SourceKind::Tiki];

        let blank = classification(&[("  ", 50.0)]);
        assert!(recommender.recommend(&blank, &options(4, &tiki)).await.is_err());

        let nan = classification(&[("Laptop", f64::NAN)]);
        assert!(recommender.recommend(&nan, &options(4, &tiki)).await.is_err());

        let ok = classification(&[("Laptop", 90.0)]);
        let zero = recommender.recommend(&ok, &options(0, &tiki)).await;
        assert!(matches!(zero, Err(RecommendError::InvalidInput(_))));
    }

    #[actix_web::test]
    async fn laptop_and_backpack_split_the_product_budget() {
        let catalog = StubCatalog::default()
            .answer(SourceKind::Shopee, "Laptop", &["l1", "l2", "l3"])
            .answer(SourceKind::Shopee, "Backpack", &["b1", "b2", "b3"]);
        let recommender = Recommender::new(catalog, plain_translator(), 2);

        let input = classification(&[("Laptop", 92.1), ("Backpack", 5.3)]);
        let result = recommender
            .recommend(&input, &options(4, &[SourceKind::Shopee]))
            .await
            .unwrap();

        assert_eq!(result.search_queries, vec!["Laptop", "Backpack"]);
        assert_eq!(
            recommender.catalog.calls(),
            vec![
                (SourceKind::Shopee, "Laptop".to_string(), 2),
                (SourceKind::Shopee, "Backpack".to_string(), 2),
            ]
        );
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(
            titles(&result.recommendations[&SourceKind::Shopee]),
            vec!["l1", "l2", "b1", "b2"]
        );
    }

    #[actix_web::test]
    async fn only_top_k_predictions_become_queries() {
        let catalog = StubCatalog::default().answer(SourceKind::Tiki, "Lamp", &["lamp"]);
        let recommender = Recommender::new(catalog, plain_translator(), 1);

        let input = classification(&[("Sofa", 10.0), ("Lamp", 80.0), ("Chair", 40.0)]);
        let result = recommender
            .recommend(&input, &options(6, &[SourceKind::Tiki]))
            .await
            .unwrap();
        assert_eq!(result.search_queries, vec!["Lamp"]);
        assert_eq!(result.based_on, input);
    }

    #[actix_web::test]
    async fn keys_are_exactly_the_requested_sources() {
        let catalog = StubCatalog::default().answer(SourceKind::Tiki, "Lamp", &["a", "b", "c"]);
        let recommender = Recommender::new(catalog, plain_translator(), 2);

        let input = classification(&[("Lamp", 80.0)]);
        let sources = [SourceKind::Tiki, SourceKind::Lazada, SourceKind::Tiki];
        let result = recommender.recommend(&input, &options(2, &sources)).await.unwrap();

        let keys: Vec<SourceKind> = result.recommendations.keys().copied().collect();
        assert_eq!(keys, vec![SourceKind::Lazada, SourceKind::Tiki]);
        assert!(result.recommendations[&SourceKind::Lazada].is_empty());
        assert!(result.recommendations.values().all(|r| r.len() <= 2));
        assert_eq!(recommender.catalog.calls().len(), 2);
    }

    #[actix_web::test]
    async fn merge_order_ignores_call_completion_order() {
        let catalog = StubCatalog::default()
            .answer(SourceKind::Lazada, "Laptop", &["slow"])
            .answer(SourceKind::Lazada, "Backpack", &["fast"])
            .slow("Laptop");
        let recommender = Recommender::new(catalog, plain_translator(), 2);

        let input = classification(&[("Laptop", 60.0), ("Backpack", 40.0)]);
        let opts = options(4, &[SourceKind::Lazada]);
        let first = recommender.recommend(&input, &opts).await.unwrap();
        let second = recommender.recommend(&input, &opts).await.unwrap();

        assert_eq!(titles(&first.recommendations[&SourceKind::Lazada]), vec!["slow", "fast"]);
        assert_eq!(first.recommendations, second.recommendations);
    }

    #[actix_web::test]
    async fn duplicates_across_queries_are_dropped() {
        let catalog = StubCatalog::default()
            .answer(SourceKind::Shopee, "TV", &["same", "tv only"])
            .answer(SourceKind::Shopee, "Television", &["same", "television only"]);
        let recommender = Recommender::new(catalog, plain_translator(), 2);

        let input = classification(&[("TV", 60.0), ("Television", 40.0)]);
        let result = recommender
            .recommend(&input, &options(4, &[SourceKind::Shopee]))
            .await
            .unwrap();
        assert_eq!(
            titles(&result.recommendations[&SourceKind::Shopee]),
            vec!["same", "tv only", "television only"]
        );
    }

    #[actix_web::test]
    async fn failures_are_absorbed_without_fallback() {
        let recommender = Recommender::new(StubCatalog::default(), plain_translator(), 2);
        let input = classification(&[("Laptop", 90.0)]);
        let result = recommender
            .recommend(&input, &options(3, &[SourceKind::Shopee, SourceKind::Tiki]))
            .await
            .unwrap();
        assert_eq!(result.recommendations.len(), 2);
        assert!(result.recommendations.values().all(Vec::is_empty));
    }

    #[actix_web::test]
    async fn failures_use_flagged_samples_when_enabled() {
        let catalog = StubCatalog::default().answer(SourceKind::Tiki, "Laptop", &["real"]);
        let recommender =
            Recommender::new(catalog, plain_translator(), 2).with_sample_fallback(true);

        let input = classification(&[("Laptop", 90.0)]);
        let result = recommender
            .recommend(&input, &options(2, &[SourceKind::Shopee, SourceKind::Tiki]))
            .await
            .unwrap();

        let shopee = &result.recommendations[&SourceKind::Shopee];
        assert_eq!(shopee.len(), 2);
        assert!(shopee.iter().all(|r| r.sample && r.source == "Shopee (sample data)"));

        let tiki = &result.recommendations[&SourceKind::Tiki];
        assert_eq!(titles(tiki), vec!["real"]);
        assert!(!tiki[0].sample);
    }

    #[actix_web::test]
    async fn cache_hits_skip_the_catalog() {
        let catalog = StubCatalog::default().answer(SourceKind::Tiki, "Lamp", &["lamp"]);
        let cache = CacheService::new(Duration::hours(24));
        let recommender =
            Recommender::new(catalog, plain_translator(), 2).with_cache(cache.clone());

        let input = classification(&[("Lamp", 80.0)]);
        let opts = options(2, &[SourceKind::Tiki]);
        let first = recommender.recommend(&input, &opts).await.unwrap();
        let second = recommender.recommend(&input, &opts).await.unwrap();

        assert_eq!(first.recommendations, second.recommendations);
        assert_eq!(recommender.catalog.calls().len(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[actix_web::test]
    async fn larger_requests_refetch_past_a_short_cached_list() {
        let titles_in_catalog = ["a", "b", "c", "d", "e"];
        let uncached = Recommender::new(
            StubCatalog::default().answer(SourceKind::Tiki, "Lamp", &titles_in_catalog),
            plain_translator(),
            2,
        );
        let cached = Recommender::new(
            StubCatalog::default().answer(SourceKind::Tiki, "Lamp", &titles_in_catalog),
            plain_translator(),
            2,
        )
        .with_cache(CacheService::new(Duration::hours(24)));

        let input = classification(&[("Lamp", 80.0)]);
        let small = options(1, &[SourceKind::Tiki]);
        let large = options(4, &[SourceKind::Tiki]);

        let warmed = cached.recommend(&input, &small).await.unwrap();
        assert_eq!(titles(&warmed.recommendations[&SourceKind::Tiki]), vec!["a"]);

        let expected = uncached.recommend(&input, &large).await.unwrap();
        let actual = cached.recommend(&input, &large).await.unwrap();
        assert_eq!(actual.recommendations[&SourceKind::Tiki].len(), 4);
        assert_eq!(actual.recommendations, expected.recommendations);

        let again = cached.recommend(&input, &small).await.unwrap();
        assert_eq!(titles(&again.recommendations[&SourceKind::Tiki]), vec!["a"]);
        assert_eq!(cached.catalog.calls().len(), 2);
    }

    #[actix_web::test]
    async fn exhausted_upstream_results_stay_cached_for_larger_requests() {
        let catalog = StubCatalog::default().answer(SourceKind::Tiki, "Lamp", &["a", "b"]);
        let recommender = Recommender::new(catalog, plain_translator(), 2)
            .with_cache(CacheService::new(Duration::hours(24)));

        let input = classification(&[("Lamp", 80.0)]);
        recommender.recommend(&input, &options(5, &[SourceKind::Tiki])).await.unwrap();
        let second = recommender
            .recommend(&input, &options(3, &[SourceKind::Tiki]))
            .await
            .unwrap();

        assert_eq!(titles(&second.recommendations[&SourceKind::Tiki]), vec!["a", "b"]);
        assert_eq!(recommender.catalog.calls().len(), 1);
    }

    #[actix_web::test]
    async fn use_cache_false_bypasses_the_cache() {
        let catalog = StubCatalog::default().answer(SourceKind::Tiki, "Lamp", &["lamp"]);
        let cache = CacheService::new(Duration::hours(24));
        let recommender =
            Recommender::new(catalog, plain_translator(), 2).with_cache(cache.clone());

        let input = classification(&[("Lamp", 80.0)]);
        let mut opts = options(2, &[SourceKind::Tiki]);
        opts.use_cache = false;
        recommender.recommend(&input, &opts).await.unwrap();
        recommender.recommend(&input, &opts).await.unwrap();

        assert_eq!(recommender.catalog.calls().len(), 2);
        assert_eq!(cache.len().await, 0);
    }

    #[actix_web::test]
    async fn failed_lookups_are_not_cached() {
        let cache = CacheService::new(Duration::hours(24));
        let recommender = Recommender::new(StubCatalog::default(), plain_translator(), 2)
            .with_cache(cache.clone())
            .with_sample_fallback(true);

        let input = classification(&[("Lamp", 80.0)]);
        recommender
            .recommend(&input, &options(2, &[SourceKind::Shopee]))
            .await
            .unwrap();
        assert_eq!(cache.len().await, 0);
    }

    #[actix_web::test]
    async fn categories_are_built_on_request() {
        let catalog = StubCatalog::default().answer(SourceKind::Tiki, "Lamp", &["lamp"]);
        let recommender = Recommender::new(catalog, plain_translator(), 2);
        let input = classification(&[("Lamp", 80.0)]);

        let mut opts = options(2, &[SourceKind::Tiki]);
        assert!(recommender.recommend(&input, &opts).await.unwrap().categories.is_none());

        opts.include_categories = true;
        let categories = recommender
            .recommend(&input, &opts)
            .await
            .unwrap()
            .categories
            .unwrap();
        assert_eq!(categories.price_ranges[1].products.len(), 1);
        assert_eq!(categories.by_rating[&SourceKind::Tiki].len(), 1);
    }

    #[test]
    fn parses_source_names() {
        let names: Vec<String> = vec!["Shopee".into(), " tiki ".into(), "shopee".into()];
        assert_eq!(
            parse_sources(&names).unwrap(),
            vec![SourceKind::Shopee, SourceKind::Tiki]
        );
        assert_eq!(
            parse_sources(&["google_shopping".to_string()]).unwrap(),
            vec![SourceKind::GoogleShopping]
        );
        assert_eq!(
            parse_sources(&["ebay".to_string()]),
            Err(RecommendError::UnknownSource("ebay".into()))
        );
    }
}
