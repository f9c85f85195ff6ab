use actix_web::error::InternalError;
use actix_web::{web, HttpResponse};
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use shared::{ClassificationResult, RecommendationRequest, RecommendationResponse, SourceKind};

use crate::cache::cache_service::CacheService;
use crate::config::RecommendationConfig;
use crate::recommend::translator::LabelTranslator;
use crate::recommend::{parse_sources, RecommendError, RecommendOptions, Recommender};
use crate::sources::{SourceError, SourceRegistry};
use crate::storage::classification_store::{ClassificationStore, StoreError};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_body(message: impl Into<String>) -> ErrorResponse {
    ErrorResponse {
        error: message.into(),
    }
}

/// Services shared by every handler, built once at startup.
pub struct AppState {
    pub config: RecommendationConfig,
    pub recommender: Recommender<SourceRegistry>,
    pub store: ClassificationStore,
}

impl AppState {
    pub fn new(config: RecommendationConfig, store: ClassificationStore) -> Result<Self, SourceError> {
        let registry = SourceRegistry::new(config.request_timeout())?;
        let translator = LabelTranslator::new(
            config.search.localized_queries,
            config.search.generic_keywords.clone(),
        );
        let mut recommender = Recommender::new(registry, translator, config.search.top_k)
            .with_sample_fallback(config.fallback.sample_data);

        if config.cache.enabled {
            let cache = match &config.cache.directory {
                Some(dir) => CacheService::with_directory(config.cache_ttl(), dir.clone()),
                None => CacheService::new(config.cache_ttl()),
            };
            recommender = recommender.with_cache(cache);
        }

        Ok(Self {
            config,
            recommender,
            store,
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(web::resource("/recommend-products").route(web::post().to(recommend_products)))
        .service(web::resource("/classifications").route(web::post().to(create_classification)))
        .service(web::resource("/classifications/{id}").route(web::get().to(get_classification)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/api/docs").route(web::get().to(api_docs)));
}

/// Malformed bodies get the same `{error}` shape as every other failure.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(error_body(err.to_string()));
        InternalError::from_response(err, response).into()
    })
}

fn recommend_error_response(err: &RecommendError) -> HttpResponse {
    HttpResponse::BadRequest().json(error_body(err.to_string()))
}

fn store_error_response(err: &StoreError) -> HttpResponse {
    match err {
        StoreError::InvalidId(_) => HttpResponse::BadRequest().json(error_body(err.to_string())),
        StoreError::NotFound(_) => HttpResponse::NotFound().json(error_body(err.to_string())),
        StoreError::Io(_) | StoreError::Serialization(_) => {
            error!("Classification store failure: {}", err);
            HttpResponse::InternalServerError()
                .json(error_body("Failed to access classification results"))
        }
    }
}

async fn recommend_products(
    state: web::Data<AppState>,
    body: web::Json<RecommendationRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    let classification = match (&request.classification_id, request.predictions.is_empty()) {
        (Some(id), true) => match state.store.load(id).await {
            Ok(result) => result,
            Err(e) => return store_error_response(&e),
        },
        _ => ClassificationResult {
            predictions: request.predictions,
        },
    };

    let sources = match request.sources.as_deref() {
        Some(names) if !names.is_empty() => match parse_sources(names) {
            Ok(sources) => sources,
            Err(e) => return recommend_error_response(&e),
        },
        _ => state.config.search.default_sources.clone(),
    };

    let options = RecommendOptions {
        num_products: request
            .num_products
            .unwrap_or(state.config.search.default_num_products),
        sources,
        include_categories: request.include_categories.unwrap_or(true),
        use_cache: request.use_cache.unwrap_or(true),
    };

    match state.recommender.recommend(&classification, &options).await {
        Ok(result) => {
            info!(
                "Recommended {} products across {} sources",
                result.recommendations.values().map(Vec::len).sum::<usize>(),
                result.recommendations.len()
            );
            HttpResponse::Ok().json(RecommendationResponse::from(result))
        }
        Err(e) => {
            info!("Rejected recommendation request: {}", e);
            recommend_error_response(&e)
        }
    }
}

async fn create_classification(
    state: web::Data<AppState>,
    body: web::Json<ClassificationResult>,
) -> HttpResponse {
    match state.store.save(&body).await {
        Ok(id) => HttpResponse::Created().json(json!({ "id": id })),
        Err(e) => store_error_response(&e),
    }
}

async fn get_classification(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.store.load(&path.into_inner()).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => store_error_response(&e),
    }
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let cache_entries = match state.recommender.cache() {
        Some(cache) => cache.len().await,
        None => 0,
    };
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "services": {
            "sources": SourceKind::all(),
            "cache_enabled": state.recommender.cache().is_some(),
            "cache_entries": cache_entries,
            "sample_fallback": state.recommender.sample_fallback(),
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn api_docs() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "endpoints": {
            "/recommend-products": {
                "method": "POST",
                "description": "Recommend products for a classification result",
                "body": {
                    "predictions": "[{class_name, class_id, confidence}] (or classification_id)",
                    "classification_id": "id returned by POST /classifications",
                    "num_products": "products per source (default from config)",
                    "sources": SourceKind::all(),
                    "include_categories": "bool, default true",
                    "use_cache": "bool, default true",
                },
            },
            "/classifications": {
                "method": "POST",
                "description": "Store a classification result and return its id",
            },
            "/classifications/{id}": {
                "method": "GET",
                "description": "Fetch a stored classification result",
            },
            "/health": {
                "method": "GET",
                "description": "Service status",
            },
        }
    }))
}
