mod cache;
mod config;
mod recommend;
mod routes;
mod sources;
mod storage;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use config::{RecommendationConfig, ServerConfig};
use routes::{configure_routes, AppState};
use std::env;
use storage::classification_store::ClassificationStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let server_config = ServerConfig::from_env();

    let config = RecommendationConfig::load_or_default(&server_config.recommendation_config)
        .map_err(|e| {
            log::error!("Failed to load recommendation config: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

    log::info!(
        "Default sources: {:?}, top_k: {}, sample fallback: {}",
        config.search.default_sources,
        config.search.top_k,
        config.fallback.sample_data
    );
    if config.cache.enabled {
        match &config.cache.directory {
            Some(dir) => log::info!(
                "Result cache enabled ({}h TTL), persisted to {}",
                config.cache.ttl_hours,
                dir.display()
            ),
            None => log::info!("Result cache enabled ({}h TTL), memory only", config.cache.ttl_hours),
        }
    } else {
        log::warn!("Result cache disabled");
    }

    let store = ClassificationStore::new(server_config.classification_results_dir.clone());
    let state = AppState::new(config, store).map_err(|e| {
        log::error!("Failed to build HTTP client: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    let state = web::Data::new(state);

    let bind_address = server_config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
