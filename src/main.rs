// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::info;
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::Config;
use crate::errors::AdlensError;
use crate::handlers::{
    asset_facets, get_asset, get_review, list_assets, list_platforms, publish_asset, save_review,
    test_analysis, update_review, upload_asset,
};
use crate::services::{
    AnalysisService, AssetStore, BusyFlag, GeminiProvider, MediaProcessor, OpenAiProvider,
    Publisher,
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    asset_store: Arc<AssetStore>,
    analysis_service: Arc<AnalysisService>,
    media_processor: Arc<MediaProcessor>,
    publisher: Arc<Publisher>,
    analysis_busy: Arc<BusyFlag>,
}

impl AppState {
    pub fn new(config: Config, asset_store: AssetStore, analysis_service: AnalysisService) -> Self {
        Self {
            media_processor: Arc::new(MediaProcessor::new(config.max_image_edge)),
            publisher: Arc::new(Publisher::new(config.publish_delay)),
            analysis_busy: Arc::new(BusyFlag::new()),
            asset_store: Arc::new(asset_store),
            analysis_service: Arc::new(analysis_service),
            config: Arc::new(config),
        }
    }
}

fn build_analysis_service(config: &Config) -> anyhow::Result<AnalysisService> {
    let mut service = AnalysisService::new(config.default_provider.clone());

    if let Some(key) = &config.google_api_key {
        service = service.with_provider(Arc::new(GeminiProvider::new(
            key.clone(),
            config.gemini_model.clone(),
            config.model_timeout,
        )?));
    }
    if let Some(key) = &config.openai_api_key {
        service = service.with_provider(Arc::new(OpenAiProvider::new(
            key.clone(),
            config.openai_model.clone(),
            config.model_timeout,
        )?));
    }

    if !service.has_provider(service.default_provider()) {
        anyhow::bail!(
            "default provider '{}' has no API key; set GOOGLE_API_KEY (googleai) or OPENAI_API_KEY (openai)",
            service.default_provider()
        );
    }
    Ok(service)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AdlensError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AdlensError::Validation(err.to_string()).into()),
    )
    .service(
        web::scope("/api/v1")
            .route("/assets", web::get().to(list_assets))
            .route("/assets/upload", web::post().to(upload_asset))
            .route("/assets/facets", web::get().to(asset_facets))
            .route("/assets/{asset_id}", web::get().to(get_asset))
            .route("/assets/{asset_id}/review", web::get().to(get_review))
            .route("/assets/{asset_id}/review", web::patch().to(update_review))
            .route("/assets/{asset_id}/review/save", web::post().to(save_review))
            .route("/publish/platforms", web::get().to(list_platforms))
            .route("/publish", web::post().to(publish_asset))
            .route("/test-analysis", web::get().to(test_analysis)),
    )
    .route("/health", web::get().to(health_check));
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting adlens service...");

    let config = Config::load();
    let analysis_service = build_analysis_service(&config)?;
    let asset_store = AssetStore::seeded()?;
    let bind_addr = config.bind_addr.clone();

    info!(
        "Analysis provider: {} (timeout {}s)",
        analysis_service.default_provider(),
        config.model_timeout.as_secs()
    );

    let app_state = AppState::new(config, asset_store, analysis_service);

    info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "adlens",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn health_reports_service_name() {
        let app = test::init_service(App::new().configure(configure_routes)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "adlens");
    }
}
