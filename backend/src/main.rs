use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use dermalens_backend::adapters::genai::GenAiClient;
use dermalens_backend::aggregator::{AdapterSet, Aggregator};
use dermalens_backend::conditions::ConditionCatalog;
use dermalens_backend::config::AppConfig;
use dermalens_backend::plan::{PlanService, TreatmentCatalog};
use dermalens_backend::routes::{configure_routes, json_config};

fn startup_error<E: std::fmt::Display>(context: &str, e: E) -> std::io::Error {
    log::error!("{}: {}", context, e);
    std::io::Error::other(format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    for key in config.missing_credentials() {
        log::warn!("{} is not set; requests to that source will be recorded as failures", key);
    }

    let treatment_catalog = TreatmentCatalog::load(config.treatment_catalog_path.as_deref())
        .map_err(|e| startup_error("Failed to load treatment catalog", e))?;
    log::info!("Loaded {} treatment plan entries", treatment_catalog.len());
    let conditions =
        ConditionCatalog::builtin().map_err(|e| startup_error("Failed to load condition profiles", e))?;

    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|e| startup_error("Failed to build HTTP client", e))?;
    let genai = Arc::new(GenAiClient::new(
        http_client.clone(),
        config.genai_base_url.clone(),
        config.genai_api_key.clone(),
        config.genai_model.clone(),
    ));

    let adapters = AdapterSet::from_config(&config, http_client, genai.clone());
    let aggregator = web::Data::new(Aggregator::new(adapters, config.timeouts, config.max_upload_bytes));
    let plans = web::Data::new(PlanService::new(
        genai,
        Arc::new(treatment_catalog),
        config.timeouts.plan,
    ));
    let conditions = web::Data::new(conditions);
    let max_upload_bytes = config.max_upload_bytes;

    let bind_address = config.bind_address();
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
            .app_data(json_config(max_upload_bytes))
            .app_data(aggregator.clone())
            .app_data(plans.clone())
            .app_data(conditions.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
