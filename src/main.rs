// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use log::info;
use std::sync::Arc;

use shotlist::AppState;
use shotlist::config::AppConfig;
use shotlist::handlers::{json_config, routes};
use shotlist::services::{GatewayClient, PromptPipeline, RevisionLocks};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Shotlist service...");

    let config = AppConfig::from_env()?;
    info!(
        "Gateway {} (vision: {}, text: {}, timeout {}s)",
        config.gateway_url,
        config.vision_model,
        config.text_model,
        config.request_timeout.as_secs()
    );

    // Initialize services
    let gateway = Arc::new(GatewayClient::new(
        config.gateway_url.clone(),
        config.request_timeout,
    ));
    let pipeline = Arc::new(PromptPipeline::new(
        gateway,
        config.vision_model.clone(),
        config.text_model.clone(),
    ));

    let app_state = AppState {
        pipeline,
        revision_locks: Arc::new(RevisionLocks::new()),
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(json_config())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
