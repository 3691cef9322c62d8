mod config;
mod error;
mod handlers;
mod models;
mod services;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use config::Config;
use services::assistant::Assistant;
use services::llm_bridge::{CompletionProvider, OpenAiProvider};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,actix_web=info,actix_server=info");
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let provider: Option<Arc<dyn CompletionProvider>> = match OpenAiProvider::from_config(&config.llm) {
        Ok(provider) => provider.map(|p| Arc::new(p) as Arc<dyn CompletionProvider>),
        Err(e) => {
            warn!("Completion provider unavailable: {}", e);
            None
        }
    };
    let assistant = Arc::new(Assistant::new(provider));

    info!("Server starting at {}", config.server_addr);

    let bind_addr = config.server_addr.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(assistant.clone()))
            .configure(handlers::config)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
