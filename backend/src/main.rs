use actix_cors::Cors;
use actix_web::{App, HttpServer};
use std::env;

use litscan::config::AppConfig;
use litscan::detection::load_prediction_source;
use litscan::{db, Services};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    // Loaded once; shared read-only by every worker afterwards.
    let source = load_prediction_source(config.model_path.as_deref());
    log::info!("Prediction mode: {}", source.mode());

    let pool = db::connect(&config.database_url).await.map_err(|e| {
        log::error!("Failed to open database: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let services = Services::new(&config, pool, source);
    services.uploads.ensure_dir().await.map_err(|e| {
        log::error!("Failed to create upload directory {}: {}", config.upload_dir.display(), e);
        std::io::Error::other(e.to_string())
    })?;

    let bind_address = config.bind_addr();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .configure(|cfg| services.configure(cfg))
    })
    .bind(&bind_address)?
    .run()
    .await
}
