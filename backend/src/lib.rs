pub mod auth;
pub mod config;
pub mod db;
pub mod detection;
pub mod routes;
pub mod storage;

use actix_web::web;
use sqlx::SqlitePool;
use std::time::Duration;

use auth::jwt::JwtService;
use auth::middleware::AuthMiddleware;
use auth::password::PasswordHasher;
use config::AppConfig;
use db::{HistoryRepository, UserRepository};
use detection::{DetectionService, DetectionSettings, PredictionSource};
use storage::upload_store::UploadStore;

/// Everything a worker needs, built once and cloned into each `App`.
#[derive(Clone)]
pub struct Services {
    pub detection: DetectionService,
    pub settings: DetectionSettings,
    pub history: HistoryRepository,
    pub users: UserRepository,
    pub uploads: UploadStore,
    pub jwt_service: JwtService,
    pub hasher: PasswordHasher,
}

impl Services {
    pub fn new(config: &AppConfig, pool: SqlitePool, source: PredictionSource) -> Self {
        let settings = DetectionSettings {
            max_upload_bytes: config.max_upload_bytes,
            inference_timeout: Duration::from_secs(config.inference_timeout_secs),
        };
        let history = HistoryRepository::new(pool.clone());
        let uploads = UploadStore::new(config.upload_dir.clone());
        let detection = DetectionService::new(source, uploads.clone(), history.clone(), settings.clone());

        Self {
            detection,
            settings,
            history,
            users: UserRepository::new(pool),
            uploads,
            jwt_service: JwtService::new(&config.jwt_secret),
            hasher: PasswordHasher::new(config.password_iterations),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.detection.clone()))
            .app_data(web::Data::new(self.settings.clone()))
            .app_data(web::Data::new(self.history.clone()))
            .app_data(web::Data::new(self.users.clone()))
            .app_data(web::Data::new(self.uploads.clone()))
            .app_data(web::Data::new(self.jwt_service.clone()))
            .app_data(web::Data::new(self.hasher.clone()));
        routes::configure_routes(cfg, AuthMiddleware::new(self.jwt_service.clone()));
    }
}
