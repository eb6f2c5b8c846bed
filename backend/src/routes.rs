use actix_files::NamedFile;
use actix_multipart::{Field, Multipart};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde::Serialize;
use shared::{DetectResponse, DetectionResponse, HealthResponse};

use crate::auth::middleware::{AuthMiddleware, AuthenticatedUser};
use crate::auth::routes as auth_routes;
use crate::db::{HistoryRepository, RepositoryError};
use crate::detection::validator::ValidationError;
use crate::detection::{DetectionError, DetectionService, DetectionSettings, ImageUpload};
use crate::storage::upload_store::UploadStore;

pub const SUBJECT_FIELD: &str = "subject_name";
pub const IMAGE_FIELD: &str = "image";
const MAX_TEXT_FIELD_BYTES: usize = 1024;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_json(error: impl Into<String>) -> ErrorResponse {
    ErrorResponse { error: error.into() }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddleware) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(auth_routes::register))
                .route("/login", web::post().to(auth_routes::login)),
        )
        .service(
            web::scope("/api")
                .wrap(auth_middleware)
                .route("/me", web::get().to(auth_routes::me))
                .route("/me/password", web::post().to(auth_routes::change_password))
                .route("/detections", web::post().to(create_detection))
                .route("/history", web::get().to(list_history))
                .route("/history/{id}", web::get().to(get_history_entry))
                .route("/history/{id}/image", web::get().to(get_history_image)),
        );
}

async fn health(detection: web::Data<DetectionService>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        mode: detection.source().mode(),
    })
}

enum FormError {
    TooLarge { limit: usize },
    BadText(&'static str),
    Read(Error),
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, FormError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| FormError::Read(e.into()))?;
        if data.len() + chunk.len() > limit {
            return Err(FormError::TooLarge { limit });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

struct DetectionForm {
    subject_name: Option<String>,
    image: Option<ImageUpload>,
}

async fn read_detection_form(mut payload: Multipart, max_image_bytes: usize) -> Result<DetectionForm, FormError> {
    let mut form = DetectionForm {
        subject_name: None,
        image: None,
    };

    while let Some(mut field) = payload.try_next().await.map_err(|e| FormError::Read(e.into()))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            SUBJECT_FIELD => {
                let bytes = read_field(&mut field, MAX_TEXT_FIELD_BYTES).await?;
                let text = String::from_utf8(bytes).map_err(|_| FormError::BadText(SUBJECT_FIELD))?;
                form.subject_name = Some(text);
            }
            IMAGE_FIELD => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or_default()
                    .to_string();
                let data = read_field(&mut field, max_image_bytes).await?;
                form.image = Some(ImageUpload { filename, data });
            }
            other => {
                warn!("Ignoring unexpected multipart field '{}'", other);
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| FormError::Read(e.into()))?;
                }
            }
        }
    }
    Ok(form)
}

fn detection_error_response(err: &DetectionError) -> HttpResponse {
    match err {
        DetectionError::Rejected(reason) => HttpResponse::BadRequest().json(error_json(reason.to_string())),
        DetectionError::Decode(_)
        | DetectionError::Classifier(_)
        | DetectionError::Timeout(_)
        | DetectionError::Worker(_) => HttpResponse::UnprocessableEntity()
            .json(error_json("Inference failed, the image could not be analysed")),
        DetectionError::Storage(_) | DetectionError::Persistence(_) => {
            HttpResponse::InternalServerError().json(error_json("Could not save the detection result"))
        }
    }
}

async fn create_detection(
    user: AuthenticatedUser,
    payload: Multipart,
    detection: web::Data<DetectionService>,
    settings: web::Data<DetectionSettings>,
) -> Result<HttpResponse, Error> {
    let form = match read_detection_form(payload, settings.max_upload_bytes).await {
        Ok(form) => form,
        Err(FormError::TooLarge { limit }) => {
            let reason = ValidationError::FileTooLarge { size: limit + 1, limit };
            return Ok(HttpResponse::PayloadTooLarge().json(error_json(reason.to_string())));
        }
        Err(FormError::BadText(field)) => {
            return Ok(HttpResponse::BadRequest().json(error_json(format!("Field '{}' must be UTF-8 text", field))));
        }
        Err(FormError::Read(e)) => return Err(e),
    };

    let Some(image) = form.image else {
        return Ok(HttpResponse::BadRequest().json(error_json(ValidationError::MissingFile.to_string())));
    };
    let subject_name = form.subject_name.unwrap_or_default();

    match detection.detect(&subject_name, image, user.0).await {
        Ok(outcome) => {
            info!(
                "Detection {} for user {}: {} ({:.2}%, {})",
                outcome.record.id,
                user.0,
                outcome.record.label,
                outcome.record.confidence,
                outcome.prediction.mode()
            );
            Ok(HttpResponse::Created().json(DetectResponse {
                result: DetectionResponse::from(&outcome.record),
                mode: outcome.prediction.mode(),
                notice: outcome.notice().to_string(),
            }))
        }
        Err(e) => {
            if e.is_rejection() {
                warn!("Detection request from {} rejected: {}", user.0, e);
            } else {
                error!("Detection request from {} failed: {}", user.0, e);
            }
            Ok(detection_error_response(&e))
        }
    }
}

async fn list_history(user: AuthenticatedUser, history: web::Data<HistoryRepository>) -> HttpResponse {
    match history.list_for(user.0).await {
        Ok(records) => {
            let entries: Vec<DetectionResponse> = records.iter().map(DetectionResponse::from).collect();
            HttpResponse::Ok().json(entries)
        }
        Err(e) => {
            error!("Error listing history for {}: {:?}", user.0, e);
            HttpResponse::InternalServerError().json(error_json("Failed to load history"))
        }
    }
}

async fn get_history_entry(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    history: web::Data<HistoryRepository>,
) -> HttpResponse {
    let id = path.into_inner();
    match history.get_one(id, user.0).await {
        Ok(record) => HttpResponse::Ok().json(DetectionResponse::from(&record)),
        Err(RepositoryError::NotFound) => HttpResponse::NotFound().json(error_json("Detection not found")),
        Err(e) => {
            error!("Error retrieving detection {} for {}: {:?}", id, user.0, e);
            HttpResponse::InternalServerError().json(error_json("Failed to load detection"))
        }
    }
}

async fn get_history_image(
    req: HttpRequest,
    user: AuthenticatedUser,
    path: web::Path<i64>,
    history: web::Data<HistoryRepository>,
    uploads: web::Data<UploadStore>,
) -> HttpResponse {
    let id = path.into_inner();
    let record = match history.get_one(id, user.0).await {
        Ok(record) => record,
        Err(RepositoryError::NotFound) => {
            return HttpResponse::NotFound().json(error_json("Detection not found"));
        }
        Err(e) => {
            error!("Error retrieving detection {} for {}: {:?}", id, user.0, e);
            return HttpResponse::InternalServerError().json(error_json("Failed to load detection"));
        }
    };

    let file = match uploads.path_for(&record.image_filename) {
        Ok(path) => NamedFile::open_async(path).await,
        Err(e) => {
            error!("Detection {} has an unusable image name: {}", id, e);
            return HttpResponse::InternalServerError().json(error_json("Failed to load image"));
        }
    };
    match file {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            warn!("Image for detection {} is missing: {}", id, e);
            HttpResponse::NotFound().json(error_json("Image not found"))
        }
    }
}
