use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::classifier::{ClassifierError, Prediction, PredictionSource};
use super::preprocess::{self, DecodeError};
use super::validator::{self, ValidationError};
use crate::db::RepositoryError;
use crate::db::history_repository::HistoryRepository;
use crate::db::models::{DetectionRecord, NewDetection};
use crate::storage::upload_store::{StorageError, UploadStore};

pub const MODEL_NOTICE: &str = "Confidence score computed successfully.";
pub const SIMULATION_NOTICE: &str =
    "Simulation mode: the classifier is unavailable, this result was generated at random.";

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Upload rejected: {0}")]
    Rejected(#[from] ValidationError),
    #[error("Inference failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("Inference failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("Inference worker failed: {0}")]
    Worker(String),
    #[error("Could not store image: {0}")]
    Storage(#[from] StorageError),
    #[error("Could not save result: {0}")]
    Persistence(#[from] RepositoryError),
}

impl DetectionError {
    /// Bad input rather than a failure while processing it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, DetectionError::Rejected(_))
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub record: DetectionRecord,
    pub prediction: Prediction,
}

impl DetectionOutcome {
    pub fn notice(&self) -> &'static str {
        if self.prediction.simulated {
            SIMULATION_NOTICE
        } else {
            MODEL_NOTICE
        }
    }
}

#[derive(Clone, Debug)]
pub struct DetectionSettings {
    pub max_upload_bytes: usize,
    pub inference_timeout: Duration,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            inference_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs one upload through validation, preprocessing, prediction, image
/// storage and history persistence. A record exists only if every step
/// succeeded.
#[derive(Clone, Debug)]
pub struct DetectionService {
    source: PredictionSource,
    uploads: UploadStore,
    history: HistoryRepository,
    settings: DetectionSettings,
}

impl DetectionService {
    pub fn new(
        source: PredictionSource,
        uploads: UploadStore,
        history: HistoryRepository,
        settings: DetectionSettings,
    ) -> Self {
        Self {
            source,
            uploads,
            history,
            settings,
        }
    }

    pub fn source(&self) -> &PredictionSource {
        &self.source
    }

    pub async fn detect(
        &self,
        subject_name: &str,
        upload: ImageUpload,
        user_id: Uuid,
    ) -> Result<DetectionOutcome, DetectionError> {
        log::debug!("Validating upload '{}' for user {}", upload.filename, user_id);
        let subject_name = subject_name.trim();
        if subject_name.is_empty() {
            return Err(ValidationError::MissingSubjectName.into());
        }
        let extension = validator::validate_filename(&upload.filename)?;
        validator::validate_size(&upload.data, self.settings.max_upload_bytes)?;

        let ImageUpload { filename, data } = upload;
        let data = Arc::new(data);
        let prediction = self.predict(data.clone()).await?;
        log::debug!(
            "Classified '{}' as {} ({:.2}%, simulated: {})",
            filename,
            prediction.label,
            prediction.confidence,
            prediction.simulated
        );

        let image_filename = self.uploads.save(&filename, extension, &data).await?;

        let new_detection = NewDetection {
            user_id,
            subject_name: subject_name.to_string(),
            image_filename: image_filename.clone(),
            label: prediction.label,
            confidence: prediction.confidence,
            simulated: prediction.simulated,
        };
        let record = match self.history.append(&new_detection).await {
            Ok(record) => record,
            Err(e) => {
                log::error!("Failed to persist detection for user {}: {}", user_id, e);
                if let Err(cleanup) = self.uploads.delete(&image_filename).await {
                    log::warn!("Could not remove orphaned upload {}: {}", image_filename, cleanup);
                }
                return Err(e.into());
            }
        };

        Ok(DetectionOutcome { record, prediction })
    }

    /// Decode and inference are CPU-bound, so they run on the blocking pool
    /// under the configured deadline.
    async fn predict(&self, data: Arc<Vec<u8>>) -> Result<Prediction, DetectionError> {
        let source = self.source.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<Prediction, DetectionError> {
            let tensor = preprocess::preprocess(&data)?;
            let prediction = source.predict(&tensor, &mut rand::rng())?;
            Ok(prediction)
        });

        match tokio::time::timeout(self.settings.inference_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(DetectionError::Worker(join_err.to_string())),
            Err(_) => Err(DetectionError::Timeout(self.settings.inference_timeout)),
        }
    }
}
