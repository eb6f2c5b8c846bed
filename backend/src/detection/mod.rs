pub mod classifier;
pub mod preprocess;
pub mod service;
#[cfg(feature = "torch")]
pub mod torch;
pub mod validator;

pub use classifier::{Classifier, ClassifierError, Prediction, PredictionSource};
pub use service::{DetectionError, DetectionOutcome, DetectionService, DetectionSettings, ImageUpload};

/// Picks the prediction source once at startup. Without a usable model
/// the service runs in simulation mode.
pub fn load_prediction_source(model_path: Option<&std::path::Path>) -> PredictionSource {
    let Some(path) = model_path else {
        log::warn!("No MODEL_PATH configured, running in simulation mode");
        return PredictionSource::Simulated;
    };
    load_model(path)
}

#[cfg(feature = "torch")]
fn load_model(path: &std::path::Path) -> PredictionSource {
    match torch::TorchClassifier::load(path) {
        Ok(classifier) => PredictionSource::real(classifier),
        Err(e) => {
            log::warn!("Failed to load model from {}: {}. Running in simulation mode", path.display(), e);
            PredictionSource::Simulated
        }
    }
}

#[cfg(not(feature = "torch"))]
fn load_model(path: &std::path::Path) -> PredictionSource {
    log::warn!(
        "MODEL_PATH is set to {} but this build has no classifier backend (enable the `torch` feature). Running in simulation mode",
        path.display()
    );
    PredictionSource::Simulated
}
