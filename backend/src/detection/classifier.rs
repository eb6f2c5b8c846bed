use rand::Rng;
use shared::{DetectionLabel, PredictionMode};
use std::fmt;
use std::sync::Arc;

use super::preprocess::ImageTensor;

pub const DECISION_THRESHOLD: f32 = 0.5;
pub const SIMULATED_CONFIDENCE_MIN: f64 = 75.0;
pub const SIMULATED_CONFIDENCE_MAX: f64 = 98.0;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
    #[error("Prediction failed: {0}")]
    Prediction(String),
    #[error("Probability out of range: {0}")]
    InvalidProbability(f32),
}

/// A binary image classifier. Returns the probability of the positive
/// ("detected") class for a single-item batch.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &ImageTensor) -> Result<f32, ClassifierError>;

    fn name(&self) -> &str {
        "classifier"
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: DetectionLabel,
    /// Percentage in `[0, 100]`, rounded to two decimals.
    pub confidence: f64,
    pub simulated: bool,
}

impl Prediction {
    pub fn mode(&self) -> PredictionMode {
        if self.simulated {
            PredictionMode::Simulation
        } else {
            PredictionMode::Model
        }
    }
}

pub fn round_percent(fraction: f64) -> f64 {
    (fraction * 100.0 * 100.0).round() / 100.0
}

/// Maps the positive-class probability to a label. The detected
/// sub-variant is picked at random and carries no model signal.
pub fn prediction_from_probability<R: Rng>(
    probability: f32,
    rng: &mut R,
) -> Result<Prediction, ClassifierError> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(ClassifierError::InvalidProbability(probability));
    }
    let p = probability as f64;
    let (label, confidence) = if probability > DECISION_THRESHOLD {
        let variant = if rng.random_bool(0.5) {
            DetectionLabel::DetectedReversal
        } else {
            DetectionLabel::DetectedCorrected
        };
        (variant, p)
    } else {
        (DetectionLabel::Normal, 1.0 - p)
    };
    Ok(Prediction {
        label,
        confidence: round_percent(confidence).clamp(0.0, 100.0),
        simulated: false,
    })
}

pub fn simulate<R: Rng>(rng: &mut R) -> Prediction {
    let label = if rng.random_bool(0.5) {
        DetectionLabel::Normal
    } else {
        DetectionLabel::DetectedReversal
    };
    let confidence = rng.random_range(SIMULATED_CONFIDENCE_MIN..=SIMULATED_CONFIDENCE_MAX);
    Prediction {
        label,
        confidence: ((confidence * 100.0).round() / 100.0)
            .clamp(SIMULATED_CONFIDENCE_MIN, SIMULATED_CONFIDENCE_MAX),
        simulated: true,
    }
}

/// Where predictions come from, decided once at startup.
#[derive(Clone)]
pub enum PredictionSource {
    Real(Arc<dyn Classifier>),
    Simulated,
}

impl fmt::Debug for PredictionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionSource::Real(classifier) => {
                f.debug_tuple("Real").field(&classifier.name()).finish()
            }
            PredictionSource::Simulated => f.write_str("Simulated"),
        }
    }
}

impl PredictionSource {
    pub fn real<C: Classifier + 'static>(classifier: C) -> Self {
        PredictionSource::Real(Arc::new(classifier))
    }

    pub fn mode(&self) -> PredictionMode {
        match self {
            PredictionSource::Real(_) => PredictionMode::Model,
            PredictionSource::Simulated => PredictionMode::Simulation,
        }
    }

    /// A real classifier that reports itself unavailable downgrades this
    /// call to the simulation policy; any other failure is returned.
    pub fn predict<R: Rng>(
        &self,
        input: &ImageTensor,
        rng: &mut R,
    ) -> Result<Prediction, ClassifierError> {
        match self {
            PredictionSource::Simulated => Ok(simulate(rng)),
            PredictionSource::Real(classifier) => match classifier.predict(input) {
                Ok(p) => {
                    log::debug!("{} returned p={:.4}", classifier.name(), p);
                    prediction_from_probability(p, rng)
                }
                Err(ClassifierError::Unavailable(reason)) => {
                    log::warn!("Classifier unavailable ({}), using simulation", reason);
                    Ok(simulate(rng))
                }
                Err(e) => Err(e),
            },
        }
    }
}
