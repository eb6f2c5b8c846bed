use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Outcome classes a detection can end in. The serialized form is the
/// human-readable label that is also stored in the history table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
pub enum DetectionLabel {
    #[strum(serialize = "Normal")]
    #[serde(rename = "Normal")]
    Normal,
    #[strum(serialize = "Detected Dyslexia (Reversal)")]
    #[serde(rename = "Detected Dyslexia (Reversal)")]
    DetectedReversal,
    #[strum(serialize = "Detected Dyslexia (Corrected)")]
    #[serde(rename = "Detected Dyslexia (Corrected)")]
    DetectedCorrected,
}

impl DetectionLabel {
    pub fn is_detected(&self) -> bool {
        !matches!(self, DetectionLabel::Normal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PredictionMode {
    Model,
    Simulation,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DetectionResponse {
    pub id: i64,
    pub subject_name: String,
    pub image_filename: String,
    pub label: DetectionLabel,
    pub confidence: f64,
    pub simulated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DetectResponse {
    pub result: DetectionResponse,
    pub mode: PredictionMode,
    pub notice: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub mode: PredictionMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn labels_parse_back_from_their_display_form() {
        for label in DetectionLabel::iter() {
            let parsed = DetectionLabel::from_str(&label.to_string()).unwrap();
            assert_eq!(parsed, label);
        }
    }

    #[test]
    fn only_normal_is_not_detected() {
        assert!(!DetectionLabel::Normal.is_detected());
        assert!(DetectionLabel::DetectedReversal.is_detected());
        assert!(DetectionLabel::DetectedCorrected.is_detected());
        assert!(DetectionLabel::DetectedCorrected.to_string().starts_with("Detected"));
    }
}
