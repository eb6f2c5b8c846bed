use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{DetectionLabel, DetectionResponse, UserProfile};
use std::str::FromStr;
use uuid::Uuid;

use super::RepositoryError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// A persisted detection. There is no way to change one after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub subject_name: String,
    pub image_filename: String,
    pub label: DetectionLabel,
    pub confidence: f64,
    pub simulated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDetection {
    pub user_id: Uuid,
    pub subject_name: String,
    pub image_filename: String,
    pub label: DetectionLabel,
    pub confidence: f64,
    pub simulated: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct DetectionRow {
    pub id: i64,
    pub user_id: Uuid,
    pub subject_name: String,
    pub image_filename: String,
    pub label: String,
    pub confidence: f64,
    pub simulated: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DetectionRow> for DetectionRecord {
    type Error = RepositoryError;

    fn try_from(row: DetectionRow) -> Result<Self, Self::Error> {
        let label = DetectionLabel::from_str(&row.label).map_err(|_| {
            RepositoryError::InvalidData(format!("unknown label '{}' on record {}", row.label, row.id))
        })?;
        if !(0.0..=100.0).contains(&row.confidence) {
            return Err(RepositoryError::InvalidData(format!(
                "confidence {} out of range on record {}",
                row.confidence, row.id
            )));
        }
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            subject_name: row.subject_name,
            image_filename: row.image_filename,
            label,
            confidence: row.confidence,
            simulated: row.simulated,
            created_at: row.created_at,
        })
    }
}

impl From<&DetectionRecord> for DetectionResponse {
    fn from(record: &DetectionRecord) -> Self {
        Self {
            id: record.id,
            subject_name: record.subject_name.clone(),
            image_filename: record.image_filename.clone(),
            label: record.label,
            confidence: record.confidence,
            simulated: record.simulated,
            created_at: record.created_at,
        }
    }
}
