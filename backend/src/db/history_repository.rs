use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::RepositoryError;
use super::models::{DetectionRecord, DetectionRow, NewDetection};

const SELECT_COLUMNS: &str = "SELECT id, user_id, subject_name, image_filename, label, confidence, simulated, created_at FROM detections";

/// Append-only store of detection records. Every read is scoped to an owner.
#[derive(Clone, Debug)]
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, detection: &NewDetection) -> Result<DetectionRecord, RepositoryError> {
        let created_at = Utc::now();
        let row: DetectionRow = sqlx::query_as(
            r#"
            INSERT INTO detections (user_id, subject_name, image_filename, label, confidence, simulated, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, user_id, subject_name, image_filename, label, confidence, simulated, created_at
            "#,
        )
        .bind(detection.user_id)
        .bind(&detection.subject_name)
        .bind(&detection.image_filename)
        .bind(detection.label.to_string())
        .bind(detection.confidence)
        .bind(detection.simulated)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        let record = DetectionRecord::try_from(row)?;
        log::info!(
            "Stored detection {} for user {} ({}, {:.2}%)",
            record.id,
            record.user_id,
            record.label,
            record.confidence
        );
        Ok(record)
    }

    /// Newest first.
    pub async fn list_for(&self, owner_id: Uuid) -> Result<Vec<DetectionRecord>, RepositoryError> {
        let rows: Vec<DetectionRow> =
            sqlx::query_as(&format!("{} WHERE user_id = ? ORDER BY id DESC", SELECT_COLUMNS))
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?;

        let mut records = rows
            .into_iter()
            .map(DetectionRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Records owned by someone else are reported as missing.
    pub async fn get_one(&self, id: i64, owner_id: Uuid) -> Result<DetectionRecord, RepositoryError> {
        let row: Option<DetectionRow> =
            sqlx::query_as(&format!("{} WHERE id = ? AND user_id = ?", SELECT_COLUMNS))
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or(RepositoryError::NotFound)
            .and_then(DetectionRecord::try_from)
    }

    pub async fn count_for(&self, owner_id: Uuid) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM detections WHERE user_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
