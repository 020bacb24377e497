use sqlx::PgPool;

use crate::error::WriteError;
use crate::types::MaskedRecord;

/// Outcome of a single insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    /// The dedup key already exists: this is a redelivered message whose
    /// first delivery committed. Safe to acknowledge.
    Duplicate,
}

/// Writes masked records into `user_logins`. Connections are acquired from
/// the pool per statement and returned on every exit path; the unique index
/// on `event_key` plus `ON CONFLICT DO NOTHING` makes the insert idempotent
/// under at-least-once redelivery.
#[derive(Clone)]
pub struct RecordWriter {
    pool: PgPool,
}

impl RecordWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn write(&self, record: &MaskedRecord) -> Result<WriteOutcome, WriteError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_logins
                (user_id, device_type, masked_ip, masked_device_id, locale, app_version, event_key, create_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, CURRENT_DATE)
            ON CONFLICT (event_key) DO NOTHING
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.device_type)
        .bind(&record.masked_ip)
        .bind(&record.masked_device_id)
        .bind(&record.locale)
        .bind(&record.app_version)
        .bind(&record.event_key)
        .execute(&self.pool)
        .await
        .map_err(WriteError::classify)?;

        if result.rows_affected() == 0 {
            Ok(WriteOutcome::Duplicate)
        } else {
            Ok(WriteOutcome::Inserted)
        }
    }
}
