use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::{Config, DeadLetterMode};
use crate::liveness::LivenessRegistry;
use crate::masking::Masker;
use crate::writer::RecordWriter;

/// Shared service state, built once at startup. Connecting eagerly doubles as
/// the database half of the startup connectivity check.
pub struct AppContext {
    pub pool: PgPool,
    pub writer: RecordWriter,
    pub masker: Masker,
    pub dead_letter_mode: DeadLetterMode,
    pub liveness: LivenessRegistry,
}

impl AppContext {
    pub async fn new(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_pg_connections)
            .connect(&config.pg_url())
            .await?;

        Ok(Self {
            writer: RecordWriter::new(pool.clone()),
            pool,
            masker: Masker::new(config.masking_salt.clone()),
            dead_letter_mode: config.dead_letter_mode,
            liveness: LivenessRegistry::new(),
        })
    }
}
