//! SQLite Voice Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::DbPool;
use crate::application::ports::{RepositoryError, VoiceRepositoryPort};
use crate::domain::voice::{Voice, VoiceId, VoiceTranscript};

/// SQLite Voice Repository
pub struct SqliteVoiceRepository {
    pool: DbPool,
}

impl SqliteVoiceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct VoiceRow {
    voice_id: String,
    filename: String,
    sample_rate: i64,
    voice_transcript: String,
    duration_seconds: f64,
    uploaded_at: String,
}

impl TryFrom<VoiceRow> for Voice {
    type Error = RepositoryError;

    fn try_from(row: VoiceRow) -> Result<Self, Self::Error> {
        let corrupt = |e: String| RepositoryError::DatabaseError(format!("corrupt voice row: {}", e));

        Ok(Voice::restore(
            VoiceId::parse(&row.voice_id).map_err(|e| corrupt(e.to_string()))?,
            row.filename,
            u32::try_from(row.sample_rate).map_err(|e| corrupt(e.to_string()))?,
            VoiceTranscript::new(&row.voice_transcript).map_err(|e| corrupt(e.to_string()))?,
            row.duration_seconds,
            DateTime::parse_from_rfc3339(&row.uploaded_at)
                .map_err(|e| corrupt(e.to_string()))?
                .with_timezone(&Utc),
        ))
    }
}

fn map_db_error(e: sqlx::Error, voice_id: &VoiceId) -> RepositoryError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => RepositoryError::Duplicate(voice_id.to_string()),
        _ => RepositoryError::DatabaseError(e.to_string()),
    }
}

const SELECT_COLUMNS: &str =
    "SELECT voice_id, filename, sample_rate, voice_transcript, duration_seconds, uploaded_at FROM voices";

#[async_trait]
impl VoiceRepositoryPort for SqliteVoiceRepository {
    async fn save(&self, voice: &Voice) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO voices (voice_id, filename, sample_rate, voice_transcript, duration_seconds, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(voice.voice_id().as_str())
        .bind(voice.filename())
        .bind(voice.sample_rate() as i64)
        .bind(voice.transcript().as_str())
        .bind(voice.duration_seconds())
        .bind(voice.uploaded_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, voice.voice_id()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &VoiceId) -> Result<Option<Voice>, RepositoryError> {
        let row: Option<VoiceRow> = sqlx::query_as(&format!("{} WHERE voice_id = ?", SELECT_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(Voice::try_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Voice>, RepositoryError> {
        let rows: Vec<VoiceRow> =
            sqlx::query_as(&format!("{} ORDER BY uploaded_at DESC", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Voice::try_from).collect()
    }

    async fn delete(&self, id: &VoiceId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM voices WHERE voice_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn rename(&self, old_id: &VoiceId, new_id: &VoiceId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE voices SET voice_id = ?, filename = ? WHERE voice_id = ?")
            .bind(new_id.as_str())
            .bind(new_id.filename())
            .bind(old_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, new_id))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(old_id.to_string()));
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
