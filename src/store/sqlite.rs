use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::store::{
    ListQuery, RecordStatus, StorageError, TranscriptionRecord, TranscriptionStore, summarize,
};
use crate::transcript::TranscriptionResult;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transcriptions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    audio_url TEXT NOT NULL,
    transcription TEXT NOT NULL,
    language TEXT NOT NULL,
    segments TEXT NOT NULL,
    duration REAL NOT NULL,
    created_at INTEGER NOT NULL,
    user_id TEXT,
    status TEXT NOT NULL
)
"#;

const CREATE_USER_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_transcriptions_user_created
    ON transcriptions (user_id, created_at DESC)
"#;

const SELECT_COLUMNS: &str =
    "id, audio_url, transcription, language, segments, duration, created_at, user_id, status";

pub struct SqliteTranscriptionStore {
    pool: SqlitePool,
    /// Last issued `created_at`, in microseconds.
    last_stamp: Mutex<i64>,
}

impl SqliteTranscriptionStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool).await?;
        info!("Connected to transcription database");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_USER_INDEX).execute(&pool).await?;

        let last: Option<i64> = sqlx::query_scalar("SELECT MAX(created_at) FROM transcriptions")
            .fetch_one(&pool)
            .await?;

        Ok(Self {
            pool,
            last_stamp: Mutex::new(last.unwrap_or(0)),
        })
    }

    /// Wall-clock time, nudged forward so stamps strictly increase.
    fn next_timestamp(&self) -> i64 {
        let mut last = self.last_stamp.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now().timestamp_micros();
        *last = if now > *last { now } else { *last + 1 };
        *last
    }
}

fn record_from_row(row: &SqliteRow) -> Result<TranscriptionRecord, StorageError> {
    let id: String = row.try_get("id")?;

    let segments: String = row.try_get("segments")?;
    let segments = serde_json::from_str(&segments)
        .map_err(|e| StorageError::Corrupt(format!("{id}: segments: {e}")))?;

    let created_at: i64 = row.try_get("created_at")?;
    let created_at = DateTime::<Utc>::from_timestamp_micros(created_at)
        .ok_or_else(|| StorageError::Corrupt(format!("{id}: created_at out of range")))?;

    let status: String = row.try_get("status")?;
    let status = status
        .parse::<RecordStatus>()
        .map_err(|e| StorageError::Corrupt(format!("{id}: {e}")))?;

    Ok(TranscriptionRecord {
        audio_url: row.try_get("audio_url")?,
        transcription: row.try_get("transcription")?,
        language: row.try_get("language")?,
        segments,
        duration: row.try_get("duration")?,
        created_at,
        user_id: row.try_get("user_id")?,
        status,
        id,
    })
}

#[async_trait]
impl TranscriptionStore for SqliteTranscriptionStore {
    async fn store(
        &self,
        result: &TranscriptionResult,
        audio_url: &str,
        user_id: Option<&str>,
    ) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        let segments = serde_json::to_string(&result.segments)
            .map_err(|e| StorageError::Corrupt(format!("{id}: segments: {e}")))?;
        let created_at = self.next_timestamp();

        sqlx::query(
            r#"
            INSERT INTO transcriptions
                (id, audio_url, transcription, language, segments, duration, created_at, user_id, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(audio_url)
        .bind(&result.text)
        .bind(&result.language)
        .bind(segments)
        .bind(result.duration)
        .bind(created_at)
        .bind(user_id)
        .bind(RecordStatus::Completed.as_str())
        .execute(&self.pool)
        .await?;

        info!("Stored transcription in database: {id}");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<TranscriptionRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM transcriptions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<TranscriptionRecord>, StorageError> {
        debug!(
            "Listing transcriptions: user_id={:?}, limit={}, offset={}",
            query.user_id, query.limit, query.offset
        );

        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM transcriptions
            WHERE (? IS NULL OR user_id = ?)
            ORDER BY created_at DESC, seq DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(query.user_id.as_deref())
        .bind(query.user_id.as_deref())
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<TranscriptionRecord, StorageError> {
                let mut record = record_from_row(row)?;
                record.transcription = summarize(&record.transcription);
                Ok(record)
            })
            .collect()
    }
}
