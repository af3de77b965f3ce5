pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::transcript::{Segment, TranscriptionResult};

pub use sqlite::SqliteTranscriptionStore;

/// Listed transcripts are cut to this many characters.
pub const SUMMARY_MAX_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database not connected")]
    NotConnected,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt transcription record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(RecordStatus::Completed),
            "failed" => Ok(RecordStatus::Failed),
            _ => Err(format!("Invalid record status: {}", s)),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRecord {
    pub id: String,
    pub audio_url: String,
    pub transcription: String,
    pub language: String,
    pub segments: Vec<Segment>,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

#[async_trait]
pub trait TranscriptionStore: Send + Sync {
    /// Persists a completed transcription and returns its new id.
    async fn store(
        &self,
        result: &TranscriptionResult,
        audio_url: &str,
        user_id: Option<&str>,
    ) -> Result<String, StorageError>;

    async fn get(&self, id: &str) -> Result<Option<TranscriptionRecord>, StorageError>;

    /// Newest first, with transcripts cut via [`summarize`].
    async fn list(&self, query: &ListQuery) -> Result<Vec<TranscriptionRecord>, StorageError>;
}

/// Shortens a transcript for listings, marking the cut with `...`.
pub fn summarize(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
