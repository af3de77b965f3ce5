use serde::{Deserialize, Serialize};

use crate::store::{RecordStatus, TranscriptionRecord};
use crate::transcript::Segment;

pub const DEFAULT_LIST_LIMIT: u32 = 20;

#[derive(Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
    pub whisper_model: String,
    pub database_connected: bool,
    pub model_loaded: bool,
}

#[derive(Serialize, Deserialize)]
pub struct TranscribeResponseDto {
    pub transcription_id: String,
    pub transcription: String,
    pub language: String,
    pub duration: f64,
    pub segments_count: usize,
    pub status: String,
}

#[derive(Serialize)]
pub struct TranscriptionDetailDto {
    pub transcription_id: String,
    pub audio_url: String,
    pub transcription: String,
    pub language: String,
    pub duration: f64,
    pub segments: Vec<Segment>,
    pub user_id: Option<String>,
    pub created_at: String,
    pub status: RecordStatus,
}

impl From<TranscriptionRecord> for TranscriptionDetailDto {
    fn from(record: TranscriptionRecord) -> Self {
        Self {
            transcription_id: record.id,
            audio_url: record.audio_url,
            transcription: record.transcription,
            language: record.language,
            duration: record.duration,
            segments: record.segments,
            user_id: record.user_id,
            created_at: record.created_at.to_rfc3339(),
            status: record.status,
        }
    }
}

#[derive(Serialize)]
pub struct TranscriptionSummaryDto {
    pub transcription_id: String,
    pub audio_url: String,
    pub transcription: String,
    pub language: String,
    pub duration: f64,
    pub created_at: String,
    pub status: RecordStatus,
}

impl From<TranscriptionRecord> for TranscriptionSummaryDto {
    fn from(record: TranscriptionRecord) -> Self {
        Self {
            transcription_id: record.id,
            audio_url: record.audio_url,
            transcription: record.transcription,
            language: record.language,
            duration: record.duration,
            created_at: record.created_at.to_rfc3339(),
            status: record.status,
        }
    }
}

#[derive(Serialize)]
pub struct TranscriptionListDto {
    pub transcriptions: Vec<TranscriptionSummaryDto>,
    pub count: usize,
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize)]
pub struct ErrorDto {
    pub error: String,
    pub status: &'static str,
}

/// Output of the command-line variant.
#[derive(Serialize)]
#[serde(untagged)]
pub enum CliOutput {
    Transcript {
        language: String,
        duration: f64,
        text: String,
    },
    Error {
        error: String,
    },
}
