use crate::download::DownloadError;
use crate::store::StorageError;
use crate::whisper::TranscriptionError;

/// Every way a request can fail, one variant per failure kind.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Transcription not found: {0}")]
    NotFound(String),
}
