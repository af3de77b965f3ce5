use std::sync::Arc;

use log::info;

use crate::download::Downloader;
use crate::error::ServiceError;
use crate::store::{ListQuery, StorageError, TranscriptionRecord, TranscriptionStore};
use crate::transcript::{TranscriptionRequest, TranscriptionResult};
use crate::whisper::Transcriber;

/// A validated request, ready to download.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub audio_url: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredTranscription {
    pub id: String,
    pub result: TranscriptionResult,
}

pub fn validate(request: TranscriptionRequest) -> Result<ValidatedRequest, ServiceError> {
    let audio_url = request
        .audio_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ServiceError::Validation("audio_url is required".to_string()))?;

    let parsed = reqwest::Url::parse(&audio_url)
        .map_err(|e| ServiceError::Validation(format!("audio_url is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ServiceError::Validation(
            "audio_url must use http or https".to_string(),
        ));
    }

    Ok(ValidatedRequest {
        audio_url,
        user_id: request.user_id.filter(|id| !id.is_empty()),
    })
}

/// Download then transcribe, removing the downloaded file on every path.
pub async fn transcribe_url(
    downloader: &Downloader,
    transcriber: &Transcriber,
    audio_url: &str,
) -> Result<TranscriptionResult, ServiceError> {
    transcriber.ensure_ready()?;

    let audio = downloader.download(audio_url).await?;
    let outcome = transcriber.transcribe(audio.path()).await;
    audio.cleanup();
    Ok(outcome?)
}

/// Download, transcribe and persist, for the HTTP service.
#[derive(Clone)]
pub struct TranscriptionService {
    downloader: Downloader,
    transcriber: Transcriber,
    store: Option<Arc<dyn TranscriptionStore>>,
}

impl TranscriptionService {
    pub fn new(
        downloader: Downloader,
        transcriber: Transcriber,
        store: Option<Arc<dyn TranscriptionStore>>,
    ) -> Self {
        Self {
            downloader,
            transcriber,
            store,
        }
    }

    pub fn transcriber(&self) -> &Transcriber {
        &self.transcriber
    }

    pub fn database_connected(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&dyn TranscriptionStore, StorageError> {
        self.store.as_deref().ok_or(StorageError::NotConnected)
    }

    pub async fn process(
        &self,
        request: TranscriptionRequest,
    ) -> Result<StoredTranscription, ServiceError> {
        let request = validate(request)?;
        info!(
            "Processing transcription request for URL: {}",
            request.audio_url
        );

        let result = transcribe_url(&self.downloader, &self.transcriber, &request.audio_url).await?;

        let id = self
            .store()?
            .store(&result, &request.audio_url, request.user_id.as_deref())
            .await?;

        info!("Transcription completed successfully: {id}");
        Ok(StoredTranscription { id, result })
    }

    pub async fn get(&self, id: &str) -> Result<TranscriptionRecord, ServiceError> {
        self.store()?
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Vec<TranscriptionRecord>, ServiceError> {
        Ok(self.store()?.list(query).await?)
    }
}
