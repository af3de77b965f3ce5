//! Shared fixtures: a local audio host, fake models and app wiring.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use async_trait::async_trait;
use futures_util::stream;

use url_transcribe::download::{DownloadConfig, Downloader};
use url_transcribe::pipeline::TranscriptionService;
use url_transcribe::server::AppState;
use url_transcribe::store::{
    ListQuery, SqliteTranscriptionStore, StorageError, TranscriptionRecord, TranscriptionStore,
};
use url_transcribe::transcript::TranscriptionResult;
use url_transcribe::whisper::decoder::decode_file;
use url_transcribe::whisper::resampler::WHISPER_SAMPLE_RATE;
use url_transcribe::whisper::{ModelOutput, SpeechModel, Transcriber};

pub fn build_wav(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_size = (samples.len() * 2) as u32;
    let mut wav = Vec::with_capacity(44 + data_size as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }
    wav
}

async fn silence_wav() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("audio/wav")
        .body(build_wav(16_000, &vec![0; 48_000]))
}

async fn ten_bytes() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("audio/mpeg")
        .body(vec![7u8; 10])
}

async fn unsized_stream() -> HttpResponse {
    let chunks = (0..5).map(|_| Ok::<_, actix_web::Error>(web::Bytes::from_static(b"ab")));
    HttpResponse::Ok()
        .content_type("audio/flac")
        .streaming(stream::iter(chunks))
}

async fn redirect() -> HttpResponse {
    HttpResponse::Found()
        .insert_header(("Location", "/silence.wav"))
        .finish()
}

/// Serves the fixture only to browser-like clients.
async fn browser_only(req: HttpRequest) -> HttpResponse {
    let browser = req
        .headers()
        .get("User-Agent")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|agent| agent.starts_with("Mozilla/5.0"));

    if browser {
        silence_wav().await
    } else {
        HttpResponse::Forbidden().finish()
    }
}

async fn missing() -> HttpResponse {
    HttpResponse::NotFound().finish()
}

/// Local HTTP host for fixture audio.
pub struct AudioHost {
    pub base_url: String,
}

impl AudioHost {
    pub async fn start() -> Self {
        let server = HttpServer::new(|| {
            App::new()
                .route("/silence.wav", web::get().to(silence_wav))
                .route("/ten-bytes.mp3", web::get().to(ten_bytes))
                .route("/unsized", web::get().to(unsized_stream))
                .route("/redirect", web::get().to(redirect))
                .route("/browser-only.wav", web::get().to(browser_only))
                .route("/missing", web::get().to(missing))
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("bind audio host");

        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());

        Self {
            base_url: format!("http://{addr}"),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Decodes the file for real and reports its length; recognizes nothing.
pub struct DecodingModel;

impl SpeechModel for DecodingModel {
    fn transcribe(&self, path: &Path) -> anyhow::Result<ModelOutput> {
        let samples = decode_file(path)?;
        Ok(ModelOutput {
            text: " ".to_string(),
            language: "en".to_string(),
            duration: Some(samples.len() as f64 / WHISPER_SAMPLE_RATE as f64),
            segments: Vec::new(),
        })
    }
}

pub struct FailingModel;

impl SpeechModel for FailingModel {
    fn transcribe(&self, _path: &Path) -> anyhow::Result<ModelOutput> {
        Err(anyhow::anyhow!("corrupt audio stream"))
    }
}

pub struct UnreachableStore;

#[async_trait]
impl TranscriptionStore for UnreachableStore {
    async fn store(
        &self,
        _result: &TranscriptionResult,
        _audio_url: &str,
        _user_id: Option<&str>,
    ) -> Result<String, StorageError> {
        Err(StorageError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn get(&self, _id: &str) -> Result<Option<TranscriptionRecord>, StorageError> {
        Err(StorageError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn list(&self, _query: &ListQuery) -> Result<Vec<TranscriptionRecord>, StorageError> {
        Err(StorageError::Database(sqlx::Error::PoolTimedOut))
    }
}

pub async fn memory_store() -> Arc<dyn TranscriptionStore> {
    Arc::new(
        SqliteTranscriptionStore::connect("sqlite::memory:", 1)
            .await
            .expect("in-memory sqlite"),
    )
}

pub fn downloader(max_size: u64, temp_dir: &Path) -> Downloader {
    Downloader::new(DownloadConfig {
        max_size,
        timeout: Duration::from_secs(10),
        temp_dir: Some(temp_dir.to_path_buf()),
    })
    .expect("downloader")
}

pub fn app_state(
    transcriber: Transcriber,
    store: Option<Arc<dyn TranscriptionStore>>,
    max_size: u64,
    temp_dir: &Path,
) -> web::Data<AppState> {
    web::Data::new(AppState {
        service: TranscriptionService::new(downloader(max_size, temp_dir), transcriber, store),
        whisper_model: "base".to_string(),
    })
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read temp dir").count()
}
