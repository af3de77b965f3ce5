use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const DEFAULT_SUFFIX: &str = ".mp3";
const TEMP_PREFIX: &str = "url-transcribe-";

/// Content-type fragments mapped to a file suffix, first match wins.
const SUFFIX_BY_CONTENT_TYPE: &[(&str, &str)] = &[
    ("mp4", ".mp4"),
    ("wav", ".wav"),
    ("flac", ".flac"),
    ("ogg", ".ogg"),
    ("webm", ".webm"),
    ("m4a", ".m4a"),
];

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("File too large: size {size} bytes exceeds the maximum of {limit} bytes")]
    SizeExceeded { size: u64, limit: u64 },
    #[error("Failed to download audio file: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to write temporary audio file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct DownloadConfig {
    pub max_size: u64,
    pub timeout: Duration,
    /// Directory for temporary files, the OS default when unset.
    pub temp_dir: Option<PathBuf>,
}

/// An audio file fetched to local disk.
///
/// The file lives exactly as long as this value: it is removed by
/// [`DownloadedAudio::cleanup`] or, failing that, when dropped.
#[derive(Debug)]
pub struct DownloadedAudio {
    file: NamedTempFile,
    size: u64,
}

impl DownloadedAudio {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn cleanup(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => info!("Cleaned up temporary file: {}", path.display()),
            Err(e) => warn!("Failed to remove temporary file {}: {e}", path.display()),
        }
    }
}

#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn download(&self, url: &str) -> Result<DownloadedAudio, DownloadError> {
        let limit = self.config.max_size;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        if let Some(declared) = response.content_length() {
            if declared > limit {
                warn!("Rejecting {url}: declared size {declared} bytes exceeds {limit} bytes");
                return Err(DownloadError::SizeExceeded {
                    size: declared,
                    limit,
                });
            }
        }

        let suffix = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(suffix_for_content_type)
            .unwrap_or(DEFAULT_SUFFIX);

        let temp = self.create_temp_file(suffix)?;
        debug!("Streaming {url} into {}", temp.path().display());

        let mut output = tokio::fs::File::from_std(temp.reopen()?);
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(output);
                    discard(temp);
                    return Err(e.into());
                }
            };

            downloaded += chunk.len() as u64;
            if downloaded > limit {
                drop(output);
                discard(temp);
                warn!("Aborted {url}: streamed {downloaded} bytes, limit is {limit} bytes");
                return Err(DownloadError::SizeExceeded {
                    size: downloaded,
                    limit,
                });
            }

            if let Err(e) = output.write_all(&chunk).await {
                drop(output);
                discard(temp);
                return Err(e.into());
            }
        }

        if let Err(e) = output.flush().await {
            drop(output);
            discard(temp);
            return Err(e.into());
        }

        info!("Downloaded audio file: {downloaded} bytes");
        Ok(DownloadedAudio {
            file: temp,
            size: downloaded,
        })
    }

    fn create_temp_file(&self, suffix: &str) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(suffix);

        match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

fn discard(temp: NamedTempFile) {
    if let Err(e) = temp.close() {
        warn!("Failed to remove partial download: {e}");
    }
}

pub fn suffix_for_content_type(content_type: &str) -> &'static str {
    let content_type = content_type.to_ascii_lowercase();
    SUFFIX_BY_CONTENT_TYPE
        .iter()
        .find(|(fragment, _)| content_type.contains(fragment))
        .map(|(_, suffix)| *suffix)
        .unwrap_or(DEFAULT_SUFFIX)
}
