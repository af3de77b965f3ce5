use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use futures_util::StreamExt;
use log::info;
use tokio::io::AsyncWriteExt;

const AVAILABLE_MODELS: &[&str] = &[
    "tiny",
    "tiny.en",
    "tiny-q5_1",
    "tiny.en-q5_1",
    "tiny-q8_0",
    "base",
    "base.en",
    "base-q5_1",
    "base.en-q5_1",
    "base-q8_0",
    "small",
    "small.en",
    "small.en-tdrz",
    "small-q5_1",
    "small.en-q5_1",
    "small-q8_0",
    "medium",
    "medium.en",
    "medium-q5_0",
    "medium.en-q5_0",
    "medium-q8_0",
    "large-v1",
    "large-v2",
    "large-v2-q5_0",
    "large-v2-q8_0",
    "large-v3",
    "large-v3-q5_0",
    "large-v3-turbo",
    "large-v3-turbo-q5_0",
    "large-v3-turbo-q8_0",
];

pub fn list_available_models() -> String {
    let mut output = String::new();
    output.push_str("\nAvailable models:");

    let mut current_class = "";
    for model in AVAILABLE_MODELS {
        let model_class = model.split(&['.', '-'][..]).next().unwrap_or("");
        if model_class != current_class {
            output.push_str(&format!("\n {model_class}"));
            current_class = model_class;
        }
        output.push_str(&format!(" {model}"));
    }

    output.push_str("\n\n.en = english-only  -q5_[01] = quantized  -tdrz = tinydiarize\n");
    output
}

pub fn validate_model(model: &str) -> Result<()> {
    if AVAILABLE_MODELS.contains(&model) {
        Ok(())
    } else {
        Err(anyhow!("Invalid model: {}\n{}", model, list_available_models()))
    }
}

pub fn model_file_path(model: &str, models_dir: impl AsRef<Path>) -> PathBuf {
    models_dir.as_ref().join(format!("ggml-{model}.bin"))
}

pub fn model_url(model: &str) -> String {
    let repo = if model.contains("tdrz") {
        "https://huggingface.co/akashmjn/tinydiarize-whisper.cpp"
    } else {
        "https://huggingface.co/ggerganov/whisper.cpp"
    };
    format!("{repo}/resolve/main/ggml-{model}.bin")
}

/// Fetches a ggml model into `models_dir`, skipping the download when the
/// file is already present. Returns the model path.
pub async fn download_model(model: &str, models_dir: &Path) -> Result<PathBuf> {
    validate_model(model)?;

    let file_path = model_file_path(model, models_dir);
    if file_path.exists() {
        info!("Model '{model}' already exists at {}", file_path.display());
        return Ok(file_path);
    }

    tokio::fs::create_dir_all(models_dir)
        .await
        .with_context(|| format!("Failed to create directory {}", models_dir.display()))?;

    let url = model_url(model);
    info!("Downloading ggml model '{model}' from {url}");

    let response = reqwest::get(&url)
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to download {url}"))?;

    // Stays under a temporary name until the whole body is on disk.
    let partial = tempfile::Builder::new()
        .prefix(".ggml-")
        .suffix(".part")
        .tempfile_in(models_dir)?;
    let mut output = tokio::fs::File::from_std(partial.reopen()?);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("Download of {url} was interrupted"))?;
        output.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    output.flush().await?;
    drop(output);

    partial
        .persist(&file_path)
        .map_err(|e| anyhow!("Failed to save model to {}: {}", file_path.display(), e))?;

    info!(
        "Done! Model '{model}' ({written} bytes) saved in '{}'",
        file_path.display()
    );
    Ok(file_path)
}
