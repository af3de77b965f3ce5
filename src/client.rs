use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::config::ClientConfig;
use crate::dto::{HealthDto, TranscribeResponseDto};

#[derive(Serialize)]
struct TranscribeBody<'a> {
    audio_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

pub async fn send_transcription_request(
    client: &reqwest::Client,
    config: &ClientConfig,
) -> Result<TranscribeResponseDto> {
    let endpoint = format!("{}/transcribe-url", config.server_url);
    println!("🚀 Sending transcription request to: {endpoint}");
    println!("   Audio URL: {}", config.audio_url);
    if let Some(user_id) = &config.user_id {
        println!("   User: {user_id}");
    }

    let response = client
        .post(&endpoint)
        .timeout(config.timeout)
        .json(&TranscribeBody {
            audio_url: &config.audio_url,
            user_id: config.user_id.as_deref(),
        })
        .send()
        .await
        .context("Failed to send request")?;

    let status = response.status();
    let body = response.text().await.context("Failed to read response")?;
    if !status.is_success() {
        bail!("Server returned error {status}: {body}");
    }

    serde_json::from_str(&body).context("Failed to parse transcription response")
}

pub async fn check_server_health(client: &reqwest::Client, server_url: &str) -> Result<HealthDto> {
    let endpoint = format!("{server_url}/health");
    println!("🔍 Checking server health at: {endpoint}");

    let response = client
        .get(&endpoint)
        .send()
        .await
        .context("Failed to connect to server")?;
    if !response.status().is_success() {
        bail!("Server health check failed: {}", response.status());
    }

    let health: HealthDto = response
        .json()
        .await
        .context("Failed to parse health response")?;

    match (health.model_loaded, health.database_connected) {
        (true, true) => println!("✅ Server is healthy (model: {})", health.whisper_model),
        (false, _) => println!("⚠️  Server is up but the Whisper model is not loaded yet"),
        (true, false) => println!("⚠️  Server is up but has no database connection"),
    }
    Ok(health)
}

pub async fn run_client(config: ClientConfig) -> Result<()> {
    println!("🎵 URL Transcribe Client");
    println!("========================");

    let client = reqwest::Client::new();

    if let Err(e) = check_server_health(&client, &config.server_url).await {
        eprintln!("❌ {e:#}");
        eprintln!("💡 Make sure the server is running: url-transcribe serve");
        return Err(e);
    }

    let response = send_transcription_request(&client, &config)
        .await
        .inspect_err(|e| eprintln!("❌ Transcription failed: {e:#}"))?;

    println!("\n✅ Transcription {} completed!", response.transcription_id);
    println!("📝 Result:");
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
