use std::ffi::OsString;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;

use url_transcribe::config::{download_config, process_env};
use url_transcribe::download::Downloader;
use url_transcribe::dto::CliOutput;
use url_transcribe::pipeline::{transcribe_url, validate};
use url_transcribe::transcript::{TranscriptionRequest, TranscriptionResult};
use url_transcribe::whisper::{Transcriber, WhisperConfig, WhisperModel};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Transcribe the audio behind a URL and print the result as JSON.
#[derive(Parser, Debug)]
#[command(name = "transcribe-url")]
struct Args {
    /// Audio URL to transcribe
    url: Option<String>,

    /// Ignored
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    rest: Vec<String>,
}

/// The URL argument; anything after it is ignored.
fn url_argument<I, T>(args: I) -> Option<String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    match Args::try_parse_from(&args) {
        Ok(parsed) => parsed.url,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => args.get(1).map(|arg| arg.to_string_lossy().into_owned()),
    }
}

async fn transcribe(url: String) -> Result<TranscriptionResult> {
    let request = validate(TranscriptionRequest {
        audio_url: Some(url),
        user_id: None,
    })?;

    let lookup = process_env();
    let downloader = Downloader::new(download_config(&lookup, DOWNLOAD_TIMEOUT)?)?;
    let whisper_config = WhisperConfig::from_lookup(&lookup)?;
    let transcriber = Transcriber::ready(WhisperModel::load(whisper_config)?);

    Ok(transcribe_url(&downloader, &transcriber, &request.audio_url).await?)
}

fn missing_url() -> CliOutput {
    CliOutput::Error {
        error: "No URL provided".to_string(),
    }
}

fn output_for(outcome: Result<TranscriptionResult>) -> CliOutput {
    match outcome {
        Ok(result) => CliOutput::Transcript {
            language: result.language,
            duration: result.duration,
            text: result.text,
        },
        Err(e) => CliOutput::Error {
            error: format!("{e:#}"),
        },
    }
}

fn print_json(output: &CliOutput) {
    match serde_json::to_string_pretty(output) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Some(url) = url_argument(std::env::args_os()) else {
        print_json(&missing_url());
        std::process::exit(1);
    };

    print_json(&output_for(transcribe(url).await));
}
