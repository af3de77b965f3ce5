use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "url-transcribe",
    about = "URL Transcribe - download audio from a URL and transcribe it with Whisper",
    long_about = "An HTTP service that downloads audio from a URL, transcribes it with a local Whisper model and stores the transcript, plus a client for it.",
    after_help = "EXAMPLES:\n    # Fetch a model and start the service\n    url-transcribe download-model base\n    url-transcribe serve --port 5000\n\n    # Ask a running service to transcribe a URL\n    url-transcribe client https://example.com/lecture.mp3 --user-id 42\n\n    # One-off transcription without the service\n    transcribe-url https://example.com/lecture.mp3"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP transcription service
    #[command(name = "serve")]
    Serve {
        /// Overrides HOST
        #[arg(long)]
        host: Option<String>,

        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send a URL to a running service
    #[command(name = "client")]
    Client {
        audio_url: String,

        #[arg(long)]
        user_id: Option<String>,

        #[arg(long, default_value = "http://localhost:5000")]
        server_url: String,

        /// Seconds to wait for the transcription
        #[arg(long, default_value = "300")]
        timeout: u64,
    },
    /// Download a ggml Whisper model
    #[command(name = "download-model")]
    DownloadModel {
        #[arg(value_parser = validate_model_name)]
        model: String,

        /// Defaults to WHISPER_MODELS_DIR, then ./models
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },
}

pub fn validate_model_name(s: &str) -> Result<String, String> {
    crate::whisper::models::validate_model(s)
        .map(|()| s.to_string())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["url-transcribe", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn rejects_unknown_model() {
        assert!(Cli::try_parse_from(["url-transcribe", "download-model", "enormous"]).is_err());
    }
}
