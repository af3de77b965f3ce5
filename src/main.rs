use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;

use url_transcribe::cli::{Cli, Commands};
use url_transcribe::client::run_client;
use url_transcribe::config::{ClientConfig, ServiceConfig, process_env};
use url_transcribe::server::run_server;
use url_transcribe::whisper::models::download_model;

fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = ServiceConfig::from_env()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            init_logging(config.log_level());
            run_server(config).await
        }
        Commands::Client {
            audio_url,
            user_id,
            server_url,
            timeout,
        } => {
            init_logging("warn");
            run_client(ClientConfig {
                server_url: server_url.trim_end_matches('/').to_string(),
                audio_url,
                user_id,
                timeout: Duration::from_secs(timeout),
            })
            .await
        }
        Commands::DownloadModel { model, models_dir } => {
            init_logging("info");
            let models_dir = models_dir
                .or_else(|| process_env()("WHISPER_MODELS_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("models"));

            let path = download_model(&model, &models_dir).await?;
            info!("Model ready at {}", path.display());
            println!("You can now use it like this:");
            println!("  $ WHISPER_MODEL={model} url-transcribe serve");
            Ok(())
        }
    }
}
