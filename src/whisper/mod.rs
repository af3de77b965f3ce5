pub mod config;
pub mod decoder;
pub mod models;
pub mod resampler;
pub mod transcriber;

pub use config::WhisperConfig;
pub use transcriber::{ModelOutput, SpeechModel, Transcriber, TranscriptionError, WhisperModel};
