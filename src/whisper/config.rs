use std::path::PathBuf;

use anyhow::Result;

use crate::config::{EnvLookup, parse_flag, parse_var};
use crate::whisper::models;

#[derive(Clone, Debug)]
pub struct WhisperConfig {
    /// Size selector from the ggml catalog, e.g. `base` or `small.en`.
    pub model: String,
    pub model_path: PathBuf,
    pub use_gpu: bool,
    /// Forced language code, or `auto` to let whisper detect it.
    pub language: String,
    pub num_threads: i32,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            model_path: models::model_file_path("base", "models"),
            use_gpu: true,
            language: "auto".to_string(),
            num_threads: 4,
        }
    }
}

impl WhisperConfig {
    pub fn from_lookup(lookup: &EnvLookup) -> Result<Self> {
        let defaults = Self::default();

        let model = lookup("WHISPER_MODEL").unwrap_or(defaults.model);
        models::validate_model(&model)?;

        let models_dir = lookup("WHISPER_MODELS_DIR").unwrap_or_else(|| "models".to_string());
        let model_path = lookup("WHISPER_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| models::model_file_path(&model, &models_dir));

        Ok(Self {
            model,
            model_path,
            use_gpu: parse_flag(lookup, "WHISPER_USE_GPU", defaults.use_gpu)?,
            language: lookup("WHISPER_LANGUAGE").unwrap_or(defaults.language),
            num_threads: parse_var(lookup, "WHISPER_THREADS", defaults.num_threads)?,
        })
    }
}
