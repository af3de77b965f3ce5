use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use anyhow::{Result, anyhow};
use log::{debug, error, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::transcript::{Segment, TranscriptionResult};
use crate::whisper::config::WhisperConfig;
use crate::whisper::decoder::decode_file;
use crate::whisper::resampler::WHISPER_SAMPLE_RATE;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("Whisper model not loaded: {0}")]
    ModelUnavailable(String),
    #[error("Transcription failed: {0:#}")]
    Failed(anyhow::Error),
}

/// Raw output of a speech model, before normalization.
#[derive(Clone, Debug, Default)]
pub struct ModelOutput {
    pub text: String,
    pub language: String,
    /// Audio length when the model reports it.
    pub duration: Option<f64>,
    pub segments: Vec<Segment>,
}

/// A loaded speech-to-text model.
pub trait SpeechModel: Send + Sync {
    fn transcribe(&self, path: &Path) -> Result<ModelOutput>;
}

enum ModelState {
    Loading,
    Ready(Arc<dyn SpeechModel>),
    Failed(String),
}

/// Shared handle to the process-wide model.
///
/// Cloning is cheap; all clones observe the same load state.
#[derive(Clone)]
pub struct Transcriber {
    state: Arc<RwLock<ModelState>>,
}

impl Transcriber {
    pub fn loading() -> Self {
        Self {
            state: Arc::new(RwLock::new(ModelState::Loading)),
        }
    }

    pub fn ready(model: impl SpeechModel + 'static) -> Self {
        let transcriber = Self::loading();
        transcriber.install(model);
        transcriber
    }

    pub fn install(&self, model: impl SpeechModel + 'static) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) =
            ModelState::Ready(Arc::new(model));
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) =
            ModelState::Failed(reason.into());
    }

    pub fn is_loaded(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(PoisonError::into_inner),
            ModelState::Ready(_)
        )
    }

    /// Runs `loader` on its own thread and installs the result.
    pub fn load_in_background<M, F>(&self, loader: F) -> JoinHandle<()>
    where
        M: SpeechModel + 'static,
        F: FnOnce() -> Result<M> + Send + 'static,
    {
        let transcriber = self.clone();
        std::thread::spawn(move || match loader() {
            Ok(model) => {
                transcriber.install(model);
                info!("Whisper model loaded");
            }
            Err(e) => {
                error!("Failed to load Whisper model: {e:#}");
                transcriber.mark_failed(format!("{e:#}"));
            }
        })
    }

    fn model(&self) -> Result<Arc<dyn SpeechModel>, TranscriptionError> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            ModelState::Ready(model) => Ok(Arc::clone(model)),
            ModelState::Loading => Err(TranscriptionError::ModelUnavailable(
                "model is still loading".to_string(),
            )),
            ModelState::Failed(reason) => Err(TranscriptionError::ModelUnavailable(reason.clone())),
        }
    }

    /// `ModelUnavailable` unless a model is installed.
    pub fn ensure_ready(&self) -> Result<(), TranscriptionError> {
        self.model().map(|_| ())
    }

    pub async fn transcribe(&self, path: &Path) -> Result<TranscriptionResult, TranscriptionError> {
        let model = self.model()?;
        let path: PathBuf = path.to_path_buf();
        info!("Starting transcription of: {}", path.display());

        let output = tokio::task::spawn_blocking(move || model.transcribe(&path))
            .await
            .map_err(|e| TranscriptionError::Failed(anyhow!("transcription task aborted: {e}")))?
            .map_err(TranscriptionError::Failed)?;

        let result = normalize(output);
        info!(
            "Transcription completed: {} segments, {} characters, language={}",
            result.segments.len(),
            result.text.len(),
            result.language
        );
        Ok(result)
    }
}

fn normalize(output: ModelOutput) -> TranscriptionResult {
    let duration = output
        .duration
        .unwrap_or_else(|| output.segments.iter().map(|s| s.end).sum());

    TranscriptionResult {
        text: output.text.trim().to_string(),
        language: output.language,
        duration,
        segments: output.segments,
    }
}

/// whisper.cpp through whisper-rs.
pub struct WhisperModel {
    ctx: Mutex<WhisperContext>,
    config: WhisperConfig,
}

impl WhisperModel {
    pub fn load(config: WhisperConfig) -> Result<Self> {
        whisper_rs::install_logging_hooks();

        if !config.model_path.exists() {
            return Err(anyhow!(
                "Whisper model not found at {} (run `url-transcribe download-model {}`)",
                config.model_path.display(),
                config.model
            ));
        }

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(config.use_gpu);

        let model_path = config
            .model_path
            .to_str()
            .ok_or_else(|| anyhow!("Model path is not valid UTF-8"))?;
        let ctx = WhisperContext::new_with_params(model_path, ctx_params)
            .map_err(|e| anyhow!("Failed to load model: {}", e))?;

        Ok(Self {
            ctx: Mutex::new(ctx),
            config,
        })
    }
}

impl SpeechModel for WhisperModel {
    fn transcribe(&self, path: &Path) -> Result<ModelOutput> {
        let samples = decode_file(path)?;
        if samples.len() < WHISPER_SAMPLE_RATE as usize {
            return Err(anyhow!("Audio is too short (less than 1 second)"));
        }
        let duration = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.config.language));
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_n_threads(self.config.num_threads);

        // The lock covers state creation only; each run owns its state.
        let mut state = {
            let ctx = self
                .ctx
                .lock()
                .map_err(|_| anyhow!("Failed to acquire whisper context lock"))?;
            ctx.create_state()
                .map_err(|e| anyhow!("Failed to create whisper state: {}", e))?
        };

        state
            .full(params, &samples)
            .map_err(|e| anyhow!("Failed to run transcription: {}", e))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| anyhow!("Failed to get segment count: {}", e))?;

        let mut text = String::new();
        let mut segments = Vec::with_capacity(num_segments.max(0) as usize);

        for i in 0..num_segments {
            let segment_text = state
                .full_get_segment_text(i)
                .map_err(|e| anyhow!("Failed to get segment text: {}", e))?;
            // Timestamps come back in centiseconds.
            let start = state
                .full_get_segment_t0(i)
                .map_err(|e| anyhow!("Failed to get segment start: {}", e))?;
            let end = state
                .full_get_segment_t1(i)
                .map_err(|e| anyhow!("Failed to get segment end: {}", e))?;

            text.push_str(&segment_text);
            segments.push(Segment {
                start: start as f64 / 100.0,
                end: end as f64 / 100.0,
                text: segment_text,
            });
        }

        let language = state
            .full_lang_id_from_state()
            .ok()
            .and_then(whisper_rs::get_lang_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.config.language.clone());

        debug!("Whisper produced {num_segments} segments, language={language}");

        Ok(ModelOutput {
            text,
            language,
            duration: Some(duration),
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct CannedModel(ModelOutput);

    impl SpeechModel for CannedModel {
        fn transcribe(&self, _path: &Path) -> Result<ModelOutput> {
            Ok(self.0.clone())
        }
    }

    struct BrokenModel;

    impl SpeechModel for BrokenModel {
        fn transcribe(&self, _path: &Path) -> Result<ModelOutput> {
            Err(anyhow!("unsupported codec"))
        }
    }

    fn segment(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn loading_model_is_unavailable() {
        let transcriber = Transcriber::loading();
        assert!(!transcriber.is_loaded());

        let err = transcriber.transcribe(Path::new("a.wav")).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn failed_model_reports_load_error() {
        let transcriber = Transcriber::loading();
        transcriber.mark_failed("ggml-base.bin: no such file");

        let err = transcriber.transcribe(Path::new("a.wav")).await.unwrap_err();
        assert!(err.to_string().contains("no such file"));
    }

    #[tokio::test]
    async fn trims_text_and_keeps_reported_duration() {
        let transcriber = Transcriber::ready(CannedModel(ModelOutput {
            text: "  hello world \n".to_string(),
            language: "en".to_string(),
            duration: Some(3.0),
            segments: vec![segment(0.0, 1.5, " hello"), segment(1.5, 2.5, " world")],
        }));

        let result = transcriber.transcribe(Path::new("a.wav")).await.unwrap();
        assert_eq!(result.text, "hello world");
        assert_eq!(result.language, "en");
        assert_eq!(result.duration, 3.0);
        assert_eq!(result.segments.len(), 2);
    }

    #[tokio::test]
    async fn sums_segment_ends_without_reported_duration() {
        let transcriber = Transcriber::ready(CannedModel(ModelOutput {
            text: "a b".to_string(),
            language: "fr".to_string(),
            duration: None,
            segments: vec![segment(0.0, 1.0, "a"), segment(1.0, 2.5, "b")],
        }));

        let result = transcriber.transcribe(Path::new("a.wav")).await.unwrap();
        assert_eq!(result.duration, 3.5);
    }

    #[tokio::test]
    async fn model_errors_are_wrapped() {
        let transcriber = Transcriber::ready(BrokenModel);

        let err = transcriber.transcribe(Path::new("a.wav")).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Failed(_)));
        assert!(err.to_string().contains("unsupported codec"));
    }

    #[test]
    fn background_load_installs_model() {
        let transcriber = Transcriber::loading();
        transcriber
            .load_in_background(|| Ok(CannedModel(ModelOutput::default())))
            .join()
            .unwrap();
        assert!(transcriber.is_loaded());
    }

    #[test]
    fn background_load_failure_leaves_model_unloaded() {
        let transcriber = Transcriber::loading();
        transcriber
            .load_in_background(|| Err::<CannedModel, _>(anyhow!("out of memory")))
            .join()
            .unwrap();
        assert!(!transcriber.is_loaded());
    }

    #[test]
    fn readiness_follows_load_state() {
        let transcriber = Transcriber::loading();
        assert!(matches!(
            transcriber.ensure_ready(),
            Err(TranscriptionError::ModelUnavailable(_))
        ));

        transcriber.install(CannedModel(ModelOutput::default()));
        assert!(transcriber.ensure_ready().is_ok());

        transcriber.mark_failed("corrupt model");
        assert!(transcriber.ensure_ready().is_err());
    }

    /// Waits up to two seconds for a second concurrent run, recording the peak.
    struct OverlapModel {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl SpeechModel for OverlapModel {
        fn transcribe(&self, _path: &Path) -> Result<ModelOutput> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let deadline = Instant::now() + Duration::from_secs(2);
            while self.in_flight.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            self.peak
                .fetch_max(self.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ModelOutput::default())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_requests_run_inference_in_parallel() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let transcriber = Transcriber::ready(OverlapModel {
            in_flight: Arc::clone(&in_flight),
            peak: Arc::clone(&peak),
        });

        let (a, b) = tokio::join!(
            transcriber.transcribe(Path::new("a.wav")),
            transcriber.transcribe(Path::new("b.wav"))
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[ignore] // Requires a whisper model file in WHISPER_MODEL_PATH
    fn whisper_model_runs_overlap() {
        let model_path = std::env::var("WHISPER_MODEL_PATH").unwrap();
        let model = Arc::new(
            WhisperModel::load(WhisperConfig {
                model_path: PathBuf::from(model_path),
                use_gpu: false,
                num_threads: 1,
                ..WhisperConfig::default()
            })
            .unwrap(),
        );

        let wav = crate::whisper::decoder::tests::build_wav(16_000, &vec![0; 16_000 * 20]);
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        std::fs::write(file.path(), wav).unwrap();

        let started = Instant::now();
        model.transcribe(file.path()).unwrap();
        let single = started.elapsed();

        let started = Instant::now();
        std::thread::scope(|scope| {
            for _ in 0..2 {
                let model = Arc::clone(&model);
                let path = file.path();
                scope.spawn(move || model.transcribe(path).unwrap());
            }
        });
        let pair = started.elapsed();

        // Two serialized runs would take about twice as long as one.
        assert!(pair < single.mul_f64(1.8), "single {single:?}, pair {pair:?}");
    }

    #[test]
    fn missing_model_file_fails_to_load() {
        let config = WhisperConfig {
            model_path: PathBuf::from("/nonexistent/ggml-base.bin"),
            ..WhisperConfig::default()
        };
        let err = WhisperModel::load(config).err().unwrap().to_string();
        assert!(err.contains("not found"), "got: {err}");
    }

    #[test]
    #[ignore] // Requires a whisper model file in WHISPER_MODEL_PATH
    fn transcribes_silence_with_real_model() {
        let model_path = std::env::var("WHISPER_MODEL_PATH").unwrap();
        let model = WhisperModel::load(WhisperConfig {
            model_path: PathBuf::from(model_path),
            use_gpu: false,
            ..WhisperConfig::default()
        })
        .unwrap();

        let wav = crate::whisper::decoder::tests::build_wav(16_000, &vec![0; 48_000]);
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        std::fs::write(file.path(), wav).unwrap();

        let output = model.transcribe(file.path()).unwrap();
        assert_eq!(output.duration, Some(3.0));
    }
}
