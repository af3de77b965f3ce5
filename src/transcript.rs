use serde::{Deserialize, Serialize};

/// A timestamped span of recognized speech, times in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: String,
    pub duration: f64,
    pub segments: Vec<Segment>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TranscriptionRequest {
    pub audio_url: Option<String>,
    pub user_id: Option<String>,
}
