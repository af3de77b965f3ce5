use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::whisper::resampler::{WHISPER_SAMPLE_RATE, resample_to_16khz};

/// Decodes an audio file into 16 kHz mono samples.
pub fn decode_file(path: &Path) -> Result<Vec<f32>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| anyhow!("Unsupported audio container: {e}"))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("No audio track found"))?;
    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| anyhow!("Unsupported audio codec: {e}"))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(anyhow!("Failed to read audio packet: {e}")),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping corrupt audio frame: {e}");
                continue;
            }
            Err(e) => return Err(anyhow!("Failed to decode audio: {e}")),
        };

        let spec = *decoded.spec();
        if decoded.frames() == 0 {
            continue;
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        let channels = spec.channels.count().max(1);
        if channels == 1 {
            mono.extend_from_slice(buffer.samples());
        } else {
            mono.extend(
                buffer
                    .samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    if mono.is_empty() {
        return Err(anyhow!("No audio samples decoded"));
    }

    let samples = resample_to_16khz(&mono, source_rate, 1)?;
    debug!(
        "Decoded {} to {} samples ({:.2}s at 16kHz)",
        path.display(),
        samples.len(),
        samples.len() as f64 / WHISPER_SAMPLE_RATE as f64
    );

    Ok(samples)
}
