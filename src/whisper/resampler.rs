use anyhow::{Result, anyhow};
use rubato::{Resampler, SincFixedIn, SincInterpolationType, WindowFunction};

pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Resamples interleaved audio to 16 kHz, keeping the channel layout.
pub fn resample_to_16khz(audio_data: &[f32], sample_rate: u32, channels: usize) -> Result<Vec<f32>> {
    if sample_rate == WHISPER_SAMPLE_RATE {
        return Ok(audio_data.to_vec());
    }
    if channels == 0 {
        return Err(anyhow!("Audio has no channels"));
    }

    let frames = audio_data.len() / channels;
    if frames == 0 {
        return Err(anyhow!("No audio frames to resample"));
    }

    let params = rubato::SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut input_channels = vec![Vec::with_capacity(frames); channels];
    for frame in audio_data.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            input_channels[ch].push(*sample);
        }
    }

    let resample_ratio = WHISPER_SAMPLE_RATE as f64 / sample_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(resample_ratio, 2.0, params, frames, channels)?;

    // A single pass leaves the tail in the filter; flushing with silence
    // pushes it out so the output covers the whole input.
    let mut resampled = resampler.process(&input_channels, None)?;
    let flushed = resampler.process_partial::<Vec<f32>>(None, None)?;
    for (channel, tail) in resampled.iter_mut().zip(flushed) {
        channel.extend(tail);
    }

    let delay = resampler.output_delay();
    let expected_output_frames = (frames as f64 * resample_ratio).round() as usize;
    let end_frame = (delay + expected_output_frames).min(resampled[0].len());

    let mut output = Vec::with_capacity(expected_output_frames * channels);
    for frame_idx in delay..end_frame {
        for channel in &resampled {
            output.push(channel[frame_idx]);
        }
    }

    Ok(output)
}
