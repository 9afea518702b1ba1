//! Audio capture via cpal.
//!
//! Opens the default (or named) input device at its native rate, converts
//! to 16 kHz mono f32 and hands it to a [`FrameProducer`], which publishes
//! whole VAD frames to the end-pointing loop.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tracing::{debug, error};

use super::ring_buffer::FrameProducer;
use super::CaptureError;

/// Sample rate the end-pointer and STT expect.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Chunk size in samples (30 ms at 16 kHz), one VAD frame.
pub const CHUNK_SAMPLES: usize = 480;

/// List available input device names.
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

struct CaptureConfig {
    device: cpal::Device,
    stream_config: StreamConfig,
    native_rate: u32,
}

fn resolve_device(device_name: Option<&str>) -> Result<CaptureConfig, CaptureError> {
    let host = cpal::default_host();
    let unavailable = CaptureError::DeviceUnavailable;

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| unavailable(format!("Failed to enumerate input devices: {e}")))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| unavailable(format!("Input device not found: {name}")))?
    } else {
        host.default_input_device()
            .ok_or_else(|| unavailable("No default input device available".to_string()))?
    };

    let default_config = device
        .default_input_config()
        .map_err(|e| unavailable(format!("Failed to get default input config: {e}")))?;

    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();
    debug!(
        device = %device.name().unwrap_or_else(|_| "unknown".into()),
        native_rate,
        channels,
        "Opening input device"
    );

    Ok(CaptureConfig {
        device,
        stream_config: StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(native_rate),
            buffer_size: cpal::BufferSize::Default,
        },
        native_rate,
    })
}

/// Linear resampler for mono f32 samples.
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }
    output
}

/// Down-mix interleaved audio to mono by averaging channels.
fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Start capturing into `producer`. The returned stream must be kept alive
/// (and on the thread that created it) for as long as audio is wanted.
pub fn start_capture(
    mut producer: FrameProducer,
    device_name: Option<&str>,
) -> Result<Stream, CaptureError> {
    let cfg = resolve_device(device_name)?;
    let native_rate = cfg.native_rate;
    let channels = cfg.stream_config.channels;

    let stream = cfg
        .device
        .build_input_stream(
            &cfg.stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = to_mono(data, channels);
                let resampled = resample_linear(&mono, native_rate, TARGET_SAMPLE_RATE);
                producer.push(&resampled);
            },
            move |err| {
                error!("Audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| {
            CaptureError::DeviceUnavailable(format!("Failed to build input stream: {e}"))
        })?;

    stream
        .play()
        .map_err(|e| {
            CaptureError::DeviceUnavailable(format!("Failed to start input stream: {e}"))
        })?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_averages_channels() {
        let stereo = [0.5, -0.5, 1.0, 0.0];
        assert_eq!(to_mono(&stereo, 2), vec![0.0, 0.5]);
        assert_eq!(to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_halves_length() {
        let input: Vec<f32> = (0..480).map(|i| i as f32).collect();
        let out = resample_linear(&input, 32_000, 16_000);
        assert_eq!(out.len(), 240);
        assert_eq!(out[1], 2.0);
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }
}
