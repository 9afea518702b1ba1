//! Microphone-backed [`SpeechCapture`]: cpal capture, energy end-pointing,
//! then a cloud transcription call.

use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::capture::start_capture;
use super::ring_buffer::frame_ring;
use super::vad::{Endpoint, Endpointer};
use super::{CaptureError, CaptureWindow, SpeechCapture};
use crate::stt::CloudStt;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Audio the callback may run ahead of the reader before frames are dropped.
const READ_SLACK: Duration = Duration::from_secs(2);

pub struct MicrophoneCapture {
    device: Option<String>,
    threshold: f32,
    stt: Option<CloudStt>,
    runtime: Handle,
}

impl MicrophoneCapture {
    /// `stt` of `None` means no recognizer is configured; every capture then
    /// reports the service as unavailable after recording.
    pub fn new(
        device: Option<String>,
        threshold: f32,
        stt: Option<CloudStt>,
        runtime: Handle,
    ) -> Self {
        Self {
            device,
            threshold,
            stt,
            runtime,
        }
    }

    /// Record until the end-pointer yields a phrase or times out.
    fn record(&self, window: CaptureWindow) -> Result<Vec<f32>, CaptureError> {
        let (producer, mut frames) = frame_ring(READ_SLACK);
        // cpal streams are not Send; this one lives and dies on the calling thread.
        let _stream = start_capture(producer, self.device.as_deref())?;
        let mut endpointer = Endpointer::new(window, self.threshold);
        let mut fresh = Vec::new();

        loop {
            thread::sleep(POLL_INTERVAL);
            fresh.clear();
            frames.drain_into(&mut fresh);
            match endpointer.push(&fresh) {
                Endpoint::Pending => {}
                Endpoint::Phrase(audio) => {
                    let dropped = frames.dropped_frames();
                    if dropped > 0 {
                        warn!(dropped, "Capture reader fell behind");
                    }
                    return Ok(audio);
                }
                Endpoint::TimedOut => return Err(CaptureError::NoSpeech),
            }
        }
    }
}

impl SpeechCapture for MicrophoneCapture {
    fn capture(&self, window: CaptureWindow) -> Result<String, CaptureError> {
        let audio = self.record(window)?;
        debug!(samples = audio.len(), "Phrase recorded");

        let stt = self
            .stt
            .as_ref()
            .ok_or_else(|| CaptureError::ServiceUnavailable("no STT adapter configured".into()))?;

        let text = self
            .runtime
            .block_on(stt.transcribe(&audio))
            .map_err(|e| CaptureError::ServiceUnavailable(e.to_string()))?;

        // Transcribers punctuate; exact-match commands like "pause" must not see it.
        let text = text
            .trim()
            .trim_end_matches(['.', '!', '?'])
            .trim()
            .to_lowercase();
        if text.is_empty() {
            return Err(CaptureError::Unintelligible);
        }
        info!(text = %text, "Recognized");
        Ok(text)
    }
}
