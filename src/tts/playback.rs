//! Audio playback via rodio.
//!
//! Plays f32 PCM audio through the default output device with volume
//! control and interruptible playback. The output stream is opened per
//! utterance on the calling thread; only the sink is shared so `stop` can
//! reach it from elsewhere.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};

use super::TtsError;
use crate::speech::interrupt::SpeechTicket;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct AudioPlayer {
    sink: Mutex<Option<Arc<Sink>>>,
    volume: f32,
}

impl AudioPlayer {
    /// `volume`: 0.0 = silent, 1.0 = full volume.
    pub fn new(volume: f32) -> Self {
        Self {
            sink: Mutex::new(None),
            volume: volume.clamp(0.0, 1.0),
        }
    }

    /// Play mono f32 PCM at the given sample rate, blocking until done,
    /// stopped, or the ticket is cancelled.
    pub fn play(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        ticket: &SpeechTicket,
    ) -> Result<(), TtsError> {
        if samples.is_empty() {
            return Ok(());
        }

        let (_stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| TtsError::PlaybackError(format!("Failed to open audio output: {}", e)))?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| TtsError::PlaybackError(format!("Failed to create audio sink: {}", e)))?;
        let sink = Arc::new(sink);
        sink.set_volume(self.volume);
        sink.append(SamplesBuffer::new(1, sample_rate, samples));

        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(sink.clone());

        while !sink.empty() {
            if ticket.is_cancelled() {
                sink.stop();
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        self.sink.lock().unwrap_or_else(|e| e.into_inner()).take();

        if ticket.is_cancelled() {
            Err(TtsError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Stop current playback immediately.
    pub fn stop(&self) {
        if let Some(sink) = self.sink.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            sink.stop();
        }
    }
}
