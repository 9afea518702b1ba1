//! Energy-based voice activity detection and phrase end-pointing.

use std::collections::VecDeque;

use super::capture::{CHUNK_SAMPLES, TARGET_SAMPLE_RATE};
use super::CaptureWindow;

/// Trailing silence that ends a phrase.
const PAUSE_SECS: f32 = 0.8;
/// Audio kept from before speech onset so the first syllable is not clipped.
const PRE_ROLL_SECS: f32 = 0.3;
/// Leading audio used to measure the room's noise floor.
const CALIBRATION_SECS: f32 = 0.3;
/// Speech must be this many times louder than the measured floor.
const NOISE_MARGIN: f32 = 2.0;

/// Mean absolute amplitude of a chunk.
pub fn detect(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f32 = chunk.iter().map(|s| s.abs()).sum();
    sum / chunk.len() as f32
}

fn secs_to_samples(secs: f32) -> usize {
    (secs * TARGET_SAMPLE_RATE as f32) as usize
}

#[derive(Debug, PartialEq)]
pub enum Endpoint {
    /// Keep feeding audio.
    Pending,
    /// A full phrase, ready for transcription.
    Phrase(Vec<f32>),
    /// Nobody started speaking inside the wait window.
    TimedOut,
}

/// Splits a 16 kHz stream into one phrase.
///
/// Time is measured in samples, so the end-pointer is deterministic and
/// independent of how fast audio is delivered.
pub struct Endpointer {
    threshold: f32,
    calibration: Vec<f32>,
    calibration_len: usize,
    pending: Vec<f32>,
    pre_roll: VecDeque<f32>,
    phrase: Vec<f32>,
    in_speech: bool,
    silence: usize,
    waited: usize,
    wait_limit: usize,
    phrase_limit: usize,
}

impl Endpointer {
    pub fn new(window: CaptureWindow, threshold: f32) -> Self {
        Self {
            threshold,
            calibration: Vec::new(),
            calibration_len: secs_to_samples(CALIBRATION_SECS),
            pending: Vec::with_capacity(CHUNK_SAMPLES * 2),
            pre_roll: VecDeque::new(),
            phrase: Vec::new(),
            in_speech: false,
            silence: 0,
            waited: 0,
            wait_limit: secs_to_samples(window.wait.as_secs_f32()),
            phrase_limit: secs_to_samples(window.phrase_limit.as_secs_f32()),
        }
    }

    /// Skip noise-floor calibration (used when the floor is already known).
    pub fn without_calibration(mut self) -> Self {
        self.calibration_len = 0;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn push(&mut self, samples: &[f32]) -> Endpoint {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= CHUNK_SAMPLES {
            let frame: Vec<f32> = self.pending.drain(..CHUNK_SAMPLES).collect();
            match self.push_frame(&frame) {
                Endpoint::Pending => {}
                done => return done,
            }
        }
        Endpoint::Pending
    }

    fn push_frame(&mut self, frame: &[f32]) -> Endpoint {
        if self.calibration.len() < self.calibration_len {
            self.calibration.extend_from_slice(frame);
            self.waited += frame.len();
            if self.calibration.len() >= self.calibration_len {
                let floor = detect(&self.calibration);
                self.threshold = self.threshold.max(floor * NOISE_MARGIN);
            }
            return Endpoint::Pending;
        }

        let voiced = detect(frame) > self.threshold;

        if !self.in_speech {
            if voiced {
                self.in_speech = true;
                self.phrase.extend(self.pre_roll.drain(..));
                self.phrase.extend_from_slice(frame);
                return Endpoint::Pending;
            }
            self.pre_roll.extend(frame.iter().copied());
            let cap = secs_to_samples(PRE_ROLL_SECS);
            while self.pre_roll.len() > cap {
                self.pre_roll.pop_front();
            }
            self.waited += frame.len();
            if self.waited >= self.wait_limit {
                return Endpoint::TimedOut;
            }
            return Endpoint::Pending;
        }

        self.phrase.extend_from_slice(frame);
        if voiced {
            self.silence = 0;
        } else {
            self.silence += frame.len();
        }
        if self.silence >= secs_to_samples(PAUSE_SECS) || self.phrase.len() >= self.phrase_limit {
            return Endpoint::Phrase(std::mem::take(&mut self.phrase));
        }
        Endpoint::Pending
    }
}
