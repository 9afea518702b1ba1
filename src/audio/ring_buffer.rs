//! Sample hand-off from the cpal callback to the thread running a capture.
//!
//! The producer only publishes whole VAD frames, so the end-pointer never
//! sees a partial one. When the reader falls behind, new frames are dropped
//! and counted instead of overwriting audio it has not read yet.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::capture::{CHUNK_SAMPLES, TARGET_SAMPLE_RATE};

/// Samples needed to hold `span` of audio, in whole frames, at least one.
fn capacity_for(span: Duration) -> usize {
    let samples = (span.as_secs_f64() * TARGET_SAMPLE_RATE as f64).ceil() as usize;
    samples.div_ceil(CHUNK_SAMPLES).max(1) * CHUNK_SAMPLES
}

/// Write half, moved into the cpal callback.
pub struct FrameProducer {
    ring: HeapProd<f32>,
    partial: Vec<f32>,
    dropped: Arc<AtomicUsize>,
}

/// Read half, kept by the capturing thread.
pub struct FrameConsumer {
    ring: HeapCons<f32>,
    dropped: Arc<AtomicUsize>,
}

/// A ring with room for `span` of 16 kHz mono audio.
pub fn frame_ring(span: Duration) -> (FrameProducer, FrameConsumer) {
    let (ring_prod, ring_cons) = HeapRb::<f32>::new(capacity_for(span)).split();
    let dropped = Arc::new(AtomicUsize::new(0));
    let producer = FrameProducer {
        ring: ring_prod,
        partial: Vec::with_capacity(CHUNK_SAMPLES * 2),
        dropped: dropped.clone(),
    };
    (producer, FrameConsumer { ring: ring_cons, dropped })
}

impl FrameProducer {
    /// Buffer `samples` and publish every frame completed by them.
    pub fn push(&mut self, samples: &[f32]) {
        self.partial.extend_from_slice(samples);
        let whole = self.partial.len() / CHUNK_SAMPLES * CHUNK_SAMPLES;
        for frame in self.partial[..whole].chunks_exact(CHUNK_SAMPLES) {
            if self.ring.vacant_len() < CHUNK_SAMPLES {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            self.ring.push_slice(frame);
        }
        self.partial.drain(..whole);
    }
}

impl FrameConsumer {
    /// Append every published frame to `out`. Returns the samples moved.
    pub fn drain_into(&mut self, out: &mut Vec<f32>) -> usize {
        let start = out.len();
        out.resize(start + self.ring.occupied_len(), 0.0);
        let read = self.ring.pop_slice(&mut out[start..]);
        out.truncate(start + read);
        read
    }

    /// Frames lost because the reader fell behind.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
