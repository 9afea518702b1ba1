//! Ordered single-consumer speech queue.
//!
//! One worker thread pops requests in submission order and blocks on one
//! synthesis call per request. Requests whose ticket was cancelled before
//! they started are discarded. When the backend fails, the worker rebuilds
//! it through the factory a bounded number of times before dropping the
//! request.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::interrupt::{Interrupt, SpeechTicket};
use crate::tts::{TtsEngine, TtsError};

/// How many times a failing backend is rebuilt for a single request.
pub const MAX_REINIT_ATTEMPTS: usize = 2;

pub type EngineFactory = Box<dyn Fn() -> anyhow::Result<Box<dyn TtsEngine>> + Send + Sync>;

#[derive(Debug)]
struct SpeechRequest {
    text: String,
    ticket: SpeechTicket,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<SpeechRequest>,
    speaking: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Signalled when work arrives or on shutdown.
    work: Condvar,
    /// Signalled when the worker goes idle.
    idle: Condvar,
    engine: Mutex<Option<Arc<dyn TtsEngine>>>,
    voice: Mutex<Option<String>>,
    factory: EngineFactory,
    interrupt: Interrupt,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_engine(&self) -> Option<Arc<dyn TtsEngine>> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Build a fresh backend, carrying over the selected voice.
    fn rebuild_engine(&self) -> Option<Arc<dyn TtsEngine>> {
        match (self.factory)() {
            Ok(engine) => {
                let engine: Arc<dyn TtsEngine> = Arc::from(engine);
                let voice = self.voice.lock().unwrap_or_else(|e| e.into_inner()).clone();
                if let Some(voice) = voice.as_deref() {
                    if let Err(e) = engine.set_voice(voice) {
                        warn!("Could not reapply voice {}: {}", voice, e);
                    }
                }
                info!(engine = %engine.name(), "Speech backend ready");
                *self.engine.lock().unwrap_or_else(|e| e.into_inner()) = Some(engine.clone());
                Some(engine)
            }
            Err(e) => {
                warn!("Speech backend unavailable: {}", e);
                *self.engine.lock().unwrap_or_else(|e| e.into_inner()) = None;
                None
            }
        }
    }
}

pub struct SpeechQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechQueue {
    /// Build the backend and start the consumer thread.
    pub fn start(factory: EngineFactory, interrupt: Interrupt) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            work: Condvar::new(),
            idle: Condvar::new(),
            engine: Mutex::new(None),
            voice: Mutex::new(None),
            factory,
            interrupt,
        });
        shared.rebuild_engine();

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("speech-queue".into())
            .spawn(move || run_worker(worker_shared))
            .map_err(|e| warn!("Failed to start speech worker: {}", e))
            .ok();

        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    /// Queue text for speaking. Never blocks on synthesis and never fails.
    pub fn enqueue(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        let request = SpeechRequest {
            text,
            ticket: self.shared.interrupt.ticket(),
        };
        let mut state = self.shared.state();
        if state.shutdown {
            return;
        }
        state.pending.push_back(request);
        self.shared.work.notify_one();
    }

    /// Remove every request that has not started yet. Returns how many were
    /// dropped.
    pub fn drain(&self) -> usize {
        let mut state = self.shared.state();
        let dropped = state.pending.len();
        state.pending.clear();
        if !state.speaking {
            self.shared.idle.notify_all();
        }
        dropped
    }

    /// Barge-in: cancel every outstanding ticket, drop the backlog and halt
    /// the utterance in flight.
    pub fn cancel_and_drain(&self) {
        self.shared.interrupt.trigger();
        let dropped = self.drain();
        self.stop_current();
        debug!(dropped, "Speech queue cancelled");
    }

    /// Halt the in-flight utterance without touching the backlog.
    pub fn stop_current(&self) {
        if let Some(engine) = self.shared.current_engine() {
            engine.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.shared.state().pending.len()
    }

    /// Wait until the queue is empty and nothing is being spoken.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state();
        while !state.pending.is_empty() || state.speaking {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .shared
                .idle
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }

    pub fn engine_name(&self) -> Option<String> {
        self.shared.current_engine().map(|e| e.name())
    }

    pub fn voices(&self) -> Vec<String> {
        self.shared
            .current_engine()
            .map(|e| e.voices())
            .unwrap_or_default()
    }

    /// Select a voice on the current backend and remember it for rebuilds.
    pub fn set_voice(&self, voice: &str) -> Result<(), TtsError> {
        let engine = self.shared.current_engine().ok_or(TtsError::NotReady)?;
        engine.set_voice(voice)?;
        *self.shared.voice.lock().unwrap_or_else(|e| e.into_inner()) = Some(voice.to_string());
        Ok(())
    }

    /// Stop the worker after the current request. Pending requests are
    /// discarded.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state();
            state.shutdown = true;
            state.pending.clear();
        }
        self.shared.work.notify_all();
        self.stop_current();
        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: Arc<Shared>) {
    debug!("Speech worker started");
    loop {
        let request = {
            let mut state = shared.state();
            loop {
                if state.shutdown {
                    state.speaking = false;
                    shared.idle.notify_all();
                    debug!("Speech worker exiting");
                    return;
                }
                if let Some(req) = state.pending.pop_front() {
                    state.speaking = true;
                    break req;
                }
                state.speaking = false;
                shared.idle.notify_all();
                state = shared.work.wait(state).unwrap_or_else(|e| e.into_inner());
            }
        };

        speak_one(&shared, &request);

        let mut state = shared.state();
        state.speaking = false;
        if state.pending.is_empty() {
            shared.idle.notify_all();
        }
    }
}

/// Speak a single request, rebuilding the backend on failure.
fn speak_one(shared: &Shared, request: &SpeechRequest) {
    let mut reinits = 0;
    loop {
        if request.ticket.is_cancelled() {
            debug!(text = %request.text, "Skipping cancelled speech");
            return;
        }

        let engine = match shared.current_engine() {
            Some(engine) => engine,
            None if reinits < MAX_REINIT_ATTEMPTS => {
                reinits += 1;
                match shared.rebuild_engine() {
                    Some(engine) => engine,
                    None => continue,
                }
            }
            None => {
                warn!(text = %request.text, "No speech backend, dropping message");
                return;
            }
        };

        match engine.speak(&request.text, &request.ticket) {
            Ok(()) | Err(TtsError::Cancelled) => return,
            Err(e) if reinits < MAX_REINIT_ATTEMPTS => {
                reinits += 1;
                warn!(attempt = reinits, "Speech failed, rebuilding backend: {}", e);
                shared.rebuild_engine();
            }
            Err(e) => {
                warn!(text = %request.text, "Speech failed, dropping message: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wait_for, FakeTts};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn queue_with(tts: Arc<FakeTts>) -> SpeechQueue {
        SpeechQueue::start(FakeTts::factory(tts), Interrupt::new())
    }

    #[test]
    fn test_fifo_order() {
        let tts = FakeTts::new();
        let queue = queue_with(tts.clone());
        queue.enqueue("a");
        queue.enqueue("b");
        queue.enqueue("c");
        assert!(queue.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(tts.spoken(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cancel_and_drain_halts_in_flight_and_drops_backlog() {
        let tts = FakeTts::blocking();
        let queue = queue_with(tts.clone());
        queue.enqueue("x");
        queue.enqueue("y");
        queue.enqueue("z");

        assert!(wait_for(Duration::from_secs(5), || tts.started() == vec!["x"]));
        queue.cancel_and_drain();

        assert_eq!(queue.len(), 0);
        assert!(queue.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(tts.started(), vec!["x"]);
        assert!(tts.spoken().is_empty());
        assert!(tts.stop_calls() >= 1);
    }

    #[test]
    fn test_speech_after_cancel_still_plays() {
        let tts = FakeTts::new();
        let queue = queue_with(tts.clone());
        queue.cancel_and_drain();
        queue.enqueue("after");
        assert!(queue.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(tts.spoken(), vec!["after"]);
    }

    #[test]
    fn test_failing_backend_is_rebuilt_then_dropped() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let factory: EngineFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeTts::failing_engine()))
        });
        let queue = SpeechQueue::start(factory, Interrupt::new());
        queue.enqueue("lost");
        assert!(queue.wait_until_idle(Duration::from_secs(5)));
        // Initial build plus one rebuild per allowed attempt.
        assert_eq!(builds.load(Ordering::SeqCst), 1 + MAX_REINIT_ATTEMPTS);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_missing_backend_drops_without_blocking() {
        let factory: EngineFactory = Box::new(|| anyhow::bail!("no audio device"));
        let queue = SpeechQueue::start(factory, Interrupt::new());
        queue.enqueue("nobody hears this");
        assert!(queue.wait_until_idle(Duration::from_secs(5)));
        assert!(queue.engine_name().is_none());
    }

    #[test]
    fn test_voice_survives_rebuild() {
        let tts = FakeTts::new();
        let queue = queue_with(tts.clone());
        queue.set_voice("zira").unwrap();
        assert_eq!(tts.voice().as_deref(), Some("zira"));
        assert_eq!(queue.voices(), vec!["david", "zira", "hazel"]);
    }
}
