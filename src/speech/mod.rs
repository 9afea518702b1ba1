//! Speech output: the queued path, the reliable direct path, and the
//! interrupt that silences both.

pub mod interrupt;
pub mod queue;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::session::SessionState;
use crate::transcript::Transcript;
use crate::tts::{TtsEngine, TtsError};
use interrupt::Interrupt;
use queue::{EngineFactory, SpeechQueue};

const IDLE_POLL: Duration = Duration::from_millis(20);

/// Front door for everything the assistant says.
///
/// `say` goes to the direct system voice when the session prefers it and to
/// the queue otherwise. `cancel_and_drain` is a broadcast: it bumps the
/// shared interrupt, empties the queue and stops both backends.
pub struct Speaker {
    queue: SpeechQueue,
    direct: Option<Arc<dyn TtsEngine>>,
    interrupt: Interrupt,
    session: Arc<SessionState>,
    transcript: Arc<Transcript>,
    direct_in_flight: Arc<AtomicUsize>,
}

impl Speaker {
    pub fn new(
        queued_engine: EngineFactory,
        direct: Option<Arc<dyn TtsEngine>>,
        session: Arc<SessionState>,
        transcript: Arc<Transcript>,
    ) -> Self {
        let interrupt = Interrupt::new();
        Self {
            queue: SpeechQueue::start(queued_engine, interrupt.clone()),
            direct,
            interrupt,
            session,
            transcript,
            direct_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Speak without recording in the transcript.
    pub fn say(&self, text: &str) {
        if self.session.use_system_voice() && self.direct.is_some() {
            self.say_reliably(text);
        } else {
            self.queue.enqueue(text);
        }
    }

    /// Speak and record as an assistant line.
    pub fn say_and_log(&self, text: &str) {
        self.transcript.assistant(text);
        self.say(text);
    }

    /// Speak on a transient thread through the system voice, bypassing the
    /// queue. Falls back to the queue when no system voice exists.
    pub fn say_reliably(&self, text: &str) {
        let Some(engine) = self.direct.clone() else {
            self.queue.enqueue(text);
            return;
        };
        let ticket = self.interrupt.ticket();
        let text = text.to_string();
        let in_flight = self.direct_in_flight.clone();
        in_flight.fetch_add(1, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name("speech-direct".into())
            .spawn({
                let in_flight = in_flight.clone();
                move || {
                    match engine.speak(&text, &ticket) {
                        Ok(()) | Err(TtsError::Cancelled) => {}
                        Err(e) => warn!("Direct speech failed: {}", e),
                    }
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            });
        if let Err(e) = spawned {
            in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!("Failed to spawn direct speech thread: {}", e);
        }
    }

    /// Barge-in across every speech path.
    pub fn cancel_and_drain(&self) {
        self.interrupt.trigger();
        let dropped = self.queue.drain();
        self.queue.stop_current();
        if let Some(direct) = &self.direct {
            direct.stop();
        }
        debug!(dropped, "All speech cancelled");
    }

    /// Wait until the queue is idle and no direct utterance is running.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if !self.queue.wait_until_idle(timeout) {
            return false;
        }
        while self.direct_in_flight.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(IDLE_POLL);
        }
        true
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Voices offered by the active path's backend.
    pub fn voices(&self) -> Vec<String> {
        match &self.direct {
            Some(direct) if self.session.use_system_voice() => direct.voices(),
            _ => self.queue.voices(),
        }
    }

    /// Apply a voice to both paths. Succeeds if either backend accepted it.
    pub fn set_voice(&self, voice: &str) -> Result<(), TtsError> {
        let queued = self.queue.set_voice(voice);
        let direct = self
            .direct
            .as_ref()
            .map(|d| d.set_voice(voice))
            .unwrap_or(Err(TtsError::NotReady));
        match (queued, direct) {
            (Ok(()), _) | (_, Ok(())) => Ok(()),
            (Err(e), _) => Err(e),
        }
    }

    pub fn backend_name(&self) -> String {
        match &self.direct {
            Some(direct) if self.session.use_system_voice() => direct.name(),
            _ => self
                .queue
                .engine_name()
                .unwrap_or_else(|| "none".to_string()),
        }
    }

    pub fn shutdown(&self) {
        self.cancel_and_drain();
        self.queue.shutdown();
    }
}
