//! Listening cycles.
//!
//! A cycle captures one command from the microphone and dispatches it. The
//! wake listener, the listen hotkey and the IPC `listen` command all start
//! cycles, and all of them go through one shared [`ListenGate`], so at most
//! one capture owns the microphone at a time. Typed commands that ask a
//! question out loud take the same gate before opening the microphone.

pub mod wake;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audio::{CaptureWindow, SpeechCapture};
use crate::router::IntentRouter;
use crate::session::SessionState;
use crate::speech::Speaker;
use crate::transcript::Transcript;
use crate::utterance::{Utterance, UtteranceSource};

/// What started a listening cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CycleSource {
    Wake = 1,
    Hotkey = 2,
    Remote = 3,
    /// A typed command asking a follow-up question out loud.
    Prompt = 4,
}

impl CycleSource {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Wake),
            2 => Some(Self::Hotkey),
            3 => Some(Self::Remote),
            4 => Some(Self::Prompt),
            _ => None,
        }
    }

    fn utterance_source(self) -> UtteranceSource {
        match self {
            Self::Wake => UtteranceSource::Wake,
            Self::Hotkey | Self::Remote | Self::Prompt => UtteranceSource::Speech,
        }
    }
}

impl std::fmt::Display for CycleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wake => write!(f, "wake_word"),
            Self::Hotkey => write!(f, "hotkey"),
            Self::Remote => write!(f, "remote"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

const FREE: u8 = 0;

/// Mutual exclusion for microphone cycles.
#[derive(Debug, Default)]
pub struct ListenGate {
    holder: AtomicU8,
}

impl ListenGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the gate for `source`, or `None` while another cycle holds it.
    pub fn try_acquire(self: &Arc<Self>, source: CycleSource) -> Option<ListenPermit> {
        self.holder
            .compare_exchange(FREE, source as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        debug!(%source, "Listen gate acquired");
        Some(ListenPermit {
            gate: self.clone(),
            source,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.holder.load(Ordering::Acquire) != FREE
    }

    /// Source of the cycle holding the gate.
    pub fn holder(&self) -> Option<CycleSource> {
        CycleSource::from_u8(self.holder.load(Ordering::Acquire))
    }
}

/// Proof of holding the gate. Dropping it frees the gate.
#[derive(Debug)]
pub struct ListenPermit {
    gate: Arc<ListenGate>,
    source: CycleSource,
}

impl ListenPermit {
    pub fn source(&self) -> CycleSource {
        self.source
    }
}

impl Drop for ListenPermit {
    fn drop(&mut self) {
        self.gate.holder.store(FREE, Ordering::Release);
        debug!(source = %self.source, "Listen gate released");
    }
}

/// Messages from listening threads to the foreground loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopSignal {
    ListeningStarted(CycleSource),
    ListeningStopped(CycleSource),
    WakeWordHeard,
    /// A dispatched command asked the assistant to exit.
    Shutdown,
}

/// Capture one command and dispatch it.
pub struct CommandCycle {
    capture: Arc<dyn SpeechCapture>,
    speaker: Arc<Speaker>,
    transcript: Arc<Transcript>,
    router: Arc<IntentRouter>,
    session: Arc<SessionState>,
    signals: mpsc::UnboundedSender<LoopSignal>,
}

impl CommandCycle {
    pub fn new(
        capture: Arc<dyn SpeechCapture>,
        speaker: Arc<Speaker>,
        transcript: Arc<Transcript>,
        router: Arc<IntentRouter>,
        session: Arc<SessionState>,
        signals: mpsc::UnboundedSender<LoopSignal>,
    ) -> Self {
        Self {
            capture,
            speaker,
            transcript,
            router,
            session,
            signals,
        }
    }

    pub(crate) fn signal(&self, signal: LoopSignal) {
        // The loop is gone only during shutdown.
        let _ = self.signals.send(signal);
    }

    pub(crate) fn speaker(&self) -> &Arc<Speaker> {
        &self.speaker
    }

    /// Run one cycle on the calling thread. The permit is held until the
    /// dispatch finishes. Returns `false` when the command ended the session.
    pub fn run(&self, permit: ListenPermit) -> bool {
        let source = permit.source();
        self.signal(LoopSignal::ListeningStarted(source));
        let heard = self.capture.capture(CaptureWindow::COMMAND);
        self.signal(LoopSignal::ListeningStopped(source));

        let text = match heard {
            Ok(text) => text,
            Err(e) => {
                info!(%source, "Capture ended without a command: {}", e);
                if let Some(apology) = e.apology() {
                    self.speaker.say_and_log(apology);
                }
                return true;
            }
        };

        let utterance = Utterance::new(&text, source.utterance_source());
        if utterance.is_empty() {
            return true;
        }
        self.transcript.user(utterance.text());
        let keep_going = self.router.dispatch(&utterance, &self.session);
        if !keep_going {
            info!(id = %utterance.id(), "Command ended the session");
            self.signal(LoopSignal::Shutdown);
        }
        drop(permit);
        keep_going
    }

    /// Start a cycle on its own thread if the gate is free. Returns `false`
    /// when another cycle is already listening.
    pub fn spawn(self: &Arc<Self>, gate: &Arc<ListenGate>, source: CycleSource) -> bool {
        let Some(permit) = gate.try_acquire(source) else {
            info!(%source, holder = ?gate.holder(), "Already listening");
            return false;
        };
        let cycle = self.clone();
        let spawned = thread::Builder::new()
            .name("listen-cycle".into())
            .spawn(move || {
                cycle.run(permit);
            });
        match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to spawn listen cycle: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CaptureError;
    use crate::test_support::{wait_for, Rig};
    use std::time::Duration;

    fn cycle_for(rig: &Rig) -> (Arc<CommandCycle>, mpsc::UnboundedReceiver<LoopSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cycle = CommandCycle::new(
            rig.capture.clone(),
            rig.speaker.clone(),
            rig.transcript.clone(),
            rig.router.clone(),
            rig.session.clone(),
            tx,
        );
        (Arc::new(cycle), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LoopSignal>) -> Vec<LoopSignal> {
        let mut out = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            out.push(signal);
        }
        out
    }

    #[test]
    fn test_gate_is_exclusive() {
        let gate = ListenGate::new();
        let permit = gate.try_acquire(CycleSource::Wake).unwrap();
        assert!(gate.is_busy());
        assert_eq!(gate.holder(), Some(CycleSource::Wake));
        assert!(gate.try_acquire(CycleSource::Hotkey).is_none());
        assert!(gate.try_acquire(CycleSource::Remote).is_none());

        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire(CycleSource::Hotkey).is_some());
    }

    #[test]
    fn test_gate_released_on_panic() {
        let gate = ListenGate::new();
        let permit = gate.try_acquire(CycleSource::Hotkey).unwrap();
        let result = thread::spawn(move || {
            let _held = permit;
            panic!("capture blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn test_gate_single_winner_under_contention() {
        let gate = ListenGate::new();
        let winners: usize = (0..8)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || {
                    gate.try_acquire(CycleSource::Remote)
                        .map(std::mem::forget)
                        .is_some()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_cycle_dispatches_captured_command() {
        let rig = Rig::new();
        let (cycle, mut rx) = cycle_for(&rig);
        let gate = ListenGate::new();
        rig.capture.push_command(Ok("Can you hear me"));

        assert!(cycle.run(gate.try_acquire(CycleSource::Hotkey).unwrap()));
        assert!(!gate.is_busy());
        let entries = rig.transcript.entries();
        assert_eq!(entries[0].text, "can you hear me");
        assert_eq!(rig.last_reply(), "Yes, I can hear you clearly.");
        assert_eq!(
            drain(&mut rx),
            vec![
                LoopSignal::ListeningStarted(CycleSource::Hotkey),
                LoopSignal::ListeningStopped(CycleSource::Hotkey)
            ]
        );
    }

    #[test]
    fn test_cycle_apologizes_for_capture_errors() {
        let rig = Rig::new();
        let (cycle, _rx) = cycle_for(&rig);
        let gate = ListenGate::new();

        rig.capture.push_command(Err(CaptureError::NoSpeech));
        assert!(cycle.run(gate.try_acquire(CycleSource::Remote).unwrap()));
        assert_eq!(rig.last_reply(), "I didn't hear anything. Please try again.");

        rig.capture
            .push_command(Err(CaptureError::ServiceUnavailable("503".into())));
        cycle.run(gate.try_acquire(CycleSource::Remote).unwrap());
        assert_eq!(rig.last_reply(), "Speech recognition service is unavailable.");

        // Unintelligible speech is dropped silently.
        rig.capture.push_command(Err(CaptureError::Unintelligible));
        cycle.run(gate.try_acquire(CycleSource::Remote).unwrap());
        assert_eq!(rig.replies().len(), 2);
    }

    #[test]
    fn test_cycle_requests_shutdown() {
        let rig = Rig::new();
        let (cycle, mut rx) = cycle_for(&rig);
        let gate = ListenGate::new();
        rig.capture.push_command(Ok("exit"));

        assert!(!cycle.run(gate.try_acquire(CycleSource::Hotkey).unwrap()));
        assert!(drain(&mut rx).contains(&LoopSignal::Shutdown));
    }

    #[test]
    fn test_spawn_refused_while_listening() {
        let rig = Rig::new();
        let (cycle, _rx) = cycle_for(&rig);
        let gate = ListenGate::new();
        let held = gate.try_acquire(CycleSource::Wake).unwrap();
        assert!(!cycle.spawn(&gate, CycleSource::Hotkey));
        assert_eq!(rig.capture.captures(), 0);

        drop(held);
        rig.capture.push_command(Ok("tell me a joke"));
        assert!(cycle.spawn(&gate, CycleSource::Hotkey));
        assert!(wait_for(Duration::from_secs(2), || !rig.replies().is_empty()
            && !gate.is_busy()));
    }
}
