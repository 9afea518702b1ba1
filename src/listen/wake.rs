//! Background wake-word listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CommandCycle, CycleSource, ListenGate, LoopSignal};
use crate::audio::{CaptureWindow, SpeechCapture};
use crate::session::SessionState;

const IDLE_SLEEP: Duration = Duration::from_millis(200);
/// Let the acknowledgement finish before the microphone opens again.
const ACK_WAIT: Duration = Duration::from_secs(5);

fn heard_wake_word(text: &str, token: &str) -> bool {
    !token.is_empty() && text.to_lowercase().contains(token)
}

/// Samples short windows while the wake word is enabled and starts a
/// command cycle when the token is heard.
pub struct WakeListener {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WakeListener {
    pub fn spawn(
        capture: Arc<dyn SpeechCapture>,
        cycle: Arc<CommandCycle>,
        gate: Arc<ListenGate>,
        session: Arc<SessionState>,
        wake_token: &str,
    ) -> anyhow::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let token = wake_token.to_lowercase();
        let flag = running.clone();
        let handle = thread::Builder::new()
            .name("wake-listener".into())
            .spawn(move || {
                info!(token = %token, "Wake listener started");
                while flag.load(Ordering::SeqCst) {
                    listen_once(capture.as_ref(), &cycle, &gate, &session, &token);
                }
                info!("Wake listener stopped");
            })?;
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Ask the thread to exit after its current window.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for WakeListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen_once(
    capture: &dyn SpeechCapture,
    cycle: &CommandCycle,
    gate: &Arc<ListenGate>,
    session: &SessionState,
    token: &str,
) {
    if !session.wake_word_enabled() || gate.is_busy() {
        thread::sleep(IDLE_SLEEP);
        return;
    }
    let heard = match capture.capture(CaptureWindow::WAKE) {
        Ok(text) => text,
        Err(e) => {
            debug!("Wake window: {}", e);
            return;
        }
    };
    if !heard_wake_word(&heard, token) {
        return;
    }
    let Some(permit) = gate.try_acquire(CycleSource::Wake) else {
        debug!("Wake word heard while another cycle is listening");
        return;
    };
    info!("Wake word detected");
    cycle.signal(LoopSignal::WakeWordHeard);
    cycle.speaker().say_and_log("Yes, I'm listening.");
    if !cycle.speaker().wait_until_idle(ACK_WAIT) {
        warn!("Acknowledgement still playing, listening anyway");
    }
    cycle.run(permit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CaptureError;
    use crate::test_support::{wait_for, Rig};
    use tokio::sync::mpsc;

    fn start(
        rig: &Rig,
        gate: &Arc<ListenGate>,
    ) -> (WakeListener, mpsc::UnboundedReceiver<LoopSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cycle = Arc::new(CommandCycle::new(
            rig.capture.clone(),
            rig.speaker.clone(),
            rig.transcript.clone(),
            rig.router.clone(),
            rig.session.clone(),
            tx,
        ));
        let listener = WakeListener::spawn(
            rig.capture.clone(),
            cycle,
            gate.clone(),
            rig.session.clone(),
            "Jarvis",
        )
        .unwrap();
        (listener, rx)
    }

    #[test]
    fn test_heard_wake_word() {
        assert!(heard_wake_word("Hey Jarvis", "jarvis"));
        assert!(!heard_wake_word("hello there", "jarvis"));
        assert!(!heard_wake_word("anything", ""));
    }

    #[test]
    fn test_wake_word_runs_a_cycle() {
        let rig = Rig::new();
        let gate = ListenGate::new();
        rig.capture.push_wake(Err(CaptureError::Unintelligible));
        rig.capture.push_wake(Ok("hey jarvis"));
        rig.capture.push_command(Ok("can you hear me"));

        let (listener, mut rx) = start(&rig, &gate);
        assert!(wait_for(Duration::from_secs(3), || {
            rig.last_reply() == "Yes, I can hear you clearly."
        }));
        listener.stop();

        assert_eq!(rig.replies()[0], "Yes, I'm listening.");
        assert_eq!(rx.try_recv().unwrap(), LoopSignal::WakeWordHeard);
        assert_eq!(
            rx.try_recv().unwrap(),
            LoopSignal::ListeningStarted(CycleSource::Wake)
        );
    }

    #[test]
    fn test_disabled_wake_word_leaves_microphone_alone() {
        let rig = Rig::new();
        rig.session.set_wake_word_enabled(false);
        let gate = ListenGate::new();
        let (listener, _rx) = start(&rig, &gate);
        thread::sleep(Duration::from_millis(500));
        assert_eq!(rig.capture.captures(), 0);

        rig.session.set_wake_word_enabled(true);
        assert!(wait_for(Duration::from_secs(2), || rig.capture.captures() > 0));
        listener.stop();
    }

    #[test]
    fn test_busy_gate_pauses_wake_sampling() {
        let rig = Rig::new();
        let gate = ListenGate::new();
        let held = gate.try_acquire(CycleSource::Hotkey).unwrap();
        let (listener, _rx) = start(&rig, &gate);
        thread::sleep(Duration::from_millis(500));
        assert_eq!(rig.capture.captures(), 0);
        drop(held);
        assert!(wait_for(Duration::from_secs(2), || rig.capture.captures() > 0));
        listener.stop();
        assert!(wait_for(Duration::from_secs(2), || listener.is_finished()));
    }
}
