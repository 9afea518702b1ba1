//! Global hotkey listener.
//!
//! Captures keyboard and mouse events system-wide using `rdev` and turns
//! presses of the configured keys into [`HotkeyEvent`]s on a channel read by
//! the main event loop. Holding a key down fires once; the key must be
//! released before it fires again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use rdev::{listen, Button, Event, EventType, Key};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Events emitted by the hotkey listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Start a manual listening cycle.
    Listen,
    /// Silence everything being said.
    StopSpeaking,
}

/// Configuration for hotkey bindings.
#[derive(Debug, Clone)]
pub struct HotkeyConfig {
    /// Key binding for a listening cycle (e.g. "F9", "MouseButton5").
    pub listen_key: Option<String>,
    /// Key binding that stops speech (e.g. "F10").
    pub stop_key: Option<String>,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            listen_key: Some("F9".to_string()),
            stop_key: Some("F10".to_string()),
        }
    }
}

/// Parsed target: either a keyboard key or a mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
enum HotkeyTarget {
    Keyboard(Key),
    MouseButton(Button),
}

impl HotkeyTarget {
    /// `Some(true)` on press, `Some(false)` on release, `None` when the event
    /// is about something else.
    fn pressed_by(&self, event: &EventType) -> Option<bool> {
        match (self, event) {
            (Self::Keyboard(k), EventType::KeyPress(e)) if k == e => Some(true),
            (Self::Keyboard(k), EventType::KeyRelease(e)) if k == e => Some(false),
            (Self::MouseButton(b), EventType::ButtonPress(e)) if b == e => Some(true),
            (Self::MouseButton(b), EventType::ButtonRelease(e)) if b == e => Some(false),
            _ => None,
        }
    }
}

/// One configured key with its debounce state.
struct Binding {
    target: HotkeyTarget,
    event: HotkeyEvent,
    held: bool,
}

impl Binding {
    fn new(name: Option<&str>, event: HotkeyEvent) -> Option<Self> {
        Some(Self {
            target: parse_key(name?)?,
            event,
            held: false,
        })
    }

    fn feed(&mut self, event: &EventType) -> Option<HotkeyEvent> {
        match self.target.pressed_by(event)? {
            true if !self.held => {
                self.held = true;
                Some(self.event)
            }
            true => None,
            false => {
                self.held = false;
                None
            }
        }
    }
}

/// Global hotkey listener using rdev for cross-platform key/mouse capture.
pub struct HotkeyListener {
    config: HotkeyConfig,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    pub fn new(config: HotkeyConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start listening for hotkeys in a background thread.
    /// Sends `HotkeyEvent`s to the provided channel.
    pub fn start(&self, tx: mpsc::Sender<HotkeyEvent>) {
        let mut bindings: Vec<Binding> = [
            Binding::new(self.config.listen_key.as_deref(), HotkeyEvent::Listen),
            Binding::new(self.config.stop_key.as_deref(), HotkeyEvent::StopSpeaking),
        ]
        .into_iter()
        .flatten()
        .collect();

        if bindings.is_empty() {
            warn!("No hotkey bindings configured");
            return;
        }

        info!(
            listen = ?self.config.listen_key,
            stop = ?self.config.stop_key,
            "Starting hotkey listener"
        );
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        let spawned = thread::Builder::new()
            .name("hotkeys".into())
            .spawn(move || {
                let callback = move |event: Event| {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    for binding in bindings.iter_mut() {
                        if let Some(fired) = binding.feed(&event.event_type) {
                            let _ = tx.blocking_send(fired);
                        }
                    }
                };
                if let Err(e) = listen(callback) {
                    warn!("Hotkey listener error: {:?}", e);
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn hotkey thread: {}", e);
        }
    }

    /// Stop forwarding events. rdev offers no way to end `listen`, so the
    /// thread stays parked in it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Parse a key name string (from config) into an rdev target.
fn parse_key(name: &str) -> Option<HotkeyTarget> {
    let name_lower = name.trim().to_lowercase();

    match name_lower.as_str() {
        "mousebutton3" | "mouse3" | "middleclick" => {
            return Some(HotkeyTarget::MouseButton(Button::Middle))
        }
        "mousebutton4" | "mouse4" | "xbutton1" => {
            return Some(HotkeyTarget::MouseButton(Button::Unknown(4)))
        }
        "mousebutton5" | "mouse5" | "xbutton2" => {
            return Some(HotkeyTarget::MouseButton(Button::Unknown(5)))
        }
        _ => {}
    }

    let key = match name_lower.as_str() {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "space" => Key::Space,
        "escape" | "esc" => Key::Escape,
        "scrolllock" => Key::ScrollLock,
        "pause" => Key::Pause,
        "insert" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        _ => {
            warn!("Unknown hotkey: {}", name);
            return None;
        }
    };

    Some(HotkeyTarget::Keyboard(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("F9"), Some(HotkeyTarget::Keyboard(Key::F9)));
        assert_eq!(parse_key(" esc "), Some(HotkeyTarget::Keyboard(Key::Escape)));
        assert_eq!(
            parse_key("MouseButton5"),
            Some(HotkeyTarget::MouseButton(Button::Unknown(5)))
        );
        assert_eq!(parse_key("hyper"), None);
    }

    #[test]
    fn test_binding_fires_once_per_press() {
        let mut binding = Binding::new(Some("F10"), HotkeyEvent::StopSpeaking).unwrap();
        assert_eq!(binding.feed(&EventType::KeyPress(Key::F10)), Some(HotkeyEvent::StopSpeaking));
        // Auto-repeat while held.
        assert_eq!(binding.feed(&EventType::KeyPress(Key::F10)), None);
        assert_eq!(binding.feed(&EventType::KeyRelease(Key::F10)), None);
        assert_eq!(binding.feed(&EventType::KeyPress(Key::F10)), Some(HotkeyEvent::StopSpeaking));
        assert_eq!(binding.feed(&EventType::KeyPress(Key::F9)), None);
    }

    #[test]
    fn test_mouse_binding() {
        let mut binding = Binding::new(Some("mouse4"), HotkeyEvent::Listen).unwrap();
        assert_eq!(
            binding.feed(&EventType::ButtonPress(Button::Unknown(4))),
            Some(HotkeyEvent::Listen)
        );
        assert_eq!(binding.feed(&EventType::ButtonPress(Button::Left)), None);
        assert!(Binding::new(None, HotkeyEvent::Listen).is_none());
    }
}
