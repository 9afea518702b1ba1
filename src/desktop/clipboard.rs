//! Synthetic input: clipboard paste for typing, key taps for media keys.
//!
//! Typing goes through the clipboard: save it, put the text there, press
//! Ctrl+V (Cmd+V on macOS), then restore the previous contents.

use std::thread;
use std::time::Duration;

use arboard::Clipboard;
use rdev::{simulate, EventType, Key};
use tracing::{info, warn};

use super::{LauncherError, MediaKey};

const KEY_DELAY: Duration = Duration::from_millis(20);

fn input_error(what: &str, e: impl std::fmt::Debug) -> LauncherError {
    LauncherError::Other(format!("{what}: {e:?}"))
}

pub fn paste_text(text: &str) -> Result<(), LauncherError> {
    if text.is_empty() {
        return Ok(());
    }
    info!(text_len = text.len(), "Typing text via clipboard");

    let mut clipboard = Clipboard::new().map_err(|e| input_error("Failed to open clipboard", e))?;
    let previous = clipboard.get_text().ok();

    clipboard
        .set_text(text)
        .map_err(|e| input_error("Failed to set clipboard text", e))?;
    thread::sleep(Duration::from_millis(50));

    let modifier = if cfg!(target_os = "macos") {
        Key::MetaLeft
    } else {
        Key::ControlLeft
    };
    tap_chord(modifier, Key::KeyV)?;

    thread::sleep(Duration::from_millis(100));
    if let Some(prev) = previous {
        if let Err(e) = clipboard.set_text(prev) {
            warn!("Failed to restore clipboard: {}", e);
        }
    }
    Ok(())
}

fn send(event: EventType) -> Result<(), LauncherError> {
    simulate(&event).map_err(|e| input_error("Failed to simulate input", e))?;
    thread::sleep(KEY_DELAY);
    Ok(())
}

fn tap_chord(modifier: Key, key: Key) -> Result<(), LauncherError> {
    send(EventType::KeyPress(modifier))?;
    send(EventType::KeyPress(key))?;
    send(EventType::KeyRelease(key))?;
    send(EventType::KeyRelease(modifier))
}

/// Platform key code for a media key, where one can be synthesized.
fn media_key_code(key: MediaKey) -> Option<u32> {
    if cfg!(windows) {
        // Virtual-key codes.
        Some(match key {
            MediaKey::Next => 0xB0,
            MediaKey::Stop => 0xB2,
            MediaKey::PlayPause => 0xB3,
        })
    } else if cfg!(target_os = "linux") {
        // X11 keycodes for XF86AudioNext/Stop/Play.
        Some(match key {
            MediaKey::Next => 171,
            MediaKey::Stop => 174,
            MediaKey::PlayPause => 172,
        })
    } else {
        None
    }
}

pub fn tap_media_key(key: MediaKey) -> Result<(), LauncherError> {
    let code = media_key_code(key).ok_or(LauncherError::Unsupported("media keys"))?;
    send(EventType::KeyPress(Key::Unknown(code)))?;
    send(EventType::KeyRelease(Key::Unknown(code)))
}
