//! Microphone capture: the `SpeechCapture` seam, capture windows, and the
//! cpal-backed implementation.

pub mod capture;
pub mod microphone;
pub mod ring_buffer;
pub mod vad;

use std::time::Duration;

pub use capture::list_devices;
pub use microphone::MicrophoneCapture;

/// How long to wait for speech to start, and how long a phrase may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureWindow {
    pub wait: Duration,
    pub phrase_limit: Duration,
}

impl CaptureWindow {
    /// Window for a full command.
    pub const COMMAND: Self = Self {
        wait: Duration::from_secs(8),
        phrase_limit: Duration::from_secs(8),
    };

    /// Short window sampled by the wake listener.
    pub const WAKE: Self = Self {
        wait: Duration::from_secs(2),
        phrase_limit: Duration::from_secs(3),
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("no speech detected before the timeout")]
    NoSpeech,
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("speech was not intelligible")]
    Unintelligible,
    #[error("speech recognition service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl CaptureError {
    /// What to tell the user, if anything.
    pub fn apology(&self) -> Option<&'static str> {
        match self {
            Self::NoSpeech => Some("I didn't hear anything. Please try again."),
            Self::DeviceUnavailable(_) => Some("I couldn't access the microphone."),
            Self::ServiceUnavailable(_) => Some("Speech recognition service is unavailable."),
            Self::Unintelligible => None,
        }
    }
}

/// Record one phrase and turn it into lowercased text.
pub trait SpeechCapture: Send + Sync {
    fn capture(&self, window: CaptureWindow) -> Result<String, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apology_per_kind() {
        assert_eq!(
            CaptureError::NoSpeech.apology(),
            Some("I didn't hear anything. Please try again.")
        );
        assert_eq!(
            CaptureError::DeviceUnavailable("gone".into()).apology(),
            Some("I couldn't access the microphone.")
        );
        assert_eq!(
            CaptureError::ServiceUnavailable("503".into()).apology(),
            Some("Speech recognition service is unavailable.")
        );
        assert_eq!(CaptureError::Unintelligible.apology(), None);
    }

    #[test]
    fn test_windows() {
        assert!(CaptureWindow::WAKE.wait < CaptureWindow::COMMAND.wait);
        assert_eq!(CaptureWindow::COMMAND.phrase_limit, Duration::from_secs(8));
    }
}
