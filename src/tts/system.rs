//! The platform's built-in voice, driven as a child process.
//!
//! - Linux: `espeak-ng` (or `espeak`)
//! - macOS: `say`
//! - Windows: PowerShell + System.Speech
//!
//! Each utterance is one child process. `stop` kills every live child, which
//! is what makes this engine safe to use from the transient direct-speech
//! threads as well as from the queue.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::{TtsEngine, TtsError};
use crate::speech::interrupt::SpeechTicket;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const SPEECH_RATE_WPM: u32 = 175;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    EspeakNg,
    Espeak,
    Say,
    PowerShell,
}

impl Backend {
    fn program_name(self) -> &'static str {
        match self {
            Self::EspeakNg => "espeak-ng",
            Self::Espeak => "espeak",
            Self::Say => "say",
            Self::PowerShell => "powershell",
        }
    }

    fn candidates() -> &'static [Backend] {
        if cfg!(target_os = "windows") {
            &[Backend::PowerShell]
        } else if cfg!(target_os = "macos") {
            &[Backend::Say, Backend::EspeakNg]
        } else {
            &[Backend::EspeakNg, Backend::Espeak]
        }
    }
}

pub struct SystemVoice {
    backend: Backend,
    program: PathBuf,
    voice: Mutex<Option<String>>,
    children: Mutex<HashMap<u64, Child>>,
    next_id: AtomicU64,
}

impl SystemVoice {
    /// Find the first voice program available on this platform.
    pub fn detect() -> Result<Self, TtsError> {
        for &backend in Backend::candidates() {
            if let Ok(program) = which::which(backend.program_name()) {
                debug!(program = %program.display(), "System voice detected");
                return Ok(Self {
                    backend,
                    program,
                    voice: Mutex::new(None),
                    children: Mutex::new(HashMap::new()),
                    next_id: AtomicU64::new(0),
                });
            }
        }
        Err(TtsError::NotReady)
    }

    fn current_voice(&self) -> Option<String> {
        self.voice.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn speak_command(&self, text: &str) -> Command {
        let voice = self.current_voice();
        let mut cmd = Command::new(&self.program);
        match self.backend {
            Backend::EspeakNg | Backend::Espeak => {
                cmd.arg("-s").arg(SPEECH_RATE_WPM.to_string());
                if let Some(v) = voice {
                    cmd.arg("-v").arg(v);
                }
                cmd.arg("--").arg(text);
            }
            Backend::Say => {
                cmd.arg("-r").arg(SPEECH_RATE_WPM.to_string());
                if let Some(v) = voice {
                    cmd.arg("-v").arg(v);
                }
                cmd.arg("--").arg(text);
            }
            Backend::PowerShell => {
                cmd.args(["-NoProfile", "-NonInteractive", "-Command"])
                    .arg(powershell_speak_script(voice.as_deref()));
                cmd.stdin(Stdio::piped());
            }
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        cmd
    }

    fn kill(&self, id: u64) {
        let child = self
            .children
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        if let Some(mut child) = child {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl TtsEngine for SystemVoice {
    fn speak(&self, text: &str, ticket: &SpeechTicket) -> Result<(), TtsError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        if ticket.is_cancelled() {
            return Err(TtsError::Cancelled);
        }

        let mut child = self
            .speak_command(text)
            .spawn()
            .map_err(|e| {
                TtsError::SynthesisError(format!("{}: {}", self.backend.program_name(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                warn!("Failed to write text to voice process: {}", e);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.children
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, child);

        loop {
            if ticket.is_cancelled() {
                self.kill(id);
                return Err(TtsError::Cancelled);
            }

            {
                let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
                let Some(child) = children.get_mut(&id) else {
                    // Removed by stop().
                    return Err(TtsError::Cancelled);
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        children.remove(&id);
                        return if status.success() {
                            Ok(())
                        } else {
                            Err(TtsError::SynthesisError(format!(
                                "{} exited with {}",
                                self.backend.program_name(),
                                status
                            )))
                        };
                    }
                    Ok(None) => {}
                    Err(e) => {
                        children.remove(&id);
                        return Err(TtsError::SynthesisError(e.to_string()));
                    }
                }
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop(&self) {
        let children: Vec<Child> = self
            .children
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, c)| c)
            .collect();
        for mut child in children {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn name(&self) -> String {
        format!("System voice ({})", self.backend.program_name())
    }

    fn voices(&self) -> Vec<String> {
        let output = match self.backend {
            Backend::EspeakNg | Backend::Espeak => {
                Command::new(&self.program).arg("--voices=en").output()
            }
            Backend::Say => Command::new(&self.program).args(["-v", "?"]).output(),
            Backend::PowerShell => Command::new(&self.program)
                .args(["-NoProfile", "-NonInteractive", "-Command"])
                .arg(POWERSHELL_LIST_VOICES)
                .output(),
        };
        let stdout = match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
            Ok(out) => {
                warn!(status = %out.status, "Voice listing failed");
                return Vec::new();
            }
            Err(e) => {
                warn!("Voice listing failed: {}", e);
                return Vec::new();
            }
        };
        match self.backend {
            Backend::EspeakNg | Backend::Espeak => parse_espeak_voices(&stdout),
            Backend::Say => parse_say_voices(&stdout),
            Backend::PowerShell => parse_line_list(&stdout),
        }
    }

    fn set_voice(&self, voice: &str) -> Result<(), TtsError> {
        let voice = voice.trim();
        if voice.is_empty() {
            return Err(TtsError::SynthesisError("empty voice name".into()));
        }
        *self.voice.lock().unwrap_or_else(|e| e.into_inner()) = Some(voice.to_string());
        Ok(())
    }
}

impl Drop for SystemVoice {
    fn drop(&mut self) {
        self.stop();
    }
}

const POWERSHELL_LIST_VOICES: &str = "Add-Type -AssemblyName System.Speech; \
     (New-Object System.Speech.Synthesis.SpeechSynthesizer).GetInstalledVoices() | \
     ForEach-Object { $_.VoiceInfo.Name }";

fn powershell_speak_script(voice: Option<&str>) -> String {
    let select = voice
        .map(|v| format!("$s.SelectVoice('{}'); ", v.replace('\'', "''")))
        .unwrap_or_default();
    format!(
        "Add-Type -AssemblyName System.Speech; \
         $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
         {select}$s.Speak([Console]::In.ReadToEnd())"
    )
}

/// Parse `espeak-ng --voices` output: the fourth column is the voice name.
fn parse_espeak_voices(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(3))
        .map(str::to_string)
        .collect()
}

/// Parse `say -v ?` output: `Name   locale   # sample sentence`.
fn parse_say_voices(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let left = line.split('#').next()?.trim_end();
            let (name, _locale) = left.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

fn parse_line_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
