//! Clock, identity, voices, desktop toggles and the terminal intents.

use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate, NaiveTime, Timelike};
use tracing::{error, info, warn};

use super::after_prefix;
use crate::audio::CaptureWindow;
use crate::desktop::PowerAction;
use crate::listen::CycleSource;
use crate::router::{Flow, IntentRouter};
use crate::session::SessionState;
use crate::utterance::UtteranceSource;

/// How long a farewell may take before the power request goes out.
const FAREWELL_WAIT: Duration = Duration::from_secs(10);
/// How long to let a prompt finish before opening the microphone.
const PROMPT_WAIT: Duration = Duration::from_secs(10);
const MAX_SPOKEN_VOICES: usize = 10;

const INDEX_WORDS: &[(&str, usize)] = &[("voice one", 0), ("voice two", 1), ("voice three", 2)];
const VOICE_COMMAND_WORDS: &[&str] = &["change", "set", "voice", "to", "the", "please", "use", "a"];

pub fn time_sentence(time: NaiveTime) -> String {
    format!("The current time is {}", time.format("%I:%M:%S %p"))
}

pub fn date_sentence(date: NaiveDate) -> String {
    format!(
        "The current date is {} {} {}",
        date.day(),
        date.format("%B"),
        date.year()
    )
}

/// Startup greeting for the given local hour.
pub fn greeting_lines(hour: u32, name: &str) -> Vec<String> {
    let part_of_day = match hour {
        4..=11 => "Good morning!",
        12..=15 => "Good afternoon!",
        16..=23 => "Good evening!",
        _ => "Good night, see you tomorrow.",
    };
    vec![
        "Welcome back!".to_string(),
        part_of_day.to_string(),
        format!("{name} at your service. Please tell me how may I assist you."),
    ]
}

/// Pick a voice for a free-form request: a spoken index, then a gender or
/// name hint, then the first voice.
pub fn choose_voice(query: &str, voices: &[String]) -> Option<usize> {
    if voices.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let by_index = tokens
        .iter()
        .filter_map(|t| t.parse::<usize>().ok())
        .find(|&i| i < voices.len());
    if by_index.is_some() {
        return by_index;
    }

    let wants_female = tokens.contains(&"female");
    let wants_male = tokens.contains(&"male");
    let hints: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| t.len() > 2 && !VOICE_COMMAND_WORDS.contains(t))
        .collect();
    let hinted = voices.iter().position(|voice| {
        let name = voice.to_lowercase();
        (wants_female && (name.contains("female") || name.contains("zira")))
            || (wants_male
                && !name.contains("female")
                && (name.contains("male") || name.contains("david")))
            || hints.iter().any(|h| *h != "female" && *h != "male" && name.contains(h))
    });
    Some(hinted.unwrap_or(0))
}

impl IntentRouter {
    /// Speak the startup greeting.
    pub fn greet(&self) {
        for line in greeting_lines(Local::now().hour(), &self.deps.names.get()) {
            self.say(&line);
        }
    }

    pub(in crate::router) fn stop_speaking(&self) -> anyhow::Result<()> {
        self.deps.speaker.cancel_and_drain();
        self.say("Stopped speaking.");
        Ok(())
    }

    pub(in crate::router) fn tell_time(&self) -> anyhow::Result<()> {
        self.say(&time_sentence(Local::now().time()));
        Ok(())
    }

    pub(in crate::router) fn tell_date(&self) -> anyhow::Result<()> {
        self.say(&date_sentence(Local::now().date_naive()));
        Ok(())
    }

    /// Ask for a new name out loud. Voice cycles already hold the listen
    /// gate; a typed request has to take it before opening the microphone.
    pub(in crate::router) fn change_name(&self, source: UtteranceSource) -> anyhow::Result<()> {
        let _permit = match source {
            UtteranceSource::Typed => match self.deps.gate.try_acquire(CycleSource::Prompt) {
                Some(permit) => Some(permit),
                None => {
                    let holder = self.deps.gate.holder();
                    info!(?holder, "Name prompt refused, microphone busy");
                    self.say("I'm already listening. Try again in a moment.");
                    return Ok(());
                }
            },
            UtteranceSource::Speech | UtteranceSource::Wake => None,
        };
        self.say("What would you like to name me?");
        self.deps.speaker.wait_until_idle(PROMPT_WAIT);
        let heard = self.deps.capture.capture(CaptureWindow::COMMAND);
        let renamed = match heard {
            Ok(name) if !name.trim().is_empty() => {
                self.deps.transcript.user(&name);
                match self.deps.names.set(&name) {
                    Ok(()) => Some(self.deps.names.get()),
                    Err(e) => {
                        warn!("Could not save assistant name: {:#}", e);
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) => {
                info!("No name captured: {}", e);
                None
            }
        };
        match renamed {
            Some(name) => self.say(&format!("Alright, I will be called {name} from now on.")),
            None => self.say("Sorry, I couldn't catch that."),
        }
        Ok(())
    }

    pub(in crate::router) fn list_voices(&self) -> anyhow::Result<()> {
        let voices = self.deps.speaker.voices();
        if voices.is_empty() {
            self.say("No voices are available on this system.");
            return Ok(());
        }
        let listing = voices
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{i}: {v}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.deps.transcript.system(&format!("Voices -> {listing}"));
        let spoken: Vec<&str> = voices.iter().take(MAX_SPOKEN_VOICES).map(String::as_str).collect();
        let more = voices.len().saturating_sub(MAX_SPOKEN_VOICES);
        if more > 0 {
            self.say(&format!("Available voices: {}, and {more} more.", spoken.join(", ")));
        } else {
            self.say(&format!("Available voices: {}.", spoken.join(", ")));
        }
        Ok(())
    }

    pub(in crate::router) fn voice_by_index(&self, text: &str) -> anyhow::Result<()> {
        let Some(&(_, index)) = INDEX_WORDS.iter().find(|(w, _)| text.contains(w)) else {
            return self.change_voice(text);
        };
        let voices = self.deps.speaker.voices();
        let applied = voices
            .get(index)
            .map(|voice| self.deps.speaker.set_voice(voice));
        match applied {
            Some(Ok(())) => self.say(&format!("Voice set to {}", index + 1)),
            Some(Err(e)) => {
                warn!(index, "Voice change failed: {}", e);
                self.say("I couldn't change the voice.");
            }
            None if voices.is_empty() => self.say("No voices are available on this system."),
            None => self.say(&format!("There is no voice number {}.", index + 1)),
        }
        Ok(())
    }

    pub(in crate::router) fn change_voice(&self, text: &str) -> anyhow::Result<()> {
        let voices = self.deps.speaker.voices();
        let Some(index) = choose_voice(text, &voices) else {
            self.say("No voices are available on this system.");
            return Ok(());
        };
        match self.deps.speaker.set_voice(&voices[index]) {
            Ok(()) => {
                info!(voice = %voices[index], "Voice selected");
                self.say("Voice updated.");
            }
            Err(e) => {
                warn!(voice = %voices[index], "Voice change failed: {}", e);
                self.say("I couldn't change the voice.");
            }
        }
        Ok(())
    }

    pub(in crate::router) fn use_system_voice(
        &self,
        session: &SessionState,
        on: bool,
    ) -> anyhow::Result<()> {
        session.set_use_system_voice(on);
        self.say(if on {
            "System voice enabled"
        } else {
            "Engine voice enabled"
        });
        Ok(())
    }

    pub(in crate::router) fn set_wake_word(
        &self,
        session: &SessionState,
        on: bool,
    ) -> anyhow::Result<()> {
        session.set_wake_word_enabled(on);
        self.say(if on {
            "Wake word enabled."
        } else {
            "Wake word disabled."
        });
        Ok(())
    }

    pub(in crate::router) fn type_text(&self, text: &str) -> anyhow::Result<()> {
        let to_type = after_prefix(text, &["type "]);
        match self.deps.launcher.type_text(to_type) {
            Ok(()) => self.say("Typed your text."),
            Err(e) => {
                warn!("Typing failed: {}", e);
                self.say("I couldn't type that.");
            }
        }
        Ok(())
    }

    pub(in crate::router) fn screenshot(&self) -> anyhow::Result<()> {
        let dir = self.deps.home.join("Pictures");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), "Cannot create screenshot folder: {}", e);
        }
        let dest = dir.join("screenshot.png");
        match self.deps.launcher.screenshot(&dest) {
            Ok(()) => {
                info!(path = %dest.display(), "Screenshot saved");
                self.say("I've taken screenshot, please check it");
            }
            Err(e) => {
                warn!("Screenshot failed: {}", e);
                self.say("I couldn't take a screenshot.");
            }
        }
        Ok(())
    }

    pub(in crate::router) fn enable_startup(&self) -> anyhow::Result<()> {
        match self.deps.autostart.enable() {
            Ok(()) => self.say("I will start automatically when you log in."),
            Err(e) => {
                warn!("Could not register startup entry: {:#}", e);
                self.say("I could not enable startup on this system.");
            }
        }
        Ok(())
    }

    pub(in crate::router) fn disable_startup(&self) -> anyhow::Result<()> {
        match self.deps.autostart.disable() {
            Ok(true) => self.say("I will not start automatically anymore."),
            Ok(false) => self.say("Startup entry was not found."),
            Err(e) => {
                warn!("Could not remove startup entry: {:#}", e);
                self.say("Startup entry was not found.");
            }
        }
        Ok(())
    }

    pub(in crate::router) fn power_off(&self, action: PowerAction) -> Flow {
        self.say(match action {
            PowerAction::Shutdown => "Shutting down the system, goodbye!",
            PowerAction::Restart => "Restarting the system, please wait!",
        });
        if !self.deps.speaker.wait_until_idle(FAREWELL_WAIT) {
            warn!("Farewell still playing, continuing");
        }
        if let Err(e) = self.deps.launcher.power(action) {
            error!(?action, "Power request failed: {}", e);
        }
        Flow::Terminate
    }

    pub(in crate::router) fn go_offline(&self) -> Flow {
        self.say("Going offline. Have a good day!");
        Flow::Terminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_and_date_sentences() {
        let t = NaiveTime::from_hms_opt(14, 5, 9).unwrap();
        assert_eq!(time_sentence(t), "The current time is 02:05:09 PM");
        let d = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(date_sentence(d), "The current date is 7 March 2024");
    }

    #[test]
    fn test_greeting_by_hour() {
        assert_eq!(greeting_lines(9, "Jarvis")[1], "Good morning!");
        assert_eq!(greeting_lines(13, "Jarvis")[1], "Good afternoon!");
        assert_eq!(greeting_lines(20, "Jarvis")[1], "Good evening!");
        assert_eq!(greeting_lines(2, "Jarvis")[1], "Good night, see you tomorrow.");
        assert_eq!(
            greeting_lines(9, "Friday")[2],
            "Friday at your service. Please tell me how may I assist you."
        );
    }

    #[test]
    fn test_choose_voice() {
        let voices: Vec<String> = ["Microsoft David", "Microsoft Zira", "Hazel"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(choose_voice("set voice 2", &voices), Some(2));
        assert_eq!(choose_voice("change voice to female", &voices), Some(1));
        assert_eq!(choose_voice("change voice to male", &voices), Some(0));
        assert_eq!(choose_voice("set voice hazel", &voices), Some(2));
        assert_eq!(choose_voice("change voice", &voices), Some(0));
        assert_eq!(choose_voice("change voice", &[]), None);
    }
}
