//! Utterance dispatch.
//!
//! `dispatch` strips the wake word, classifies the text against the ordered
//! rule table and runs the matching handler inside a containment boundary:
//! handler errors and panics become a spoken apology, never a crash. Only
//! the shutdown, restart and exit intents end the session.

mod actions;
pub mod rules;
pub mod wake;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use regex::Regex;
use tracing::{debug, error, info};

use crate::audio::SpeechCapture;
use crate::config::NameStore;
use crate::desktop::autostart::Autostart;
use crate::desktop::Launcher;
use crate::knowledge::Encyclopedia;
use crate::listen::ListenGate;
use crate::llm::LanguageModel;
use crate::media::MediaSession;
use crate::session::SessionState;
use crate::speech::Speaker;
use crate::transcript::Transcript;
use crate::utterance::{Utterance, UtteranceSource};
use rules::{classify, rule_table, Intent, Rule};
use wake::{strip_wake, WakeStrip};

const FAILURE_REPLY: &str = "Sorry, something went wrong with that command.";

/// Whether the session keeps going after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

/// Everything the handlers act on. Built once in `main`.
pub struct RouterDeps {
    pub speaker: Arc<Speaker>,
    pub transcript: Arc<Transcript>,
    pub media: Arc<MediaSession>,
    pub launcher: Arc<dyn Launcher>,
    pub capture: Arc<dyn SpeechCapture>,
    /// Shared with the listening cycles. Typed commands that capture take it.
    pub gate: Arc<ListenGate>,
    /// `None` when no language-model provider is configured.
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub encyclopedia: Arc<dyn Encyclopedia>,
    pub names: Arc<NameStore>,
    pub autostart: Autostart,
    pub home: PathBuf,
    pub wake_token: String,
}

/// Regexes used to pull arguments out of matched utterances.
struct Extractors {
    rename: Regex,
    go_to_and_run: Regex,
    git_url: Regex,
    git_message: Regex,
    chrome_site: Regex,
}

impl Extractors {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            rename: Regex::new(r#"rename\s+"?([^"]+?)"?\s+to\s+"?([^"]+)"?$"#)
                .context("rename pattern")?,
            go_to_and_run: Regex::new(rules::GO_TO_AND_RUN).context("go-to-and-run pattern")?,
            git_url: Regex::new(r"(https?://\S+\.git)").context("git url pattern")?,
            git_message: Regex::new(r#"message\s+"([^"]+)""#).context("git message pattern")?,
            chrome_site: Regex::new(r"(?:open|go to)\s+([\w.-]+\.[a-z]{2,})(?:\s|$)")
                .context("site pattern")?,
        })
    }
}

pub struct IntentRouter {
    deps: RouterDeps,
    rules: Vec<Rule>,
    extract: Extractors,
}

impl IntentRouter {
    pub fn new(deps: RouterDeps) -> anyhow::Result<Self> {
        let rules = rule_table()?;
        info!(rules = rules.len(), "Command table built");
        Ok(Self {
            deps,
            rules,
            extract: Extractors::new()?,
        })
    }

    /// Act on one utterance. Returns `false` only when the assistant should
    /// shut down.
    pub fn dispatch(&self, utterance: &Utterance, session: &SessionState) -> bool {
        let text = match strip_wake(utterance.text(), &self.deps.wake_token) {
            WakeStrip::Absent => utterance.text().to_string(),
            WakeStrip::OnlyWake => {
                self.say("Yes, I'm listening.");
                return true;
            }
            WakeStrip::Command(rest) => {
                self.say("Sure");
                rest
            }
        };
        if text.is_empty() {
            return true;
        }

        let rule = classify(&self.rules, &text);
        let intent = rule.map(|r| r.intent);
        info!(
            id = %utterance.id(),
            source = %utterance.source(),
            rule = rule.map_or("llm-fallback", |r| r.name),
            "Dispatching"
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| match intent {
            Some(intent) => self.handle(intent, &text, utterance.source(), session),
            None => self.answer_with_model(&text).map(|()| Flow::Continue),
        }));
        match outcome {
            Ok(Ok(Flow::Continue)) => true,
            Ok(Ok(Flow::Terminate)) => false,
            Ok(Err(e)) => {
                error!(id = %utterance.id(), "Command failed: {:#}", e);
                self.say(FAILURE_REPLY);
                true
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(id = %utterance.id(), reason, "Command handler panicked");
                self.say(FAILURE_REPLY);
                true
            }
        }
    }

    fn handle(
        &self,
        intent: Intent,
        text: &str,
        source: UtteranceSource,
        session: &SessionState,
    ) -> anyhow::Result<Flow> {
        use Intent::*;
        debug!(?intent, "Handling");
        let result = match intent {
            Shutdown => return Ok(self.power_off(crate::desktop::PowerAction::Shutdown)),
            Restart => return Ok(self.power_off(crate::desktop::PowerAction::Restart)),
            Exit => return Ok(self.go_offline()),

            StopSpeaking => self.stop_speaking(),
            PreferOnline => self.prefer_online(session, true),
            PreferLocal => self.prefer_online(session, false),
            PlayMusic => self.play_music(text, session),
            QueueMusic => self.queue_music(text),
            PauseMusic => self.pause_music(),
            ResumeMusic => self.resume_music(),
            StopMusic => self.stop_music(),
            NextTrack => self.next_track(),
            Wikipedia => self.wikipedia(text),

            CreateFolder => self.create_folder(text, session),
            DeletePath => self.delete_path(text, session),
            Rename => self.rename(text, session),
            GitClone => self.git_clone(text, session),
            GitPush => self.git_push(text, session),
            TypeText => self.type_text(text),
            GoToAndRun => self.go_to_and_run(text, session),
            OpenFileInCurrent => self.open_file_in_current(text, session),
            OpenFolderInCurrent => self.open_folder_in_current(text, session),
            RunInCurrent => self.run_in_current(text, session),
            ChangeFolder => self.change_folder(text, session),
            OpenFile => self.open_file(text, session),
            MakeMigrations => self.project_task(actions::dev::ProjectTask::MakeMigrations, session),
            Migrate => self.project_task(actions::dev::ProjectTask::Migrate, session),
            InstallDependencies => self.project_task(actions::dev::ProjectTask::Install, session),
            StartApp => self.project_task(actions::dev::ProjectTask::Start, session),
            RunCommand => self.run_command(text, session),

            OpenYoutube => self.open_site("https://www.youtube.com", "Opening YouTube"),
            OpenGoogle => self.open_site("https://www.google.com", "Opening Google"),
            YoutubeSearch => self.youtube_search(text),
            AmazonSearch => self.amazon_search(text),
            ChromeOpenSite => self.chrome_open_site(text),
            WebSearch => self.web_search(text),
            OpenBrowser => self.open_browser(),
            OpenApp => self.open_app(text, session),
            CurrentFolder => self.current_folder(session),
            ListFiles => self.list_files(session),

            Time => self.tell_time(),
            Date => self.tell_date(),
            ChangeName => self.change_name(source),
            ListVoices => self.list_voices(),
            VoiceByIndex => self.voice_by_index(text),
            ChangeVoice => self.change_voice(text),
            UseSystemVoice => self.use_system_voice(session, true),
            UseEngineVoice => self.use_system_voice(session, false),
            EnableWakeWord => self.set_wake_word(session, true),
            DisableWakeWord => self.set_wake_word(session, false),
            Screenshot => self.screenshot(),
            EnableStartup => self.enable_startup(),
            DisableStartup => self.disable_startup(),

            Joke => self.tell_joke(),
            HearingCheck => self.hearing_check(),
            ModelInfo => self.model_info(),
            AudioTest => self.audio_test(),
            Empathy => self.empathize(text),
        };
        result.map(|()| Flow::Continue)
    }

    /// Speak and record an assistant line.
    fn say(&self, text: &str) {
        self.deps.speaker.say_and_log(text);
    }
}
