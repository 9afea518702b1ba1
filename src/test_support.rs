//! Fakes shared by the unit tests.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::{CaptureError, CaptureWindow, SpeechCapture};
use crate::config::NameStore;
use crate::desktop::autostart::Autostart;
use crate::desktop::{Launcher, LauncherError, MediaKey, PowerAction};
use crate::knowledge::{Encyclopedia, Lookup};
use crate::listen::ListenGate;
use crate::llm::LanguageModel;
use crate::media::{
    MediaPlayer, MediaSession, PlayerFactory, PlaylistEntry, StreamResolver, TrackEndNotifier,
};
use crate::router::{IntentRouter, RouterDeps};
use crate::session::{SessionSnapshot, SessionState};
use crate::speech::interrupt::SpeechTicket;
use crate::speech::queue::EngineFactory;
use crate::speech::Speaker;
use crate::transcript::Transcript;
use crate::tts::{TtsEngine, TtsError};
use crate::utterance::{Utterance, UtteranceSource};

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub fn test_session(dir: &Path) -> SessionState {
    SessionState::new(SessionSnapshot {
        working_directory: dir.to_path_buf(),
        prefer_online_playback: false,
        use_system_voice: false,
        wake_word_enabled: true,
    })
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

/// Records what it was asked to say. A blocking instance holds every
/// utterance until `stop` is called or its ticket is cancelled.
pub struct FakeTts {
    blocking: bool,
    failing: bool,
    spoken: Mutex<Vec<String>>,
    started: Mutex<Vec<String>>,
    stop_calls: AtomicUsize,
    stop_generation: Mutex<u64>,
    stopped: Condvar,
    voice: Mutex<Option<String>>,
}

impl FakeTts {
    fn build(blocking: bool, failing: bool) -> Self {
        Self {
            blocking,
            failing,
            spoken: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            stop_calls: AtomicUsize::new(0),
            stop_generation: Mutex::new(0),
            stopped: Condvar::new(),
            voice: Mutex::new(None),
        }
    }

    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false, false))
    }

    pub fn blocking() -> Arc<Self> {
        Arc::new(Self::build(true, false))
    }

    /// An engine whose every `speak` fails.
    pub fn failing_engine() -> Self {
        Self::build(false, true)
    }

    /// Factory that hands out the same fake on every build.
    pub fn factory(tts: Arc<FakeTts>) -> EngineFactory {
        Box::new(move || Ok(Box::new(SharedTts(tts.clone())) as Box<dyn TtsEngine>))
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn voice(&self) -> Option<String> {
        self.voice.lock().unwrap().clone()
    }
}

impl TtsEngine for FakeTts {
    fn speak(&self, text: &str, ticket: &SpeechTicket) -> Result<(), TtsError> {
        if self.failing {
            return Err(TtsError::SynthesisError("fake failure".into()));
        }
        self.started.lock().unwrap().push(text.to_string());
        if self.blocking {
            let mut generation = self.stop_generation.lock().unwrap();
            let entered = *generation;
            while *generation == entered && !ticket.is_cancelled() {
                generation = self
                    .stopped
                    .wait_timeout(generation, Duration::from_millis(10))
                    .unwrap()
                    .0;
            }
            return Err(TtsError::Cancelled);
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.stop_generation.lock().unwrap() += 1;
        self.stopped.notify_all();
    }

    fn name(&self) -> String {
        "fake".to_string()
    }

    fn voices(&self) -> Vec<String> {
        vec!["david".into(), "zira".into(), "hazel".into()]
    }

    fn set_voice(&self, voice: &str) -> Result<(), TtsError> {
        if !self.voices().iter().any(|v| v == voice) {
            return Err(TtsError::SynthesisError(format!("unknown voice {voice}")));
        }
        *self.voice.lock().unwrap() = Some(voice.to_string());
        Ok(())
    }
}

struct SharedTts(Arc<FakeTts>);

impl TtsEngine for SharedTts {
    fn speak(&self, text: &str, ticket: &SpeechTicket) -> Result<(), TtsError> {
        self.0.speak(text, ticket)
    }

    fn stop(&self) {
        self.0.stop()
    }

    fn name(&self) -> String {
        self.0.name()
    }

    fn voices(&self) -> Vec<String> {
        self.0.voices()
    }

    fn set_voice(&self, voice: &str) -> Result<(), TtsError> {
        self.0.set_voice(voice)
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeResolver {
    fail_next: AtomicBool,
    queries: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl StreamResolver for FakeResolver {
    fn search(&self, query: &str) -> anyhow::Result<PlaylistEntry> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("no results");
        }
        Ok(PlaylistEntry {
            locator: format!("https://stream.invalid/{}", query.replace(' ', "-")),
            title: format!("{query} (official)"),
        })
    }
}

#[derive(Default)]
pub struct FakePlayerFactory {
    fail_next: AtomicBool,
    live: Arc<AtomicUsize>,
    max_live: AtomicUsize,
    notifiers: Mutex<Vec<TrackEndNotifier>>,
}

impl FakePlayerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Players created and not yet dropped.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    /// Notifier handed to the `index`-th player created.
    pub fn notifier(&self, index: usize) -> TrackEndNotifier {
        self.notifiers.lock().unwrap()[index].clone()
    }

    /// Simulate the newest player reaching the end of its stream.
    pub fn end_current(&self) {
        let last = self.notifiers.lock().unwrap().last().cloned();
        if let Some(notifier) = last {
            notifier.notify();
        }
    }
}

impl PlayerFactory for FakePlayerFactory {
    fn create(
        &self,
        _entry: &PlaylistEntry,
        on_end: TrackEndNotifier,
    ) -> anyhow::Result<Box<dyn MediaPlayer>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("player crashed");
        }
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);
        self.notifiers.lock().unwrap().push(on_end);
        Ok(Box::new(FakePlayer {
            playing: false,
            live: self.live.clone(),
        }))
    }
}

struct FakePlayer {
    playing: bool,
    live: Arc<AtomicUsize>,
}

impl MediaPlayer for FakePlayer {
    fn play(&mut self) -> anyhow::Result<()> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> anyhow::Result<()> {
        self.playing = false;
        Ok(())
    }

    fn resume(&mut self) -> anyhow::Result<()> {
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Drop for FakePlayer {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Desktop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchCall {
    OpenUrl(String),
    OpenInChrome(String),
    OpenPath(PathBuf),
    LaunchApp(String),
    Shell { command: String, dir: PathBuf },
    Program { program: String, args: Vec<String>, dir: PathBuf },
    MediaKey(MediaKey),
    TypeText(String),
    Screenshot(PathBuf),
    Power(PowerAction),
}

/// Records every desktop effect instead of performing it. Operations named
/// with `fail_on` return an error (after being recorded).
#[derive(Default)]
pub struct RecordingLauncher {
    calls: Mutex<Vec<LaunchCall>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl RecordingLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn calls(&self) -> Vec<LaunchCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, call: LaunchCall) -> Result<(), LauncherError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(op) {
            return Err(LauncherError::Other(format!("{op} failed")));
        }
        Ok(())
    }
}

impl Launcher for RecordingLauncher {
    fn open_url(&self, url: &str) -> Result<(), LauncherError> {
        self.record("open_url", LaunchCall::OpenUrl(url.to_string()))
    }

    fn open_in_chrome(&self, url: &str) -> Result<(), LauncherError> {
        self.record("open_in_chrome", LaunchCall::OpenInChrome(url.to_string()))
    }

    fn open_path(&self, path: &Path) -> Result<(), LauncherError> {
        self.record("open_path", LaunchCall::OpenPath(path.to_path_buf()))
    }

    fn launch_app(&self, name: &str) -> Result<(), LauncherError> {
        self.record("launch_app", LaunchCall::LaunchApp(name.to_string()))
    }

    fn spawn_shell(&self, command: &str, dir: &Path) -> Result<(), LauncherError> {
        self.record(
            "spawn_shell",
            LaunchCall::Shell {
                command: command.to_string(),
                dir: dir.to_path_buf(),
            },
        )
    }

    fn run_program(&self, program: &str, args: &[&str], dir: &Path) -> Result<(), LauncherError> {
        self.record(
            "run_program",
            LaunchCall::Program {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                dir: dir.to_path_buf(),
            },
        )
    }

    fn press_media_key(&self, key: MediaKey) -> Result<(), LauncherError> {
        self.record("press_media_key", LaunchCall::MediaKey(key))
    }

    fn type_text(&self, text: &str) -> Result<(), LauncherError> {
        self.record("type_text", LaunchCall::TypeText(text.to_string()))
    }

    fn screenshot(&self, dest: &Path) -> Result<(), LauncherError> {
        self.record("screenshot", LaunchCall::Screenshot(dest.to_path_buf()))
    }

    fn power(&self, action: PowerAction) -> Result<(), LauncherError> {
        self.record("power", LaunchCall::Power(action))
    }
}

// ---------------------------------------------------------------------------
// Knowledge
// ---------------------------------------------------------------------------

pub struct FakeLlm {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LanguageModel for FakeLlm {
    fn label(&self) -> String {
        "fake/model-1".to_string()
    }

    fn complete(&self, prompt: &str, _system: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(anyhow::Error::msg)
    }
}

pub struct FakeWiki {
    answer: Lookup,
    topics: Mutex<Vec<String>>,
}

impl FakeWiki {
    pub fn new(answer: Lookup) -> Arc<Self> {
        Arc::new(Self {
            answer,
            topics: Mutex::new(Vec::new()),
        })
    }

    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

impl Encyclopedia for FakeWiki {
    fn lookup(&self, topic: &str) -> anyhow::Result<Lookup> {
        self.topics.lock().unwrap().push(topic.to_string());
        Ok(self.answer.clone())
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Returns scripted results per window kind; once a script runs out it
/// behaves like a quiet room.
#[derive(Default)]
pub struct ScriptedCapture {
    command: Mutex<VecDeque<Result<String, CaptureError>>>,
    wake: Mutex<VecDeque<Result<String, CaptureError>>>,
    captures: AtomicU64,
}

impl ScriptedCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_command(&self, result: Result<&str, CaptureError>) {
        self.command
            .lock()
            .unwrap()
            .push_back(result.map(str::to_string));
    }

    pub fn push_wake(&self, result: Result<&str, CaptureError>) {
        self.wake.lock().unwrap().push_back(result.map(str::to_string));
    }

    pub fn captures(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }
}

impl SpeechCapture for ScriptedCapture {
    fn capture(&self, window: CaptureWindow) -> Result<String, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let queue = if window == CaptureWindow::WAKE {
            &self.wake
        } else {
            &self.command
        };
        let next = queue.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                thread::sleep(Duration::from_millis(10));
                Err(CaptureError::NoSpeech)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// A router wired to fakes, working in a fresh temporary directory that
/// doubles as the home directory.
pub struct Rig {
    pub dir: tempfile::TempDir,
    pub session: Arc<SessionState>,
    pub transcript: Arc<Transcript>,
    pub tts: Arc<FakeTts>,
    pub speaker: Arc<Speaker>,
    pub media: Arc<MediaSession>,
    pub resolver: Arc<FakeResolver>,
    pub launcher: Arc<RecordingLauncher>,
    pub capture: Arc<ScriptedCapture>,
    pub gate: Arc<ListenGate>,
    pub names: Arc<NameStore>,
    pub router: Arc<IntentRouter>,
}

impl Rig {
    pub fn new() -> Self {
        Self::build(None, FakeWiki::new(Lookup::NotFound))
    }

    pub fn with_llm(llm: Arc<dyn LanguageModel>) -> Self {
        Self::build(Some(llm), FakeWiki::new(Lookup::NotFound))
    }

    pub fn build(llm: Option<Arc<dyn LanguageModel>>, encyclopedia: Arc<dyn Encyclopedia>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(test_session(dir.path()));
        let transcript = Arc::new(Transcript::new());
        let tts = FakeTts::new();
        let speaker = Arc::new(Speaker::new(
            FakeTts::factory(tts.clone()),
            None,
            session.clone(),
            transcript.clone(),
        ));
        let resolver = FakeResolver::new();
        let media = Arc::new(MediaSession::new(resolver.clone(), FakePlayerFactory::new()));
        let launcher = RecordingLauncher::new();
        let capture = ScriptedCapture::new();
        let gate = ListenGate::new();
        let names = Arc::new(NameStore::load(dir.path().join("config/name.txt")));
        let autostart = Autostart::at(
            dir.path().join("autostart/jarvis.desktop"),
            "[Desktop Entry]\n".to_string(),
        );

        let router = Arc::new(IntentRouter::new(RouterDeps {
            speaker: speaker.clone(),
            transcript: transcript.clone(),
            media: media.clone(),
            launcher: launcher.clone(),
            capture: capture.clone(),
            gate: gate.clone(),
            llm,
            encyclopedia,
            names: names.clone(),
            autostart,
            home: dir.path().to_path_buf(),
            wake_token: "jarvis".to_string(),
        })
        .unwrap());

        Self {
            dir,
            session,
            transcript,
            tts,
            speaker,
            media,
            resolver,
            launcher,
            capture,
            gate,
            names,
            router,
        }
    }

    pub fn send(&self, text: &str) -> bool {
        self.router
            .dispatch(&Utterance::new(text, UtteranceSource::Typed), &self.session)
    }

    pub fn replies(&self) -> Vec<String> {
        self.transcript.assistant_lines()
    }

    pub fn last_reply(&self) -> String {
        self.transcript.last_assistant().unwrap_or_default()
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.media.shutdown();
        self.speaker.shutdown();
    }
}
