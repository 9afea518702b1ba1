//! Jarvis: desktop voice command core.
//!
//! Listens on the microphone (wake word or hotkey), on stdin (typed lines and
//! JSON commands), turns each utterance into an action and answers out loud.
//! Events go to stdout as JSON lines; logs go to stderr and a rolling file.

mod audio;
mod config;
mod desktop;
mod hotkey;
mod ipc;
mod knowledge;
mod listen;
mod llm;
mod logger;
mod media;
mod router;
mod session;
mod speech;
mod stt;
#[cfg(test)]
mod test_support;
mod transcript;
mod tts;
mod utterance;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use audio::{MicrophoneCapture, SpeechCapture};
use config::{env_var, get_name_path, paths, read_config, NameStore, DEFAULT_ASSISTANT_NAME};
use desktop::autostart::Autostart;
use desktop::OsLauncher;
use hotkey::{HotkeyConfig, HotkeyEvent, HotkeyListener};
use ipc::bridge::{emit_error, emit_event, spawn_stdin_reader};
use ipc::{JarvisCommand, JarvisEvent};
use knowledge::Wikipedia;
use listen::wake::WakeListener;
use listen::{CommandCycle, CycleSource, ListenGate, LoopSignal};
use llm::{resolve_provider, ChatClient, LanguageModel};
use media::process_player::ProcessPlayerFactory;
use media::ytdlp::YtDlpResolver;
use media::MediaSession;
use router::{IntentRouter, RouterDeps};
use session::{SessionSnapshot, SessionState};
use speech::queue::EngineFactory;
use speech::Speaker;
use transcript::Transcript;
use tts::{create_tts_engine, system::SystemVoice, TtsEngine};
use utterance::{Utterance, UtteranceSource};

/// Longest we wait for the last words before exiting.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(10);

/// Handles shared by the foreground loop and the stdin reader.
struct App {
    router: Arc<IntentRouter>,
    session: Arc<SessionState>,
    transcript: Arc<Transcript>,
    speaker: Arc<Speaker>,
    cycle: Arc<CommandCycle>,
    gate: Arc<ListenGate>,
    signals: mpsc::UnboundedSender<LoopSignal>,
}

impl App {
    /// Dispatch a typed line on the calling thread.
    fn dispatch_typed(&self, text: &str) {
        let utterance = Utterance::new(text, UtteranceSource::Typed);
        if utterance.is_empty() {
            return;
        }
        self.transcript.user(utterance.text());
        if !self.router.dispatch(&utterance, &self.session) {
            let _ = self.signals.send(LoopSignal::Shutdown);
        }
    }

    /// Handle a single IPC command. Returns `false` if the main loop should
    /// exit.
    fn handle_command(self: &Arc<Self>, cmd: JarvisCommand) -> bool {
        match cmd {
            JarvisCommand::Ping {} => emit_event(&JarvisEvent::Pong {}),
            JarvisCommand::Stop {} => {
                info!("Stop requested");
                return false;
            }
            JarvisCommand::Query { text } => {
                // Handlers block on network calls, so keep them off the
                // async workers.
                let app = self.clone();
                tokio::task::spawn_blocking(move || app.dispatch_typed(&text));
            }
            JarvisCommand::Listen {} => {
                if !self.cycle.spawn(&self.gate, CycleSource::Remote) {
                    emit_error("Already listening");
                }
            }
            JarvisCommand::StopSpeaking {} => self.speaker.cancel_and_drain(),
            JarvisCommand::SetWakeWord { enabled } => {
                info!(enabled, "Wake word toggled remotely");
                self.session.set_wake_word_enabled(enabled);
            }
        }
        true
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = logger::init() {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    // Emit starting event immediately so the UI knows we're alive.
    emit_event(&JarvisEvent::Starting {});

    let config = read_config();
    info!(
        wake_token = %config.wake_token,
        wake_word = config.wake_word_enabled,
        tts = %config.tts_adapter,
        stt = ?config.stt.adapter,
        "Configuration loaded"
    );
    let runtime = Handle::current();
    let home = paths::home_dir();

    let working_directory = config
        .working_directory
        .clone()
        .filter(|d| d.is_dir())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| home.clone());
    let session = Arc::new(SessionState::new(SessionSnapshot {
        working_directory,
        prefer_online_playback: config.prefer_online_playback,
        use_system_voice: config.use_system_voice,
        wake_word_enabled: config.wake_word_enabled,
    }));
    let transcript = Arc::new(Transcript::with_sink(|entry| {
        emit_event(&JarvisEvent::from(entry));
    }));

    // Speech output
    let direct: Option<Arc<dyn TtsEngine>> = match SystemVoice::detect() {
        Ok(voice) => Some(Arc::new(voice)),
        Err(e) => {
            warn!("System voice unavailable: {}", e);
            None
        }
    };
    let queued_engine: EngineFactory = {
        let adapter = config.tts_adapter.clone();
        let voice = config.tts_voice.clone();
        let key = config.tts_api_key.clone();
        let runtime = runtime.clone();
        Box::new(move || create_tts_engine(&adapter, voice.as_deref(), key.as_deref(), &runtime))
    };
    let speaker = Arc::new(Speaker::new(
        queued_engine,
        direct,
        session.clone(),
        transcript.clone(),
    ));

    // Collaborators
    let media = Arc::new(MediaSession::new(
        Arc::new(YtDlpResolver::new(&config.resolver_command)),
        Arc::new(ProcessPlayerFactory::new(&config.player_command, &config.player_args)),
    ));
    let stt = match stt::create_stt_engine(&config.stt) {
        Ok(engine) => {
            info!(endpoint = engine.endpoint(), "Speech recognition configured");
            Some(engine)
        }
        Err(e) => {
            warn!("Speech recognition unavailable: {:#}", e);
            None
        }
    };
    debug!(devices = ?audio::list_devices(), "Input devices");
    let capture: Arc<dyn SpeechCapture> = Arc::new(MicrophoneCapture::new(
        config.input_device.clone(),
        config.vad_threshold,
        stt,
        runtime.clone(),
    ));
    let llm: Option<Arc<dyn LanguageModel>> = match resolve_provider(&config.llm, env_var) {
        Some(provider) => Some(Arc::new(ChatClient::new(provider, runtime.clone()))),
        None => {
            info!("No language model configured, open questions get a static reply");
            None
        }
    };
    let names = Arc::new(NameStore::load_or(
        get_name_path(),
        config
            .assistant_name
            .as_deref()
            .unwrap_or(DEFAULT_ASSISTANT_NAME),
    ));
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let autostart = Autostart::for_current_platform(&exe)?;
    if config.autostart_on_launch && !autostart.is_enabled() {
        match autostart.enable() {
            Ok(()) => info!(entry = %autostart.entry_path().display(), "Startup entry registered"),
            Err(e) => warn!("Could not register startup entry: {:#}", e),
        }
    }

    let gate = ListenGate::new();
    let router = Arc::new(IntentRouter::new(RouterDeps {
        speaker: speaker.clone(),
        transcript: transcript.clone(),
        media: media.clone(),
        launcher: Arc::new(OsLauncher::new()),
        capture: capture.clone(),
        gate: gate.clone(),
        llm,
        encyclopedia: Arc::new(Wikipedia::new(runtime.clone())?),
        names: names.clone(),
        autostart,
        home,
        wake_token: config.wake_token.to_lowercase(),
    })?);

    // Listening paths
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
    let cycle = Arc::new(CommandCycle::new(
        capture.clone(),
        speaker.clone(),
        transcript.clone(),
        router.clone(),
        session.clone(),
        signal_tx.clone(),
    ));
    let wake = WakeListener::spawn(
        capture,
        cycle.clone(),
        gate.clone(),
        session.clone(),
        &config.wake_token,
    )?;

    let (hotkey_tx, mut hotkey_rx) = mpsc::channel(16);
    let hotkeys = HotkeyListener::new(HotkeyConfig {
        listen_key: config.listen_key.clone(),
        stop_key: config.stop_key.clone(),
    });
    hotkeys.start(hotkey_tx);

    let app = Arc::new(App {
        router: router.clone(),
        session: session.clone(),
        transcript: transcript.clone(),
        speaker: speaker.clone(),
        cycle,
        gate,
        signals: signal_tx,
    });
    let mut cmd_rx = {
        let app = app.clone();
        spawn_stdin_reader(move |line| app.dispatch_typed(&line))
    };

    router.greet();
    emit_event(&JarvisEvent::Ready { name: names.get() });
    info!(voice = %speaker.backend_name(), "Jarvis ready");

    let mut stdin_open = true;
    let mut hotkeys_open = true;
    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if stdin_open => match cmd {
                Some(cmd) => {
                    if !app.handle_command(cmd) {
                        break;
                    }
                }
                None => {
                    info!("stdin closed, still listening for voice and hotkeys");
                    stdin_open = false;
                }
            },
            signal = signal_rx.recv() => match signal {
                Some(LoopSignal::ListeningStarted(source)) => {
                    emit_event(&JarvisEvent::ListeningStart { source: source.to_string() });
                }
                Some(LoopSignal::ListeningStopped(_)) => emit_event(&JarvisEvent::ListeningStop {}),
                Some(LoopSignal::WakeWordHeard) => emit_event(&JarvisEvent::WakeWord {}),
                Some(LoopSignal::Shutdown) | None => break,
            },
            event = hotkey_rx.recv(), if hotkeys_open => match event {
                Some(HotkeyEvent::Listen) => {
                    app.cycle.spawn(&app.gate, CycleSource::Hotkey);
                }
                Some(HotkeyEvent::StopSpeaking) => speaker.cancel_and_drain(),
                None => hotkeys_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    emit_event(&JarvisEvent::Stopping {});
    wake.stop();
    hotkeys.stop();
    if !wake.is_finished() {
        debug!("Wake listener still inside a capture window");
    }
    debug!(pending = speaker.pending(), "Waiting for speech to finish");
    let draining = speaker.clone();
    match tokio::task::spawn_blocking(move || draining.wait_until_idle(SHUTDOWN_WAIT)).await {
        Ok(true) => {}
        Ok(false) => warn!("Speech still playing at shutdown"),
        Err(e) => warn!("Shutdown wait failed: {}", e),
    }
    media.shutdown();
    speaker.shutdown();
    info!("Jarvis shutting down");
    Ok(())
}
