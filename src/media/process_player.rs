//! Plays a stream through an external player process (mpv by default).
//!
//! Pause and resume suspend and continue the process with SIGSTOP/SIGCONT.
//! A watcher thread per process reports natural exit as track end.

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, warn};

use super::{MediaPlayer, PlayerFactory, PlaylistEntry, TrackEndNotifier};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

const WATCH_INTERVAL: Duration = Duration::from_millis(250);

pub struct ProcessPlayerFactory {
    program: String,
    args: Vec<String>,
}

impl ProcessPlayerFactory {
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
        }
    }
}

impl PlayerFactory for ProcessPlayerFactory {
    fn create(
        &self,
        entry: &PlaylistEntry,
        on_end: TrackEndNotifier,
    ) -> anyhow::Result<Box<dyn MediaPlayer>> {
        let program = which::which(&self.program)
            .with_context(|| format!("{} is not installed", self.program))?;
        let mut command = Command::new(program);
        command
            .args(&self.args)
            .arg(&entry.locator)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Ok(Box::new(ProcessPlayer {
            command,
            child: Arc::new(Mutex::new(None)),
            paused: false,
            released: Arc::new(AtomicBool::new(false)),
            on_end,
        }))
    }
}

struct ProcessPlayer {
    command: Command,
    child: Arc<Mutex<Option<Child>>>,
    paused: bool,
    /// Set on explicit stop so the watcher does not report a track end.
    released: Arc<AtomicBool>,
    on_end: TrackEndNotifier,
}

impl ProcessPlayer {
    fn pid(&self) -> anyhow::Result<u32> {
        self.child
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Child::id)
            .ok_or_else(|| anyhow::anyhow!("player process is not running"))
    }

    fn alive(&self) -> bool {
        let mut guard = self.child.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, sig: Signal) -> anyhow::Result<()> {
    signal::kill(Pid::from_raw(pid as i32), sig)
        .with_context(|| format!("failed to send {sig:?} to player"))
}

impl MediaPlayer for ProcessPlayer {
    fn play(&mut self) -> anyhow::Result<()> {
        let child = self.command.spawn().context("failed to start player")?;
        debug!(pid = child.id(), "Player started");
        *self.child.lock().unwrap_or_else(|e| e.into_inner()) = Some(child);

        let child = self.child.clone();
        let released = self.released.clone();
        let on_end = self.on_end.clone();
        thread::Builder::new()
            .name("player-watch".into())
            .spawn(move || loop {
                thread::sleep(WATCH_INTERVAL);
                if released.load(Ordering::Acquire) {
                    return;
                }
                let exited = {
                    let mut guard = child.lock().unwrap_or_else(|e| e.into_inner());
                    match guard.as_mut() {
                        Some(c) => !matches!(c.try_wait(), Ok(None)),
                        None => true,
                    }
                };
                if exited {
                    if !released.load(Ordering::Acquire) {
                        on_end.notify();
                    }
                    return;
                }
            })
            .context("failed to start player watcher")?;
        Ok(())
    }

    #[cfg(unix)]
    fn pause(&mut self) -> anyhow::Result<()> {
        send_signal(self.pid()?, Signal::SIGSTOP)?;
        self.paused = true;
        Ok(())
    }

    #[cfg(unix)]
    fn resume(&mut self) -> anyhow::Result<()> {
        send_signal(self.pid()?, Signal::SIGCONT)?;
        self.paused = false;
        Ok(())
    }

    #[cfg(not(unix))]
    fn pause(&mut self) -> anyhow::Result<()> {
        anyhow::bail!("pausing an external player is not supported on this platform")
    }

    #[cfg(not(unix))]
    fn resume(&mut self) -> anyhow::Result<()> {
        anyhow::bail!("resuming an external player is not supported on this platform")
    }

    fn stop(&mut self) {
        self.released.store(true, Ordering::Release);
        let taken = self.child.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut child) = taken {
            if let Err(e) = child.kill() {
                warn!("Failed to kill player: {}", e);
            }
            let _ = child.wait();
        }
        self.paused = false;
    }

    fn is_playing(&self) -> bool {
        !self.paused && self.alive()
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
