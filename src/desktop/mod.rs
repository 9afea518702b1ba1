//! OS-level side effects: opening things, spawning processes, synthetic
//! input, screenshots and power requests.
//!
//! Everything the command handlers do to the desktop goes through the
//! [`Launcher`] trait so handlers can be exercised against a recording fake.

pub mod apps;
pub mod autostart;
pub mod clipboard;
pub mod locate;

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("{0} was not found")]
    NotFound(String),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    PlayPause,
    Stop,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Shutdown,
    Restart,
}

pub trait Launcher: Send + Sync {
    /// Open a URL in the default browser.
    fn open_url(&self, url: &str) -> Result<(), LauncherError>;
    /// Open a URL in Chrome, falling back to the default browser.
    fn open_in_chrome(&self, url: &str) -> Result<(), LauncherError>;
    /// Open a file or folder with its default handler.
    fn open_path(&self, path: &Path) -> Result<(), LauncherError>;
    /// Start an application by friendly name or path.
    fn launch_app(&self, name: &str) -> Result<(), LauncherError>;
    /// Start a shell command line in `dir` without waiting for it.
    fn spawn_shell(&self, command: &str, dir: &Path) -> Result<(), LauncherError>;
    /// Run a program to completion in `dir`; non-zero exit is an error.
    fn run_program(&self, program: &str, args: &[&str], dir: &Path) -> Result<(), LauncherError>;
    fn press_media_key(&self, key: MediaKey) -> Result<(), LauncherError>;
    /// Type text into the focused window.
    fn type_text(&self, text: &str) -> Result<(), LauncherError>;
    fn screenshot(&self, dest: &Path) -> Result<(), LauncherError>;
    fn power(&self, action: PowerAction) -> Result<(), LauncherError>;
}

/// The real desktop.
#[derive(Debug, Default)]
pub struct OsLauncher;

impl OsLauncher {
    pub fn new() -> Self {
        Self
    }
}

fn spawn_detached(mut command: Command, program: &str) -> Result<(), LauncherError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|child| debug!(program, pid = child.id(), "Spawned"))
        .map_err(|source| LauncherError::Spawn {
            program: program.to_string(),
            source,
        })
}

fn run_to_completion(mut command: Command, program: &str) -> Result<(), LauncherError> {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| LauncherError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(LauncherError::Failed {
            program: program.to_string(),
            status: status.to_string(),
        })
    }
}

/// First of `candidates` found on PATH.
fn first_on_path(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|c| which::which(c).ok())
}

impl Launcher for OsLauncher {
    fn open_url(&self, url: &str) -> Result<(), LauncherError> {
        info!(url, "Opening URL");
        open::that_detached(url).map_err(|source| LauncherError::Spawn {
            program: "browser".to_string(),
            source,
        })
    }

    fn open_in_chrome(&self, url: &str) -> Result<(), LauncherError> {
        match apps::find_chrome() {
            Some(chrome) => {
                info!(url, chrome = %chrome.display(), "Opening URL in Chrome");
                let mut command = Command::new(&chrome);
                command.arg(url);
                spawn_detached(command, "chrome")
            }
            None => self.open_url(url),
        }
    }

    fn open_path(&self, path: &Path) -> Result<(), LauncherError> {
        info!(path = %path.display(), "Opening path");
        open::that_detached(path).map_err(|source| LauncherError::Spawn {
            program: path.display().to_string(),
            source,
        })
    }

    fn launch_app(&self, name: &str) -> Result<(), LauncherError> {
        let target = apps::find_app(name).ok_or_else(|| LauncherError::NotFound(name.to_string()))?;
        info!(name, target = %target.display(), "Launching application");
        if apps::is_bundle(&target) {
            return open::that_detached(&target).map_err(|source| LauncherError::Spawn {
                program: name.to_string(),
                source,
            });
        }
        spawn_detached(Command::new(&target), name)
    }

    fn spawn_shell(&self, command: &str, dir: &Path) -> Result<(), LauncherError> {
        if command.trim().is_empty() {
            return Err(LauncherError::Other("empty command".to_string()));
        }
        info!(command, dir = %dir.display(), "Running shell command");
        let mut shell = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };
        shell.current_dir(dir);
        spawn_detached(shell, command)
    }

    fn run_program(&self, program: &str, args: &[&str], dir: &Path) -> Result<(), LauncherError> {
        debug!(program, ?args, dir = %dir.display(), "Running program");
        let mut command = Command::new(program);
        command.args(args).current_dir(dir);
        run_to_completion(command, program)
    }

    fn press_media_key(&self, key: MediaKey) -> Result<(), LauncherError> {
        // playerctl talks MPRIS directly and works without an X server.
        if let Some(playerctl) = first_on_path(&["playerctl"]) {
            let action = match key {
                MediaKey::PlayPause => "play-pause",
                MediaKey::Stop => "stop",
                MediaKey::Next => "next",
            };
            let mut command = Command::new(playerctl);
            command.arg(action);
            return run_to_completion(command, "playerctl");
        }
        clipboard::tap_media_key(key)
    }

    fn type_text(&self, text: &str) -> Result<(), LauncherError> {
        clipboard::paste_text(text)
    }

    fn screenshot(&self, dest: &Path) -> Result<(), LauncherError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::Other(e.to_string()))?;
        }
        let dest_str = dest.to_string_lossy().to_string();
        let (program, args): (PathBuf, Vec<String>) = if cfg!(target_os = "macos") {
            (PathBuf::from("screencapture"), vec!["-x".into(), dest_str])
        } else if cfg!(windows) {
            let script = format!(
                "Add-Type -AssemblyName System.Windows.Forms,System.Drawing; \
                 $b=[System.Windows.Forms.SystemInformation]::VirtualScreen; \
                 $bmp=New-Object System.Drawing.Bitmap $b.Width,$b.Height; \
                 $g=[System.Drawing.Graphics]::FromImage($bmp); \
                 $g.CopyFromScreen($b.Left,$b.Top,0,0,$bmp.Size); \
                 $bmp.Save('{}')",
                dest_str.replace('\'', "''")
            );
            (
                PathBuf::from("powershell"),
                vec!["-NoProfile".into(), "-Command".into(), script],
            )
        } else {
            let tools: &[(&str, &[&str])] = &[
                ("gnome-screenshot", &["-f"]),
                ("grim", &[]),
                ("spectacle", &["-b", "-n", "-o"]),
                ("scrot", &["-o"]),
                ("import", &["-window", "root"]),
            ];
            let (path, flags) = tools
                .iter()
                .find_map(|(tool, flags)| which::which(tool).ok().map(|p| (p, *flags)))
                .ok_or_else(|| LauncherError::NotFound("a screenshot tool".to_string()))?;
            let mut args: Vec<String> = flags.iter().map(|f| f.to_string()).collect();
            args.push(dest_str);
            (path, args)
        };
        info!(dest = %dest.display(), "Taking screenshot");
        let mut command = Command::new(&program);
        command.args(&args);
        run_to_completion(command, &program.to_string_lossy())
    }

    fn power(&self, action: PowerAction) -> Result<(), LauncherError> {
        info!(?action, "Power request");
        let (program, args): (&str, &[&str]) = match (action, std::env::consts::OS) {
            (PowerAction::Shutdown, "windows") => ("shutdown", &["/s", "/f", "/t", "1"]),
            (PowerAction::Restart, "windows") => ("shutdown", &["/r", "/f", "/t", "1"]),
            (PowerAction::Shutdown, "macos") => {
                ("osascript", &["-e", "tell app \"System Events\" to shut down"])
            }
            (PowerAction::Restart, "macos") => {
                ("osascript", &["-e", "tell app \"System Events\" to restart"])
            }
            (PowerAction::Shutdown, _) => ("systemctl", &["poweroff"]),
            (PowerAction::Restart, _) => ("systemctl", &["reboot"]),
        };
        let mut command = Command::new(program);
        command.args(args);
        spawn_detached(command, program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_shell_rejects_empty() {
        let launcher = OsLauncher::new();
        let err = launcher
            .spawn_shell("   ", Path::new("."))
            .unwrap_err();
        assert!(matches!(err, LauncherError::Other(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_program_reports_exit_status() {
        let launcher = OsLauncher::new();
        let dir = tempfile::tempdir().unwrap();
        assert!(launcher.run_program("true", &[], dir.path()).is_ok());
        let err = launcher.run_program("false", &[], dir.path()).unwrap_err();
        assert!(matches!(err, LauncherError::Failed { .. }));
        let err = launcher
            .run_program("definitely-not-a-real-program", &[], dir.path())
            .unwrap_err();
        assert!(matches!(err, LauncherError::Spawn { .. }));
    }

    #[test]
    fn test_error_messages_name_target() {
        assert_eq!(
            LauncherError::NotFound("spotify".into()).to_string(),
            "spotify was not found"
        );
    }
}
