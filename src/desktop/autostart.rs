//! Start-at-login registration.
//!
//! Linux: XDG autostart `.desktop` file. macOS: LaunchAgent plist.
//! Windows: a `.cmd` launcher in the Startup folder.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

const ENTRY_NAME: &str = "jarvis-assistant";

pub struct Autostart {
    entry: PathBuf,
    contents: String,
}

impl Autostart {
    /// Entry for this executable at the platform's usual location.
    pub fn for_current_platform(exe: &Path) -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("no home directory")?;
        let (entry, contents) = if cfg!(target_os = "macos") {
            (
                home.join("Library/LaunchAgents")
                    .join(format!("com.{ENTRY_NAME}.plist")),
                launch_agent(exe),
            )
        } else if cfg!(windows) {
            let appdata = dirs::config_dir().context("no APPDATA directory")?;
            (
                appdata
                    .join(r"Microsoft\Windows\Start Menu\Programs\Startup")
                    .join(format!("{ENTRY_NAME}.cmd")),
                startup_script(exe),
            )
        } else {
            let config = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
            (
                config.join("autostart").join(format!("{ENTRY_NAME}.desktop")),
                desktop_entry(exe),
            )
        };
        Ok(Self { entry, contents })
    }

    pub fn at(entry: PathBuf, contents: String) -> Self {
        Self { entry, contents }
    }

    pub fn entry_path(&self) -> &Path {
        &self.entry
    }

    pub fn is_enabled(&self) -> bool {
        self.entry.is_file()
    }

    pub fn enable(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.entry.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(&self.entry, &self.contents)
            .with_context(|| format!("cannot write {}", self.entry.display()))?;
        info!(entry = %self.entry.display(), "Startup entry registered");
        Ok(())
    }

    /// Remove the entry. `Ok(false)` when there was nothing to remove.
    pub fn disable(&self) -> anyhow::Result<bool> {
        if !self.entry.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.entry)
            .with_context(|| format!("cannot remove {}", self.entry.display()))?;
        info!(entry = %self.entry.display(), "Startup entry removed");
        Ok(true)
    }
}

fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\nType=Application\nName=Jarvis Assistant\nExec=\"{}\"\nX-GNOME-Autostart-enabled=true\nNoDisplay=true\n",
        exe.display()
    )
}

fn launch_agent(exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>com.{ENTRY_NAME}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        exe.display()
    )
}

fn startup_script(exe: &Path) -> String {
    let dir = exe.parent().map(|p| p.display().to_string()).unwrap_or_default();
    format!("@echo off\r\ncd /d \"{dir}\"\r\nstart \"\" \"{}\"\r\n", exe.display())
}
