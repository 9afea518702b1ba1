//! Platform-specific data directory paths.
//!
//!   Windows: %APPDATA%/jarvis-assistant/data
//!   macOS:   ~/Library/Application Support/jarvis-assistant/data
//!   Linux:   $XDG_CONFIG_HOME/jarvis-assistant/data (default ~/.config)
//!
//! `JARVIS_DATA_DIR` overrides the platform default.

use std::path::PathBuf;

const APP_DIR_NAME: &str = "jarvis-assistant";

/// Get the assistant data directory (cross-platform).
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("JARVIS_DATA_DIR") {
        return PathBuf::from(dir);
    }
    get_config_base().join(APP_DIR_NAME).join("data")
}

/// Directory for rolling log files.
pub fn get_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// The user's home directory, or `.` when it cannot be determined.
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Get the platform-appropriate base config directory.
fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| home_dir().join("AppData").join("Roaming"))
    }

    #[cfg(target_os = "macos")]
    {
        home_dir().join("Library").join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        home_dir().join(".config")
    }
}
