//! Application lookup by friendly name.
//!
//! Search order: known aliases and the raw name on PATH, then the common
//! install directories for the platform.

use std::path::{Path, PathBuf};

const CHROME: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

const ALIASES: &[(&str, &[&str])] = &[
    ("visual studio code", &["code"]),
    ("vs code", &["code"]),
    ("vscode", &["code"]),
    ("code", &["code"]),
    ("chrome", CHROME),
    ("google chrome", CHROME),
    ("edge", &["microsoft-edge", "msedge"]),
    ("microsoft edge", &["microsoft-edge", "msedge"]),
    ("firefox", &["firefox"]),
    ("spotify", &["spotify"]),
    ("discord", &["discord", "Discord"]),
    ("steam", &["steam"]),
    ("whatsapp", &["whatsapp", "WhatsApp"]),
    ("postman", &["postman", "Postman"]),
    ("pycharm", &["pycharm", "pycharm64", "pycharm-community"]),
    ("intellij", &["idea", "idea64", "intellij-idea-community"]),
    ("android studio", &["studio", "studio64", "android-studio"]),
    ("git bash", &["git-bash"]),
    ("vlc", &["vlc"]),
    ("notepad", &["notepad", "gnome-text-editor", "gedit", "kate", "TextEdit"]),
    ("notepad++", &["notepad++"]),
    ("calculator", &["calc", "gnome-calculator", "kcalc", "Calculator"]),
    ("paint", &["mspaint", "pinta", "kolourpaint"]),
    ("explorer", &["explorer", "nautilus", "dolphin", "thunar"]),
    ("files", &["explorer", "nautilus", "dolphin", "thunar"]),
    ("terminal", &["gnome-terminal", "konsole", "xterm", "wt", "Terminal"]),
    ("cmd", &["cmd"]),
    ("powershell", &["pwsh", "powershell"]),
];

/// Executable names worth trying for `name`, most specific first.
pub fn candidates(name: &str) -> Vec<String> {
    let name = name.trim().trim_matches('"').to_lowercase();
    if name.is_empty() {
        return Vec::new();
    }
    let mut out: Vec<String> = ALIASES
        .iter()
        .filter(|(alias, _)| *alias == name)
        .flat_map(|(_, exes)| exes.iter().map(|e| e.to_string()))
        .collect();
    let squashed = name.replace(' ', "");
    for c in [
        name.clone(),
        format!("{name}.exe"),
        squashed.clone(),
        format!("{squashed}.exe"),
    ] {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// Resolve `name` with a custom PATH lookup.
pub fn find_app_with(name: &str, lookup: impl Fn(&str) -> Option<PathBuf>) -> Option<PathBuf> {
    let direct = Path::new(name.trim());
    if direct.is_absolute() && direct.exists() {
        return Some(direct.to_path_buf());
    }
    candidates(name).iter().find_map(|c| lookup(c))
}

pub fn find_app(name: &str) -> Option<PathBuf> {
    find_app_with(name, |c| which::which(c).ok()).or_else(|| {
        let squashed = name.trim().to_lowercase().replace(' ', "");
        install_dirs()
            .iter()
            .find_map(|root| search_dir(root, &name.trim().to_lowercase(), &squashed, 3))
    })
}

pub fn find_chrome() -> Option<PathBuf> {
    if let Some(found) = CHROME.iter().find_map(|c| which::which(c).ok()) {
        return Some(found);
    }
    let fixed: &[&str] = if cfg!(windows) {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"]
    } else {
        &[]
    };
    fixed.iter().map(PathBuf::from).find(|p| p.is_file())
}

/// macOS application bundles are opened, not executed.
pub fn is_bundle(path: &Path) -> bool {
    path.is_dir() && path.extension().is_some_and(|e| e == "app")
}

fn install_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if cfg!(windows) {
        for var in ["ProgramFiles", "ProgramFiles(x86)", "LOCALAPPDATA"] {
            if let Some(v) = std::env::var_os(var) {
                dirs.push(PathBuf::from(v));
            }
        }
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/Applications"));
        if let Some(home) = dirs::home_dir() {
            dirs.push(home.join("Applications"));
        }
    } else {
        dirs.push(PathBuf::from("/opt"));
        if let Some(home) = dirs::home_dir() {
            dirs.push(home.join(".local/bin"));
        }
    }
    dirs.retain(|d| d.is_dir());
    dirs
}

fn looks_launchable(path: &Path) -> bool {
    if cfg!(windows) {
        path.extension().is_some_and(|e| e.eq_ignore_ascii_case("exe"))
    } else if cfg!(target_os = "macos") {
        is_bundle(path)
    } else {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            path.is_file()
                && path
                    .metadata()
                    .map(|m| m.permissions().mode() & 0o111 != 0)
                    .unwrap_or(false)
        }
        #[cfg(not(unix))]
        {
            path.is_file()
        }
    }
}

/// Depth-limited search for a launchable entry whose name contains `name`
/// or `squashed`.
pub fn search_dir(root: &Path, name: &str, squashed: &str, depth: usize) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in &entries {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if (file_name.contains(name) || file_name.contains(squashed)) && looks_launchable(path) {
            return Some(path.clone());
        }
    }
    if depth == 0 {
        return None;
    }
    entries
        .iter()
        .filter(|p| p.is_dir() && !is_bundle(p))
        .find_map(|p| search_dir(p, name, squashed, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_alias_first() {
        let c = candidates("Visual Studio Code");
        assert_eq!(c[0], "code");
        assert!(c.contains(&"visualstudiocode.exe".to_string()));
    }

    #[test]
    fn test_candidates_unknown_name() {
        assert_eq!(
            candidates("obs"),
            vec!["obs".to_string(), "obs.exe".to_string()]
        );
        assert!(candidates("  ").is_empty());
    }

    #[test]
    fn test_find_app_with_lookup() {
        let found = find_app_with("google chrome", |c| {
            (c == "chromium").then(|| PathBuf::from("/usr/bin/chromium"))
        });
        assert_eq!(found, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(find_app_with("nothing here", |_| None).is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_search_dir_finds_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("tool/bin");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("readme-mytool.txt"), "").unwrap();
        let exe = nested.join("mytool");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(search_dir(dir.path(), "mytool", "mytool", 3), Some(exe));
        assert_eq!(search_dir(dir.path(), "mytool", "mytool", 0), None);
    }
}
