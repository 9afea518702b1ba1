//! Finding files and folders from spoken names.

use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

use rand::seq::SliceRandom;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "wma"];

/// Walks deeper than this are abandoned; home directories can be huge.
const MAX_DEPTH: usize = 8;

/// Turn spoken separators into characters: "my underscore notes dot txt"
/// becomes "my_notes.txt".
pub fn normalize_spoken_path(text: &str) -> String {
    let mut t = format!(" {} ", text.trim());
    let replacements: [(&str, &str); 9] = [
        (" underscore ", "_"),
        (" dash ", "-"),
        (" hyphen ", "-"),
        (" dot ", "."),
        (" period ", "."),
        (" space ", " "),
        (" forward slash ", MAIN_SEPARATOR_STR),
        (" backslash ", MAIN_SEPARATOR_STR),
        (" slash ", MAIN_SEPARATOR_STR),
    ];
    for (spoken, literal) in replacements {
        // Repeat so adjacent tokens ("a dot b dot c") all get replaced.
        while t.contains(spoken) {
            t = t.replacen(spoken, literal, 1);
            if !t.starts_with(' ') {
                t.insert(0, ' ');
            }
            if !t.ends_with(' ') {
                t.push(' ');
            }
        }
    }
    t.trim().trim_matches('"').trim().to_string()
}

fn name_matches(candidate: &Path, needle: &str) -> bool {
    candidate
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .is_some_and(|n| n == needle || n.contains(needle))
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => return Vec::new(),
    };
    entries.sort();
    entries
}

fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().map(|m| m.is_dir()).unwrap_or(false)
}

/// Top-down walk of `root` for the first file (or folder) whose name equals
/// or contains `name`, case-insensitively.
pub fn find_first(root: &Path, name: &str, want_file: bool) -> Option<PathBuf> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    walk(root, &needle, want_file, 0)
}

fn walk(dir: &Path, needle: &str, want_file: bool, depth: usize) -> Option<PathBuf> {
    let entries = sorted_entries(dir);
    let hit = entries.iter().find(|p| {
        let kind_ok = if want_file { p.is_file() } else { p.is_dir() };
        kind_ok && name_matches(p, needle)
    });
    if let Some(hit) = hit {
        return Some(hit.clone());
    }
    if depth >= MAX_DEPTH {
        return None;
    }
    entries
        .iter()
        .filter(|p| is_real_dir(p))
        .find_map(|p| walk(p, needle, want_file, depth + 1))
}

/// Working directory, home, then the usual user folders.
pub fn common_roots(working_dir: &Path, home: &Path) -> Vec<PathBuf> {
    let mut roots = vec![working_dir.to_path_buf(), home.to_path_buf()];
    for sub in ["Desktop", "Documents", "Downloads", "Pictures", "Music", "Videos"] {
        roots.push(home.join(sub));
    }
    roots
}

pub fn search_common_roots(
    name: &str,
    want_file: bool,
    working_dir: &Path,
    home: &Path,
) -> Option<PathBuf> {
    common_roots(working_dir, home)
        .iter()
        .filter(|r| r.is_dir())
        .find_map(|r| find_first(r, name, want_file))
}

/// Resolve a spoken name: as given, relative to the working directory, by
/// searching the working directory, then the common user folders.
pub fn resolve_name(
    name: &str,
    want_file: bool,
    working_dir: &Path,
    home: &Path,
) -> Option<PathBuf> {
    let name = normalize_spoken_path(name);
    if name.is_empty() {
        return None;
    }
    let wanted = |p: &Path| if want_file { p.is_file() } else { p.is_dir() };
    for candidate in [PathBuf::from(&name), working_dir.join(&name)] {
        if candidate.is_absolute() && wanted(&candidate) {
            return Some(candidate.canonicalize().unwrap_or(candidate));
        }
    }
    find_first(working_dir, &name, want_file)
        .or_else(|| search_common_roots(&name, want_file, working_dir, home))
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
}

/// Folders searched for local tracks.
pub fn music_roots(working_dir: &Path, home: &Path) -> Vec<PathBuf> {
    vec![
        working_dir.to_path_buf(),
        home.join("Music"),
        home.join("Downloads"),
        home.join("Desktop"),
    ]
}

/// Exact file name in any root first, then the first audio file whose name
/// contains the query.
pub fn find_audio_file(name: &str, roots: &[PathBuf]) -> Option<PathBuf> {
    let query = normalize_spoken_path(name).to_lowercase();
    if query.is_empty() {
        return None;
    }
    if let Some(exact) = roots.iter().map(|r| r.join(&query)).find(|p| p.is_file()) {
        return Some(exact);
    }
    roots
        .iter()
        .filter(|r| r.is_dir())
        .find_map(|r| walk_audio(r, &query, 0))
}

fn walk_audio(dir: &Path, query: &str, depth: usize) -> Option<PathBuf> {
    let entries = sorted_entries(dir);
    let hit = entries
        .iter()
        .find(|p| p.is_file() && is_audio_file(p) && name_matches(p, query));
    if let Some(hit) = hit {
        return Some(hit.clone());
    }
    if depth >= MAX_DEPTH {
        return None;
    }
    entries
        .iter()
        .filter(|p| is_real_dir(p))
        .find_map(|p| walk_audio(p, query, depth + 1))
}

/// A random audio file directly inside `dir`.
pub fn random_track(dir: &Path) -> Option<PathBuf> {
    let tracks: Vec<PathBuf> = sorted_entries(dir)
        .into_iter()
        .filter(|p| p.is_file() && is_audio_file(p))
        .collect();
    tracks.choose(&mut rand::thread_rng()).cloned()
}
