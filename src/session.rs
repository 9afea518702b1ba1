//! Process-wide session state shared by every thread that touches commands.
//!
//! One instance is built in `main` and handed out by `Arc`. All four fields
//! live behind a single mutex; callers get copies, never references into the
//! lock.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::info;

/// A consistent copy of every session field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub working_directory: PathBuf,
    pub prefer_online_playback: bool,
    pub use_system_voice: bool,
    pub wake_word_enabled: bool,
}

#[derive(Debug)]
pub struct SessionState {
    inner: Mutex<SessionSnapshot>,
}

impl SessionState {
    pub fn new(initial: SessionSnapshot) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionSnapshot> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().clone()
    }

    pub fn working_directory(&self) -> PathBuf {
        self.lock().working_directory.clone()
    }

    /// Change the working directory. Relative paths resolve against the
    /// current one. Returns `false` (and leaves the field alone) unless the
    /// target is an existing directory.
    pub fn set_working_directory(&self, path: &Path) -> bool {
        let mut inner = self.lock();
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            inner.working_directory.join(path)
        };
        if !candidate.is_dir() {
            return false;
        }
        let resolved = candidate.canonicalize().unwrap_or(candidate);
        info!(dir = %resolved.display(), "Working directory changed");
        inner.working_directory = resolved;
        true
    }

    /// Resolve a user-supplied path against the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.lock().working_directory.join(p)
        }
    }

    pub fn prefer_online_playback(&self) -> bool {
        self.lock().prefer_online_playback
    }

    pub fn set_prefer_online_playback(&self, value: bool) {
        self.lock().prefer_online_playback = value;
    }

    pub fn use_system_voice(&self) -> bool {
        self.lock().use_system_voice
    }

    pub fn set_use_system_voice(&self, value: bool) {
        self.lock().use_system_voice = value;
    }

    pub fn wake_word_enabled(&self) -> bool {
        self.lock().wake_word_enabled
    }

    pub fn set_wake_word_enabled(&self, value: bool) {
        self.lock().wake_word_enabled = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn session_in(dir: &Path) -> SessionState {
        SessionState::new(SessionSnapshot {
            working_directory: dir.to_path_buf(),
            prefer_online_playback: false,
            use_system_voice: false,
            wake_word_enabled: true,
        })
    }

    #[test]
    fn test_set_working_directory_requires_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();
        let session = session_in(dir.path());

        assert!(!session.set_working_directory(Path::new("missing")));
        assert!(!session.set_working_directory(Path::new("file.txt")));
        assert_eq!(session.working_directory(), dir.path());

        assert!(session.set_working_directory(Path::new("sub")));
        assert!(session.working_directory().ends_with("sub"));
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        assert_eq!(session.resolve("a.txt"), dir.path().join("a.txt"));
        let abs = dir.path().join("b.txt");
        assert_eq!(session.resolve(abs.to_str().unwrap()), abs);
    }

    #[test]
    fn test_flags_visible_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(session_in(dir.path()));

        let writer = {
            let session = session.clone();
            thread::spawn(move || {
                session.set_wake_word_enabled(false);
                session.set_prefer_online_playback(true);
            })
        };
        writer.join().unwrap();

        let snap = session.snapshot();
        assert!(!snap.wake_word_enabled);
        assert!(snap.prefer_online_playback);
        assert!(!snap.use_system_voice);
    }
}
