use std::fs;
use std::path::Path;

use tracing::{info, warn};

use super::after_prefix;
use crate::desktop::locate::{find_first, normalize_spoken_path, resolve_name, search_common_roots};
use crate::router::IntentRouter;
use crate::session::SessionState;

const LISTED_FILES: usize = 20;

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn strip_named(name: &str) -> &str {
    name.strip_prefix("named ").unwrap_or(name).trim()
}

impl IntentRouter {
    pub(in crate::router) fn create_folder(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let name = normalize_spoken_path(after_prefix(text, &["create folder ", "make folder "]));
        if name.is_empty() {
            self.say("Please tell me the folder name.");
            return Ok(());
        }
        let path = session.resolve(&name);
        match fs::create_dir_all(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Folder created");
                self.say(&format!("Created folder {name}"));
            }
            Err(e) => {
                warn!(path = %path.display(), "Create folder failed: {}", e);
                self.say(&format!("I couldn't create folder {name}"));
            }
        }
        Ok(())
    }

    pub(in crate::router) fn delete_path(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let name = normalize_spoken_path(after_prefix(
            text,
            &["delete folder ", "remove folder ", "delete file "],
        ));
        let path = session.resolve(&name);
        let result = if name.is_empty() {
            Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "no name"))
        } else if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                info!(path = %path.display(), "Deleted");
                self.say(&format!("Deleted {name}"));
            }
            Err(e) => {
                warn!(path = %path.display(), "Delete failed: {}", e);
                self.say(&format!("I couldn't delete {name}"));
            }
        }
        Ok(())
    }

    pub(in crate::router) fn rename(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let Some(caps) = self.extract.rename.captures(text) else {
            self.say("Please say rename <old> to <new>.");
            return Ok(());
        };
        let old = caps[1].trim();
        let new = caps[2].trim();
        let (from, to) = (session.resolve(old), session.resolve(new));
        match fs::rename(&from, &to) {
            Ok(()) => {
                info!(from = %from.display(), to = %to.display(), "Renamed");
                self.say(&format!("Renamed {old} to {new}"));
            }
            Err(e) => {
                warn!(from = %from.display(), "Rename failed: {}", e);
                self.say(&format!("I couldn't rename {old}"));
            }
        }
        Ok(())
    }

    pub(in crate::router) fn open_file_in_current(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let name = after_prefix(text, &["in that open file ", "in that find file "]);
        let found = resolve_name(name, true, &session.working_directory(), &self.deps.home);
        self.open_found_file(name, found.as_deref());
        Ok(())
    }

    pub(in crate::router) fn open_folder_in_current(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let name = after_prefix(text, &["in that open ", "in that go to "]);
        match resolve_name(name, false, &session.working_directory(), &self.deps.home) {
            Some(dir) if session.set_working_directory(&dir) => {
                let _ = self.deps.launcher.open_path(&dir);
                self.say(&format!("Opened folder {}", base_name(&dir)));
            }
            _ => self.say(&format!("I couldn't find folder {name}")),
        }
        Ok(())
    }

    pub(in crate::router) fn change_folder(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let name = strip_named(after_prefix(
            text,
            &["go to folder ", "cd to ", "open folder ", "open directory "],
        ));
        match resolve_name(name, false, &session.working_directory(), &self.deps.home) {
            Some(dest) if session.set_working_directory(&dest) => {
                self.say(&format!("Moved to {}", dest.display()));
                if let Err(e) = self.deps.launcher.open_path(&dest) {
                    warn!(dest = %dest.display(), "Could not open folder: {}", e);
                }
            }
            _ => self.say(&format!("I couldn't find folder {name}")),
        }
        Ok(())
    }

    pub(in crate::router) fn open_file(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let raw = strip_named(after_prefix(text, &["open file ", "find file "]));
        let (raw, whole_pc) = match raw.strip_suffix(" in my pc") {
            Some(rest) => (rest.trim(), true),
            None => (raw, false),
        };
        let name = normalize_spoken_path(raw);
        let wd = session.working_directory();
        let found = if name.is_empty() {
            None
        } else {
            find_first(&wd, &name, true).or_else(|| {
                whole_pc
                    .then(|| search_common_roots(&name, true, &wd, &self.deps.home))
                    .flatten()
            })
        };
        self.open_found_file(&name, found.as_deref());
        Ok(())
    }

    fn open_found_file(&self, name: &str, found: Option<&Path>) {
        match found {
            Some(path) => match self.deps.launcher.open_path(path) {
                Ok(()) => self.say(&format!("Opened {}", base_name(path))),
                Err(e) => {
                    warn!(path = %path.display(), "Open failed: {}", e);
                    self.say("I found it but could not open the file.");
                }
            },
            None => self.say(&format!("I couldn't find {name}")),
        }
    }

    pub(in crate::router) fn current_folder(&self, session: &SessionState) -> anyhow::Result<()> {
        self.say(&format!("You are in {}", session.working_directory().display()));
        Ok(())
    }

    pub(in crate::router) fn list_files(&self, session: &SessionState) -> anyhow::Result<()> {
        let wd = session.working_directory();
        let mut names: Vec<String> = match fs::read_dir(&wd) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                warn!(dir = %wd.display(), "List failed: {}", e);
                self.say("I couldn't list the files here.");
                return Ok(());
            }
        };
        if names.is_empty() {
            self.say("This folder is empty.");
            return Ok(());
        }
        names.sort();
        names.truncate(LISTED_FILES);
        self.say(&format!("Files here: {}", names.join(", ")));
        Ok(())
    }
}
