//! Developer commands: git, shell commands and project tasks.

use std::path::Path;

use tracing::{debug, info, warn};

use super::after_prefix;
use crate::desktop::locate::resolve_name;
use crate::router::IntentRouter;
use crate::session::SessionState;

const DEFAULT_COMMIT_MESSAGE: &str = "update";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Npm,
    Django,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectTask {
    Install,
    Start,
    Migrate,
    MakeMigrations,
}

impl ProjectTask {
    fn label(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::Migrate => "migrate",
            Self::MakeMigrations => "makemigrations",
        }
    }

    /// Plain npm command run when no project type is recognized.
    fn npm_fallback(self) -> Option<&'static str> {
        match self {
            Self::Install => Some("npm install"),
            Self::Start => Some("npm start"),
            Self::Migrate | Self::MakeMigrations => None,
        }
    }
}

/// `package.json` marks an npm project; `manage.py`, or a child directory
/// holding `settings.py`, marks a Django one.
pub fn detect_project(dir: &Path) -> Option<ProjectKind> {
    if dir.join("package.json").is_file() {
        return Some(ProjectKind::Npm);
    }
    if dir.join("manage.py").is_file() {
        return Some(ProjectKind::Django);
    }
    let has_settings = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .any(|e| e.path().is_dir() && e.path().join("settings.py").is_file());
    has_settings.then_some(ProjectKind::Django)
}

fn python() -> &'static str {
    if which::which("python3").is_ok() {
        "python3"
    } else {
        "python"
    }
}

/// Command line for `task` in a project of `kind` rooted at `dir`.
pub fn project_command(
    kind: ProjectKind,
    task: ProjectTask,
    dir: &Path,
    python: &str,
) -> Option<String> {
    match (kind, task) {
        (ProjectKind::Npm, ProjectTask::Install) => Some("npm install".into()),
        (ProjectKind::Npm, ProjectTask::Start) => Some("npm start".into()),
        (ProjectKind::Npm, _) => None,
        (ProjectKind::Django, ProjectTask::Install) => dir
            .join("requirements.txt")
            .is_file()
            .then(|| format!("{python} -m pip install -r requirements.txt")),
        (ProjectKind::Django, ProjectTask::Start) => Some(format!("{python} manage.py runserver")),
        (ProjectKind::Django, ProjectTask::Migrate) => Some(format!("{python} manage.py migrate")),
        (ProjectKind::Django, ProjectTask::MakeMigrations) => {
            Some(format!("{python} manage.py makemigrations"))
        }
    }
}

/// Folder a clone of `url` lands in.
fn clone_dir_name(url: &str) -> String {
    let base = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    base.strip_suffix(".git").unwrap_or(base).to_string()
}

impl IntentRouter {
    fn spawn_in(&self, command: &str, dir: &Path) -> bool {
        if command.trim().is_empty() {
            return false;
        }
        match self.deps.launcher.spawn_shell(command, dir) {
            Ok(()) => true,
            Err(e) => {
                warn!(command, dir = %dir.display(), "Command failed to start: {}", e);
                false
            }
        }
    }

    pub(in crate::router) fn git_clone(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let url = after_prefix(text, &["git clone "]);
        let wd = session.working_directory();
        let dest = wd.join(clone_dir_name(url));
        let dest_arg = dest.to_string_lossy().into_owned();
        match self
            .deps
            .launcher
            .run_program("git", &["clone", url, dest_arg.as_str()], &wd)
        {
            Ok(()) => {
                info!(url, dest = %dest.display(), "Repository cloned");
                self.say("Repository cloned.");
            }
            Err(e) => {
                warn!(url, "Clone failed: {}", e);
                self.say("I couldn't clone that repository.");
            }
        }
        Ok(())
    }

    pub(in crate::router) fn git_push(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let Some(remote) = self.extract.git_url.captures(text).map(|c| c[1].to_string()) else {
            self.say("I need a remote URL ending with .git to push.");
            return Ok(());
        };
        let message = self
            .extract
            .git_message
            .captures(text)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string());
        let wd = session.working_directory();
        let git = |args: &[&str]| self.deps.launcher.run_program("git", args, &wd);

        // Preparing the repository is best effort: an existing repository
        // with nothing to commit is fine.
        let prepared = git(&["init"])
            .and_then(|()| git(&["add", "-A"]))
            .and_then(|()| git(&["commit", "-m", message.as_str()]));
        if let Err(e) = prepared {
            debug!("Repository preparation incomplete: {}", e);
        }
        let _ = git(&["remote", "remove", "origin"]);

        let pushed = git(&["remote", "add", "origin", remote.as_str()])
            .and_then(|()| git(&["branch", "-M", "main"]))
            .and_then(|()| git(&["push", "-u", "origin", "main"]));
        match pushed {
            Ok(()) => self.say("Changes committed and pushed to GitHub."),
            Err(e) => {
                warn!(remote = %remote, "Push failed: {}", e);
                self.say("I couldn't push to GitHub.");
            }
        }
        Ok(())
    }

    pub(in crate::router) fn go_to_and_run(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let parts = self
            .extract
            .go_to_and_run
            .captures(text)
            .map(|c| (c[1].trim().trim_matches('"').to_string(), c[2].trim().to_string()));
        let Some((folder, command)) = parts.filter(|(f, c)| !f.is_empty() && !c.is_empty()) else {
            self.say("Please say: go to <folder> and run <command>.");
            return Ok(());
        };
        let Some(dir) = resolve_name(&folder, false, &session.working_directory(), &self.deps.home)
        else {
            self.say(&format!("I couldn't find folder {folder}"));
            return Ok(());
        };
        if self.spawn_in(&command, &dir) {
            self.say(&format!("Running {command} in {}", dir.display()));
        } else {
            self.say("I couldn't run that command.");
        }
        Ok(())
    }

    pub(in crate::router) fn run_in_current(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let command = after_prefix(text, &["in that run ", "in that execute "]);
        self.run_here(command, session);
        Ok(())
    }

    pub(in crate::router) fn run_command(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let command = after_prefix(text, &["run ", "execute "]);
        self.run_here(command, session);
        Ok(())
    }

    fn run_here(&self, command: &str, session: &SessionState) {
        if self.spawn_in(command, &session.working_directory()) {
            self.say(&format!("Running {command}"));
        } else {
            self.say("I couldn't run that command.");
        }
    }

    pub(in crate::router) fn project_task(
        &self,
        task: ProjectTask,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let wd = session.working_directory();
        let kind = detect_project(&wd);
        debug!(?kind, task = task.label(), dir = %wd.display(), "Project task");

        let command = kind
            .and_then(|k| project_command(k, task, &wd, python()))
            .or_else(|| task.npm_fallback().map(str::to_string));
        let started = command.is_some_and(|c| self.spawn_in(&c, &wd));

        let reply = match (task, started) {
            (ProjectTask::Install, true) => "Running install in this project",
            (ProjectTask::Install, false) => "I couldn't run install here",
            (ProjectTask::Start, true) => "Starting the app",
            (ProjectTask::Start, false) => "I couldn't start the app here",
            (ProjectTask::Migrate, true) => "Running migrate",
            (ProjectTask::Migrate, false) => "I couldn't run migrate here",
            (ProjectTask::MakeMigrations, true) => "Running makemigrations",
            (ProjectTask::MakeMigrations, false) => "I couldn't run makemigrations here",
        };
        self.say(reply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detect_project() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_project(dir.path()), None);

        fs::create_dir(dir.path().join("site")).unwrap();
        fs::write(dir.path().join("site/settings.py"), "").unwrap();
        assert_eq!(detect_project(dir.path()), Some(ProjectKind::Django));

        fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert_eq!(detect_project(dir.path()), Some(ProjectKind::Npm));
    }

    #[test]
    fn test_project_commands() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        assert_eq!(
            project_command(ProjectKind::Django, ProjectTask::MakeMigrations, d, "python3")
                .as_deref(),
            Some("python3 manage.py makemigrations")
        );
        assert_eq!(
            project_command(ProjectKind::Django, ProjectTask::Start, d, "python").as_deref(),
            Some("python manage.py runserver")
        );
        assert_eq!(project_command(ProjectKind::Django, ProjectTask::Install, d, "python"), None);
        fs::write(d.join("requirements.txt"), "django\n").unwrap();
        assert_eq!(
            project_command(ProjectKind::Django, ProjectTask::Install, d, "python").as_deref(),
            Some("python -m pip install -r requirements.txt")
        );
        assert_eq!(project_command(ProjectKind::Npm, ProjectTask::Migrate, d, "python"), None);
    }

    #[test]
    fn test_clone_dir_name() {
        assert_eq!(clone_dir_name("https://github.com/user/repo.git"), "repo");
        assert_eq!(clone_dir_name("https://github.com/user/repo/"), "repo");
    }
}
