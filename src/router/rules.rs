//! The ordered command table.
//!
//! Rules are data: a name, a predicate over the normalized utterance, and
//! the intent it selects. The first matching rule wins, so the order of
//! [`rule_table`] is the precedence order.

use anyhow::Context;
use regex::Regex;

#[derive(Debug)]
pub enum Predicate {
    Contains(&'static str),
    StartsWith(&'static str),
    Exact(&'static str),
    /// Whole word or whole multi-word phrase.
    Word(&'static str),
    Pattern(Regex),
    AnyOf(Vec<Predicate>),
    AllOf(Vec<Predicate>),
    Not(Box<Predicate>),
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect()
}

impl Predicate {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(s) => text.contains(s),
            Self::StartsWith(s) => text.starts_with(s),
            Self::Exact(s) => text.trim() == *s,
            Self::Word(phrase) => {
                let needle = words(phrase);
                let hay = words(text);
                !needle.is_empty() && hay.windows(needle.len()).any(|w| w == needle.as_slice())
            }
            Self::Pattern(re) => re.is_match(text),
            Self::AnyOf(ps) => ps.iter().any(|p| p.matches(text)),
            Self::AllOf(ps) => ps.iter().all(|p| p.matches(text)),
            Self::Not(p) => !p.matches(text),
        }
    }
}

fn contains_any(needles: &[&'static str]) -> Predicate {
    Predicate::AnyOf(needles.iter().map(|n| Predicate::Contains(n)).collect())
}

fn starts_any(prefixes: &[&'static str]) -> Predicate {
    Predicate::AnyOf(prefixes.iter().map(|p| Predicate::StartsWith(p)).collect())
}

fn exact_any(phrases: &[&'static str]) -> Predicate {
    Predicate::AnyOf(phrases.iter().map(|p| Predicate::Exact(p)).collect())
}

fn word_any(phrases: &[&'static str]) -> Predicate {
    Predicate::AnyOf(phrases.iter().map(|p| Predicate::Word(p)).collect())
}

fn any(ps: Vec<Predicate>) -> Predicate {
    Predicate::AnyOf(ps)
}

fn all(ps: Vec<Predicate>) -> Predicate {
    Predicate::AllOf(ps)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    StopSpeaking,
    PreferOnline,
    PreferLocal,
    PlayMusic,
    QueueMusic,
    PauseMusic,
    ResumeMusic,
    StopMusic,
    NextTrack,
    Wikipedia,
    CreateFolder,
    DeletePath,
    Rename,
    GitClone,
    GitPush,
    TypeText,
    GoToAndRun,
    OpenFileInCurrent,
    OpenFolderInCurrent,
    RunInCurrent,
    ChangeFolder,
    OpenFile,
    MakeMigrations,
    Migrate,
    InstallDependencies,
    StartApp,
    RunCommand,
    OpenYoutube,
    OpenGoogle,
    YoutubeSearch,
    AmazonSearch,
    ChromeOpenSite,
    WebSearch,
    OpenBrowser,
    OpenApp,
    CurrentFolder,
    ListFiles,
    Time,
    Date,
    ChangeName,
    ListVoices,
    VoiceByIndex,
    ChangeVoice,
    UseSystemVoice,
    UseEngineVoice,
    EnableWakeWord,
    DisableWakeWord,
    Screenshot,
    Joke,
    HearingCheck,
    ModelInfo,
    AudioTest,
    Empathy,
    EnableStartup,
    DisableStartup,
    Shutdown,
    Restart,
    Exit,
}

#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub intent: Intent,
}

fn rule(name: &'static str, predicate: Predicate, intent: Intent) -> Rule {
    Rule {
        name,
        predicate,
        intent,
    }
}

/// Phrases that get a supportive reply.
pub const EMPATHY_TRIGGERS: &[&str] = &[
    "how are you",
    "bad day",
    "feeling down",
    "i feel bad",
    "i'm tired",
    "i am tired",
    "sad",
    "upset",
    "lonely",
    "stressed",
    "anxious",
    "depressed",
    "not okay",
    "burned out",
    "heartbroken",
    "i'm angry",
    "i am angry",
];

pub const GO_TO_AND_RUN: &str = r"^go to (.+?) and run (.+)$";

/// Build the table once at startup.
pub fn rule_table() -> anyhow::Result<Vec<Rule>> {
    use Intent::*;
    use Predicate::{Contains, Exact, Not, StartsWith, Word};

    let go_to_and_run = Regex::new(GO_TO_AND_RUN).context("go-to-and-run pattern")?;
    let make_migrations = || contains_any(&["makemigrations", "make migrations"]);

    Ok(vec![
        rule(
            "stop-speaking",
            any(vec![
                contains_any(&["stop speaking", "stop voice", "stop talking", "be quiet"]),
                Word("mute"),
            ]),
            StopSpeaking,
        ),
        rule(
            "prefer-online",
            contains_any(&["always play online", "play online by default"]),
            PreferOnline,
        ),
        rule(
            "prefer-local",
            contains_any(&["play locally", "don't play online", "do not play online"]),
            PreferLocal,
        ),
        rule(
            "queue-music",
            any(vec![
                StartsWith("queue "),
                all(vec![
                    StartsWith("add "),
                    contains_any(&["to the queue", "to queue", "to the playlist"]),
                ]),
            ]),
            QueueMusic,
        ),
        rule(
            "play-music",
            any(vec![
                Contains("play music"),
                starts_any(&["play song ", "play track "]),
                contains_any(&["play online", "play on web", "play from web"]),
            ]),
            PlayMusic,
        ),
        rule(
            "pause-music",
            any(vec![contains_any(&["pause music", "pause song"]), Exact("pause")]),
            PauseMusic,
        ),
        rule(
            "resume-music",
            any(vec![contains_any(&["resume music", "continue music"]), Exact("resume")]),
            ResumeMusic,
        ),
        rule(
            "stop-music",
            any(vec![contains_any(&["stop music", "stop song"]), Exact("stop")]),
            StopMusic,
        ),
        rule(
            "next-track",
            any(vec![contains_any(&["next song", "next track"]), Exact("next")]),
            NextTrack,
        ),
        rule("wikipedia", Contains("wikipedia"), Wikipedia),
        rule("create-folder", starts_any(&["create folder ", "make folder "]), CreateFolder),
        rule(
            "delete-path",
            starts_any(&["delete folder ", "remove folder ", "delete file "]),
            DeletePath,
        ),
        rule("rename", StartsWith("rename "), Rename),
        rule("git-clone", StartsWith("git clone "), GitClone),
        rule(
            "git-push",
            starts_any(&["push to github", "git push", "commit and push"]),
            GitPush,
        ),
        rule("type-text", StartsWith("type "), TypeText),
        rule("go-to-and-run", Predicate::Pattern(go_to_and_run), GoToAndRun),
        rule(
            "open-file-in-current",
            starts_any(&["in that open file ", "in that find file "]),
            OpenFileInCurrent,
        ),
        rule(
            "open-folder-in-current",
            starts_any(&["in that open ", "in that go to "]),
            OpenFolderInCurrent,
        ),
        rule("run-in-current", starts_any(&["in that run ", "in that execute "]), RunInCurrent),
        rule(
            "change-folder",
            starts_any(&["go to folder ", "cd to ", "open folder ", "open directory "]),
            ChangeFolder,
        ),
        rule("open-file", starts_any(&["open file ", "find file "]), OpenFile),
        rule("make-migrations", make_migrations(), MakeMigrations),
        rule(
            "migrate",
            all(vec![Contains("migrate"), Not(Box::new(make_migrations()))]),
            Migrate,
        ),
        rule(
            "install-dependencies",
            starts_any(&["npm install", "install npm", "install dependencies"]),
            InstallDependencies,
        ),
        rule(
            "start-app",
            any(vec![
                StartsWith("npm start"),
                contains_any(&["run the app", "start the app"]),
            ]),
            StartApp,
        ),
        rule("run-command", starts_any(&["run ", "execute "]), RunCommand),
        rule("open-youtube", Contains("open youtube"), OpenYoutube),
        rule("open-google", Contains("open google"), OpenGoogle),
        rule(
            "youtube-search",
            any(vec![
                all(vec![Contains("youtube"), contains_any(&["search", "find"])]),
                all(vec![Contains("youtube"), Contains("in chrome")]),
            ]),
            YoutubeSearch,
        ),
        rule(
            "amazon-search",
            all(vec![Contains("amazon"), contains_any(&["search", "find"])]),
            AmazonSearch,
        ),
        rule(
            "chrome-open-site",
            all(vec![
                contains_any(&["in chrome", "in google chrome"]),
                contains_any(&["open", "go to"]),
            ]),
            ChromeOpenSite,
        ),
        rule("web-search", StartsWith("search "), WebSearch),
        rule(
            "open-browser",
            exact_any(&["open browser", "open the browser", "open web browser"]),
            OpenBrowser,
        ),
        rule("open-app", starts_any(&["open ", "launch "]), OpenApp),
        rule(
            "current-folder",
            any(vec![Contains("current folder"), Exact("pwd")]),
            CurrentFolder,
        ),
        rule(
            "list-files",
            any(vec![starts_any(&["list files", "show files"]), Exact("ls")]),
            ListFiles,
        ),
        rule("time", Word("time"), Time),
        rule("date", Word("date"), Date),
        rule("change-name", Contains("change your name"), ChangeName),
        rule("list-voices", contains_any(&["list voices", "what voices"]), ListVoices),
        rule(
            "voice-by-index",
            contains_any(&["voice one", "voice two", "voice three"]),
            VoiceByIndex,
        ),
        rule("change-voice", contains_any(&["change voice", "set voice"]), ChangeVoice),
        rule(
            "use-system-voice",
            contains_any(&["use system voice", "force system voice"]),
            UseSystemVoice,
        ),
        rule(
            "use-engine-voice",
            contains_any(&["use engine voice", "disable system voice"]),
            UseEngineVoice,
        ),
        rule(
            "enable-wake-word",
            contains_any(&["enable wake word", "turn on wake word"]),
            EnableWakeWord,
        ),
        rule(
            "disable-wake-word",
            contains_any(&["disable wake word", "turn off wake word"]),
            DisableWakeWord,
        ),
        rule("screenshot", Contains("screenshot"), Screenshot),
        rule("joke", Contains("tell me a joke"), Joke),
        rule(
            "hearing-check",
            contains_any(&["can you hear me", "are you there"]),
            HearingCheck,
        ),
        rule(
            "model-info",
            contains_any(&["which model are you", "what model are you"]),
            ModelInfo,
        ),
        rule("audio-test", contains_any(&["audio test", "test audio"]), AudioTest),
        rule("empathy", contains_any(EMPATHY_TRIGGERS), Empathy),
        rule(
            "enable-startup",
            contains_any(&["enable startup", "start on startup"]),
            EnableStartup,
        ),
        rule(
            "disable-startup",
            contains_any(&["disable startup", "stop startup"]),
            DisableStartup,
        ),
        rule("shutdown", word_any(&["shutdown", "shut down"]), Shutdown),
        rule("restart", Word("restart"), Restart),
        rule("exit", word_any(&["offline", "exit", "quit"]), Exit),
    ])
}

/// First rule whose predicate accepts `text`.
pub fn classify<'a>(rules: &'a [Rule], text: &str) -> Option<&'a Rule> {
    rules.iter().find(|r| r.predicate.matches(text))
}
