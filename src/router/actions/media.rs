use reqwest::Url;
use tracing::{debug, warn};

use super::{after_prefix, strip_phrases};
use crate::desktop::locate::{find_audio_file, music_roots, random_track};
use crate::desktop::MediaKey;
use crate::media::Enqueued;
use crate::router::IntentRouter;
use crate::session::SessionState;

const SONG_MARKERS: &[&str] = &[
    "play music",
    "play song",
    "play track",
    "play online",
    "play on web",
    "play from web",
];
const ONLINE_PHRASES: &[&str] = &["play online", "play on web", "play from web", "online"];

/// The song named after a play marker, minus playback-mode words.
pub(crate) fn extract_song(text: &str) -> String {
    let mut song = "";
    for marker in SONG_MARKERS {
        if let Some(i) = text.find(marker) {
            song = &text[i + marker.len()..];
        }
    }
    strip_phrases(song, ONLINE_PHRASES)
}

/// The song in "queue <song>" or "add <song> to the queue".
pub(crate) fn queue_song(text: &str) -> String {
    let rest = after_prefix(text, &["queue song ", "queue ", "add song ", "add "]);
    strip_phrases(rest, &["to the queue", "to queue", "to the playlist"])
}

fn wants_online(text: &str) -> bool {
    ["online", "play on web", "play from web"]
        .iter()
        .any(|p| text.contains(p))
}

fn youtube_results(query: &str) -> Option<Url> {
    Url::parse_with_params("https://www.youtube.com/results", &[("search_query", query)]).ok()
}

impl IntentRouter {
    pub(in crate::router) fn prefer_online(
        &self,
        session: &SessionState,
        online: bool,
    ) -> anyhow::Result<()> {
        session.set_prefer_online_playback(online);
        if online {
            self.say("Okay, I will play music online by default.");
        } else {
            self.say("Okay, I will play music from your computer.");
        }
        Ok(())
    }

    pub(in crate::router) fn play_music(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let song = extract_song(text);
        if session.prefer_online_playback() || wants_online(text) {
            self.play_online(&song);
        } else {
            self.play_local(&song, session);
        }
        Ok(())
    }

    fn play_online(&self, song: &str) {
        let query = if song.is_empty() { "music" } else { song };
        if self.deps.media.play(query) {
            let title = self
                .deps
                .media
                .current_title()
                .unwrap_or_else(|| query.to_string());
            debug!(tracks = self.deps.media.playlist_len(), "Streaming");
            self.say(&format!("Playing {title} online"));
            return;
        }
        debug!(query, "Stream playback failed, trying the browser");
        let opened = youtube_results(query)
            .map(|url| self.deps.launcher.open_url(url.as_str()).is_ok())
            .unwrap_or(false);
        if opened {
            self.say("Playing on the web");
        } else {
            self.say("I couldn't play that online.");
        }
    }

    pub(in crate::router) fn queue_music(&self, text: &str) -> anyhow::Result<()> {
        let song = queue_song(text);
        if song.is_empty() {
            self.say("What should I add to the queue?");
            return Ok(());
        }
        match self.deps.media.enqueue(&song) {
            Some(Enqueued::Started(title)) => self.say(&format!("Playing {title} online")),
            Some(Enqueued::Waiting { title, ahead: 0 }) => self.say(&format!("{title} is up next")),
            Some(Enqueued::Waiting { title, ahead }) => {
                self.say(&format!("Queued {title} after {ahead} more"))
            }
            None => self.say("I couldn't find that online."),
        }
        Ok(())
    }

    fn play_local(&self, song: &str, session: &SessionState) {
        let wd = session.working_directory();
        let track = if song.is_empty() {
            None
        } else {
            find_audio_file(song, &music_roots(&wd, &self.deps.home))
        }
        .or_else(|| random_track(&self.deps.home.join("Music")));

        let Some(track) = track else {
            self.say("I couldn't find that track.");
            return;
        };
        let name = track
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.deps.launcher.open_path(&track) {
            Ok(()) => self.say(&format!("Playing {name}")),
            Err(e) => {
                warn!(track = %track.display(), "Could not open track: {}", e);
                self.say("I found a track but couldn't play it.");
            }
        }
    }

    fn media_key(&self, key: MediaKey) {
        debug!(?key, session = ?self.deps.media.state(), "Falling back to media key");
        if let Err(e) = self.deps.launcher.press_media_key(key) {
            debug!(?key, "Media key unavailable: {}", e);
        }
    }

    pub(in crate::router) fn pause_music(&self) -> anyhow::Result<()> {
        if !self.deps.media.pause() {
            self.media_key(MediaKey::PlayPause);
        }
        self.say("Paused.");
        Ok(())
    }

    pub(in crate::router) fn resume_music(&self) -> anyhow::Result<()> {
        if !self.deps.media.resume() {
            self.media_key(MediaKey::PlayPause);
        }
        self.say("Resumed.");
        Ok(())
    }

    pub(in crate::router) fn stop_music(&self) -> anyhow::Result<()> {
        // Stopping an idle session always succeeds, so check activity first.
        if !self.deps.media.is_active() {
            self.media_key(MediaKey::Stop);
        }
        self.deps.media.stop();
        self.say("Stopped.");
        Ok(())
    }

    pub(in crate::router) fn next_track(&self) -> anyhow::Result<()> {
        if !self.deps.media.next() {
            self.media_key(MediaKey::Next);
        }
        self.say("Next.");
        Ok(())
    }
}
