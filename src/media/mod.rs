//! Online media playback session.
//!
//! One [`MediaSession`] owns the playlist and at most one live player. Every
//! public operation, and the track-end handler, runs its whole critical
//! section (search, bind and teardown included) under one mutex. Players
//! report track end by posting a message from their own watcher thread; the
//! session's event thread applies it under the same lock.

pub mod process_player;
pub mod ytdlp;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

pub use process_player::ProcessPlayerFactory;
pub use ytdlp::YtDlpResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Stream URL handed to the player.
    pub locator: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Outcome of queueing a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// Nothing was bound, so the track started right away.
    Started(String),
    /// The track waits behind `ahead` others.
    Waiting { title: String, ahead: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("no stream found for {query:?}: {reason}")]
    SearchFailed { query: String, reason: String },
    #[error("player failed for {title:?}: {reason}")]
    PlayerFailed { title: String, reason: String },
    #[error("no player is {0}")]
    NotApplicable(&'static str),
    #[error("no further track in the playlist")]
    EndOfPlaylist,
}

/// Finds a playable stream for a free-form query.
pub trait StreamResolver: Send + Sync {
    fn search(&self, query: &str) -> anyhow::Result<PlaylistEntry>;
}

/// One bound stream. Dropping it must release the underlying resources.
pub trait MediaPlayer: Send {
    fn play(&mut self) -> anyhow::Result<()>;
    fn pause(&mut self) -> anyhow::Result<()>;
    fn resume(&mut self) -> anyhow::Result<()>;
    fn stop(&mut self);
    /// True while the stream is producing audio.
    fn is_playing(&self) -> bool;
}

pub trait PlayerFactory: Send + Sync {
    fn create(
        &self,
        entry: &PlaylistEntry,
        on_end: TrackEndNotifier,
    ) -> anyhow::Result<Box<dyn MediaPlayer>>;
}

#[derive(Debug)]
enum MediaEvent {
    TrackEnded { generation: u64 },
    Shutdown,
}

/// Handed to each player so it can report natural end of stream.
#[derive(Debug, Clone)]
pub struct TrackEndNotifier {
    tx: Sender<MediaEvent>,
    generation: u64,
}

impl TrackEndNotifier {
    pub fn notify(&self) {
        let _ = self.tx.send(MediaEvent::TrackEnded {
            generation: self.generation,
        });
    }
}

struct Inner {
    state: PlaybackState,
    playlist: Vec<PlaylistEntry>,
    current_index: Option<usize>,
    player: Option<Box<dyn MediaPlayer>>,
    /// Bumped on every bind; end events from older players are stale.
    generation: u64,
}

struct Core {
    inner: Mutex<Inner>,
    resolver: Arc<dyn StreamResolver>,
    factory: Arc<dyn PlayerFactory>,
    events: Sender<MediaEvent>,
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn teardown(inner: &mut Inner) {
        if let Some(mut player) = inner.player.take() {
            player.stop();
        }
    }

    /// Replace whatever is bound with a fresh player for `entry` and start it.
    fn bind(&self, inner: &mut Inner, entry: &PlaylistEntry) -> Result<(), MediaError> {
        Self::teardown(inner);
        inner.generation += 1;
        let notifier = TrackEndNotifier {
            tx: self.events.clone(),
            generation: inner.generation,
        };
        let failed = |e: anyhow::Error| MediaError::PlayerFailed {
            title: entry.title.clone(),
            reason: e.to_string(),
        };
        let mut player = self.factory.create(entry, notifier).map_err(failed)?;
        if let Err(e) = player.play() {
            player.stop();
            return Err(failed(e));
        }
        inner.player = Some(player);
        Ok(())
    }

    fn play(&self, query: &str) -> Result<(), MediaError> {
        let mut inner = self.lock();
        self.search_and_play(&mut inner, query)
    }

    fn search(&self, query: &str) -> Result<PlaylistEntry, MediaError> {
        self.resolver.search(query).map_err(|e| MediaError::SearchFailed {
            query: query.to_string(),
            reason: e.to_string(),
        })
    }

    fn search_and_play(&self, inner: &mut Inner, query: &str) -> Result<(), MediaError> {
        let previous = inner.state;
        inner.state = PlaybackState::Loading;

        let entry = match self.search(query) {
            Ok(entry) => entry,
            Err(e) => {
                // A live stream keeps going; otherwise the session is idle.
                inner.state = if inner.player.is_some() {
                    previous
                } else {
                    PlaybackState::Idle
                };
                return Err(e);
            }
        };

        if let Err(e) = self.bind(inner, &entry) {
            inner.state = PlaybackState::Idle;
            return Err(e);
        }

        info!(title = %entry.title, "Online playback started");
        inner.playlist.push(entry);
        inner.current_index = Some(inner.playlist.len() - 1);
        inner.state = PlaybackState::Playing;
        Ok(())
    }

    /// Append a track to play after the queued ones, or play it now when
    /// nothing is bound.
    fn enqueue(&self, query: &str) -> Result<Enqueued, MediaError> {
        let mut inner = self.lock();
        if inner.player.is_none() {
            self.search_and_play(&mut inner, query)?;
            let title = inner.playlist.last().map(|e| e.title.clone()).unwrap_or_default();
            return Ok(Enqueued::Started(title));
        }
        let entry = self.search(query)?;
        let ahead = inner.playlist.len() - inner.current_index.map_or(0, |i| i + 1);
        let title = entry.title.clone();
        info!(title = %title, ahead, "Track queued");
        inner.playlist.push(entry);
        Ok(Enqueued::Waiting { title, ahead })
    }

    fn pause(&self) -> Result<(), MediaError> {
        let mut inner = self.lock();
        let player = match inner.player.as_mut() {
            Some(p) if p.is_playing() => p,
            _ => return Err(MediaError::NotApplicable("playing")),
        };
        player.pause().map_err(|e| MediaError::PlayerFailed {
            title: String::new(),
            reason: e.to_string(),
        })?;
        inner.state = PlaybackState::Paused;
        Ok(())
    }

    fn resume(&self) -> Result<(), MediaError> {
        let mut inner = self.lock();
        let player = match inner.player.as_mut() {
            Some(p) if !p.is_playing() => p,
            _ => return Err(MediaError::NotApplicable("paused")),
        };
        player.resume().map_err(|e| MediaError::PlayerFailed {
            title: String::new(),
            reason: e.to_string(),
        })?;
        inner.state = PlaybackState::Playing;
        Ok(())
    }

    fn stop(&self) {
        let mut inner = self.lock();
        Self::teardown(&mut inner);
        inner.state = PlaybackState::Stopped;
    }

    /// Advance to the entry after the current one and play it.
    fn advance(&self, inner: &mut Inner) -> Result<(), MediaError> {
        let next = match inner.current_index {
            Some(i) if i + 1 < inner.playlist.len() => i + 1,
            _ => return Err(MediaError::EndOfPlaylist),
        };
        let entry = inner.playlist[next].clone();
        if let Err(e) = self.bind(inner, &entry) {
            inner.state = PlaybackState::Idle;
            return Err(e);
        }
        inner.current_index = Some(next);
        inner.state = PlaybackState::Playing;
        Ok(())
    }

    fn next(&self) -> Result<(), MediaError> {
        let mut inner = self.lock();
        self.advance(&mut inner)
    }

    fn on_track_end(&self, generation: u64) {
        let mut inner = self.lock();
        if generation != inner.generation || inner.player.is_none() {
            debug!(generation, "Ignoring stale track end");
            return;
        }
        match self.advance(&mut inner) {
            Ok(()) => info!("Advanced to next track"),
            Err(MediaError::EndOfPlaylist) => {
                Self::teardown(&mut inner);
                inner.state = PlaybackState::Idle;
                debug!("Playlist finished");
            }
            Err(e) => warn!("Could not advance playlist: {}", e),
        }
    }
}

pub struct MediaSession {
    core: Arc<Core>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MediaSession {
    pub fn new(resolver: Arc<dyn StreamResolver>, factory: Arc<dyn PlayerFactory>) -> Self {
        let (tx, rx) = mpsc::channel();
        let core = Arc::new(Core {
            inner: Mutex::new(Inner {
                state: PlaybackState::Idle,
                playlist: Vec::new(),
                current_index: None,
                player: None,
                generation: 0,
            }),
            resolver,
            factory,
            events: tx,
        });

        let event_core = core.clone();
        let worker = thread::Builder::new()
            .name("media-events".into())
            .spawn(move || run_events(event_core, rx))
            .map_err(|e| warn!("Failed to start media event thread: {}", e))
            .ok();

        Self {
            core,
            worker: Mutex::new(worker),
        }
    }

    /// Search for `query` and start playing the first result.
    pub fn play(&self, query: &str) -> bool {
        report("play", self.core.play(query))
    }

    /// Queue `query` behind the current track. `None` when no stream was
    /// found or it could not be started.
    pub fn enqueue(&self, query: &str) -> Option<Enqueued> {
        match self.core.enqueue(query) {
            Ok(queued) => Some(queued),
            Err(e) => {
                debug!(op = "enqueue", "Media operation declined: {}", e);
                None
            }
        }
    }

    pub fn pause(&self) -> bool {
        report("pause", self.core.pause())
    }

    pub fn resume(&self) -> bool {
        report("resume", self.core.resume())
    }

    /// Stop and release the player. Always succeeds.
    pub fn stop(&self) -> bool {
        self.core.stop();
        true
    }

    pub fn next(&self) -> bool {
        report("next", self.core.next())
    }

    pub fn is_active(&self) -> bool {
        let inner = self.core.lock();
        inner.player.is_some()
            && matches!(inner.state, PlaybackState::Playing | PlaybackState::Paused)
    }

    pub fn state(&self) -> PlaybackState {
        self.core.lock().state
    }

    pub fn current_title(&self) -> Option<String> {
        let inner = self.core.lock();
        inner
            .current_index
            .and_then(|i| inner.playlist.get(i))
            .map(|e| e.title.clone())
    }

    pub fn playlist_len(&self) -> usize {
        self.core.lock().playlist.len()
    }

    /// Stop playback and end the event thread.
    pub fn shutdown(&self) {
        self.core.stop();
        let _ = self.core.events.send(MediaEvent::Shutdown);
        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn report(op: &str, result: Result<(), MediaError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(op, "Media operation declined: {}", e);
            false
        }
    }
}

fn run_events(core: Arc<Core>, rx: Receiver<MediaEvent>) {
    while let Ok(event) = rx.recv() {
        match event {
            MediaEvent::TrackEnded { generation } => core.on_track_end(generation),
            MediaEvent::Shutdown => break,
        }
    }
    debug!("Media event thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wait_for, FakePlayerFactory, FakeResolver};
    use std::time::Duration;

    fn session() -> (MediaSession, Arc<FakeResolver>, Arc<FakePlayerFactory>) {
        let resolver = FakeResolver::new();
        let factory = FakePlayerFactory::new();
        let media = MediaSession::new(resolver.clone(), factory.clone());
        (media, resolver, factory)
    }

    #[test]
    fn test_play_appends_and_plays() {
        let (media, _resolver, factory) = session();
        assert!(media.play("shape of you"));
        assert_eq!(media.state(), PlaybackState::Playing);
        assert_eq!(media.playlist_len(), 1);
        assert_eq!(media.current_title().as_deref(), Some("shape of you (official)"));
        assert_eq!(factory.live(), 1);
        assert!(media.is_active());
    }

    #[test]
    fn test_search_failure_leaves_playlist_untouched() {
        let (media, resolver, _factory) = session();
        resolver.fail_next();
        assert!(!media.play("nothing"));
        assert_eq!(media.state(), PlaybackState::Idle);
        assert_eq!(media.playlist_len(), 0);
    }

    #[test]
    fn test_search_failure_keeps_live_stream() {
        let (media, resolver, factory) = session();
        assert!(media.play("first"));
        resolver.fail_next();
        assert!(!media.play("second"));
        assert_eq!(media.state(), PlaybackState::Playing);
        assert_eq!(media.playlist_len(), 1);
        assert_eq!(factory.live(), 1);
    }

    #[test]
    fn test_bind_failure_goes_idle() {
        let (media, _resolver, factory) = session();
        factory.fail_next();
        assert!(!media.play("song"));
        assert_eq!(media.state(), PlaybackState::Idle);
        assert_eq!(media.playlist_len(), 0);
        assert_eq!(factory.live(), 0);
    }

    #[test]
    fn test_pause_resume_transitions() {
        let (media, _resolver, _factory) = session();
        assert!(!media.pause());
        assert!(!media.resume());

        assert!(media.play("song"));
        assert!(!media.resume());
        assert!(media.pause());
        assert_eq!(media.state(), PlaybackState::Paused);
        assert!(!media.pause());
        assert!(media.resume());
        assert_eq!(media.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_stop_always_succeeds() {
        let (media, _resolver, factory) = session();
        assert!(media.stop());
        assert_eq!(media.state(), PlaybackState::Stopped);

        assert!(media.play("song"));
        assert!(media.stop());
        assert_eq!(factory.live(), 0);
        assert!(!media.is_active());
    }

    #[test]
    fn test_next_at_end_is_refused() {
        let (media, _resolver, _factory) = session();
        assert!(!media.next());
        assert!(media.play("a"));
        assert!(!media.next());
        assert_eq!(media.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_enqueue_starts_when_idle_then_waits() {
        let (media, _resolver, factory) = session();
        assert_eq!(media.enqueue("a"), Some(Enqueued::Started("a (official)".into())));
        assert_eq!(
            media.enqueue("b"),
            Some(Enqueued::Waiting { title: "b (official)".into(), ahead: 0 })
        );
        assert_eq!(
            media.enqueue("c"),
            Some(Enqueued::Waiting { title: "c (official)".into(), ahead: 1 })
        );
        assert_eq!(media.current_title().as_deref(), Some("a (official)"));
        assert_eq!(factory.live(), 1);
    }

    #[test]
    fn test_enqueue_search_failure_keeps_playlist() {
        let (media, resolver, _factory) = session();
        assert!(media.play("a"));
        resolver.fail_next();
        assert_eq!(media.enqueue("b"), None);
        assert_eq!(media.playlist_len(), 1);
        assert_eq!(media.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_next_advances_to_queued_track() {
        let (media, _resolver, factory) = session();
        assert!(media.play("a"));
        assert!(media.enqueue("b").is_some());
        assert!(media.next());
        assert_eq!(media.current_title().as_deref(), Some("b (official)"));
        assert_eq!(media.state(), PlaybackState::Playing);
        assert_eq!(factory.live(), 1);
        assert!(!media.next());
    }

    #[test]
    fn test_track_end_plays_queued_track() {
        let (media, _resolver, factory) = session();
        assert!(media.play("a"));
        assert!(media.enqueue("b").is_some());
        factory.end_current();
        assert!(wait_for(Duration::from_secs(5), || {
            media.current_title().as_deref() == Some("b (official)")
        }));
        assert_eq!(media.state(), PlaybackState::Playing);
        assert_eq!(factory.live(), 1);

        factory.end_current();
        assert!(wait_for(Duration::from_secs(5), || media.state() == PlaybackState::Idle));
        assert_eq!(factory.live(), 0);
    }

    #[test]
    fn test_track_end_without_next_goes_idle() {
        let (media, _resolver, factory) = session();
        assert!(media.play("a"));
        factory.end_current();
        assert!(wait_for(Duration::from_secs(5), || media.state() == PlaybackState::Idle));
        assert_eq!(factory.live(), 0);
    }

    #[test]
    fn test_stale_track_end_is_ignored() {
        let (media, _resolver, factory) = session();
        assert!(media.play("a"));
        let stale = factory.notifier(0);
        assert!(media.play("b"));
        stale.notify();
        // Give the event thread a chance to (wrongly) act on it.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(media.state(), PlaybackState::Playing);
        assert_eq!(media.current_title().as_deref(), Some("b (official)"));
    }

    #[test]
    fn test_concurrent_play_keeps_one_live_player() {
        let (media, _resolver, factory) = session();
        let media = Arc::new(media);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let media = media.clone();
                std::thread::spawn(move || media.play(&format!("song {i}")))
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(factory.max_live(), 1);
        assert_eq!(factory.live(), 1);
        assert_eq!(media.playlist_len(), 8);
        assert_eq!(media.state(), PlaybackState::Playing);
    }
}
