//! In-memory fakes for the voice, stream and notification boundaries.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::input::{HttpRequest, Input};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{
    error::{StreamError, VoiceError},
    events::{Notifier, QueueEvent},
    stream::{AudioStream, EncodingHint, StreamProvider},
    voice::{PlayerEvents, PlayerHandle, VoiceConnector, VoiceSession},
};
use crate::sources::Song;

pub fn song(n: usize) -> Song {
    Song::new(
        format!("Song {}", n),
        format!("https://www.youtube.com/watch?v=song{}", n),
        "3:00",
        "",
        UserId::new(42),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Playing,
    Paused,
    Stopped,
}

struct FakeTrack {
    events: PlayerEvents,
    status: Arc<Mutex<TrackStatus>>,
}

#[derive(Default)]
struct VoiceState {
    joins: AtomicUsize,
    leaves: AtomicUsize,
    fail_joins: AtomicBool,
    join_delay: Mutex<Option<Duration>>,
    leave_delay: Mutex<Option<Duration>>,
    /// Una conexión por guild, como la llamada única de Songbird
    connections: Mutex<HashMap<GuildId, usize>>,
    tracks: Mutex<Vec<FakeTrack>>,
}

/// Voice connector that records joins, leaves and every bound track.
#[derive(Clone, Default)]
pub struct FakeVoice {
    state: Arc<VoiceState>,
}

impl FakeVoice {
    pub fn joins(&self) -> usize {
        self.state.joins.load(Ordering::SeqCst)
    }

    pub fn leaves(&self) -> usize {
        self.state.leaves.load(Ordering::SeqCst)
    }

    /// Tracks started so far
    pub fn tracks(&self) -> usize {
        self.state.tracks.lock().len()
    }

    pub fn status(&self, index: usize) -> Option<TrackStatus> {
        self.state.tracks.lock().get(index).map(|t| *t.status.lock())
    }

    pub fn fail_joins(&self) {
        self.state.fail_joins.store(true, Ordering::SeqCst);
    }

    pub fn delay_joins(&self, delay: Duration) {
        *self.state.join_delay.lock() = Some(delay);
    }

    pub fn delay_leaves(&self, delay: Duration) {
        *self.state.leave_delay.lock() = Some(delay);
    }

    pub fn connected(&self, guild_id: GuildId) -> bool {
        self.state.connections.lock().contains_key(&guild_id)
    }

    pub fn finish_track(&self, index: usize) {
        if let Some(track) = self.state.tracks.lock().get(index) {
            track.events.finished();
        }
    }

    pub fn error_track(&self, index: usize, message: &str) {
        if let Some(track) = self.state.tracks.lock().get(index) {
            track.events.errored(message);
        }
    }

    pub fn finish_last(&self) {
        if let Some(track) = self.state.tracks.lock().last() {
            track.events.finished();
        }
    }

    pub fn error_last(&self, message: &str) {
        if let Some(track) = self.state.tracks.lock().last() {
            track.events.errored(message);
        }
    }
}

#[async_trait]
impl VoiceConnector for FakeVoice {
    async fn join(
        &self,
        guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceSession>, VoiceError> {
        let join = self.state.joins.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.join_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_joins.load(Ordering::SeqCst) {
            return Err(VoiceError::Join("canal lleno".into()));
        }

        self.state.connections.lock().insert(guild_id, join);
        Ok(Box::new(FakeSession {
            guild_id,
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    guild_id: GuildId,
    state: Arc<VoiceState>,
}

#[async_trait]
impl VoiceSession for FakeSession {
    async fn play(
        &mut self,
        _stream: AudioStream,
        events: PlayerEvents,
    ) -> Result<Box<dyn PlayerHandle>, VoiceError> {
        let status = Arc::new(Mutex::new(TrackStatus::Playing));
        self.state.tracks.lock().push(FakeTrack {
            events,
            status: status.clone(),
        });
        Ok(Box::new(FakePlayer(status)))
    }

    /// Corta la conexión del guild, sea cual sea la sesión que la abrió
    async fn leave(&mut self) -> Result<(), VoiceError> {
        let delay = *self.state.leave_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state.connections.lock().remove(&self.guild_id);
        self.state.leaves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePlayer(Arc<Mutex<TrackStatus>>);

impl PlayerHandle for FakePlayer {
    fn pause(&self) -> Result<(), VoiceError> {
        *self.0.lock() = TrackStatus::Paused;
        Ok(())
    }

    fn resume(&self) -> Result<(), VoiceError> {
        *self.0.lock() = TrackStatus::Playing;
        Ok(())
    }

    fn stop(&self) -> Result<(), VoiceError> {
        *self.0.lock() = TrackStatus::Stopped;
        Ok(())
    }
}

#[derive(Default)]
struct StreamState {
    failing: Mutex<HashSet<String>>,
    opened: Mutex<Vec<String>>,
    hold: AtomicBool,
}

/// Stream provider that never touches the network.
#[derive(Clone, Default)]
pub struct FakeStreams {
    state: Arc<StreamState>,
}

impl FakeStreams {
    pub fn fail(&self, url: &str) {
        self.state.failing.lock().insert(url.to_string());
    }

    /// Opens after this never complete
    pub fn hold(&self) {
        self.state.hold.store(true, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.opened.lock().clone()
    }
}

#[async_trait]
impl StreamProvider for FakeStreams {
    async fn open(&self, source_url: &str) -> Result<AudioStream, StreamError> {
        self.state.opened.lock().push(source_url.to_string());

        if self.state.hold.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        if self.state.failing.lock().contains(source_url) {
            return Err(StreamError::Extraction(format!("video no disponible: {}", source_url)));
        }

        Ok(AudioStream {
            input: Input::from(HttpRequest::new(reqwest::Client::new(), source_url.to_string())),
            hint: EncodingHint::default(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(GuildId, QueueEvent)>>,
}

impl RecordingNotifier {
    pub fn now_playing(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, event)| match event {
                QueueEvent::NowPlaying { song } => Some(song.title().to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, event)| match event {
                QueueEvent::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, guild_id: GuildId, event: QueueEvent) {
        self.events.lock().push((guild_id, event));
    }
}
