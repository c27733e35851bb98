use serenity::model::id::GuildId;
use std::collections::VecDeque;
use tracing::info;

use super::error::EngineError;
use crate::sources::Song;

/// How many songs a queue listing shows before summarising the rest.
pub const PEEK_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Per-guild queue state.
///
/// `songs[0]` is the song bound to the player whenever the state is
/// `Playing` or `Paused`; while `Idle` no song is bound.
#[derive(Debug)]
pub struct GuildQueue {
    guild_id: GuildId,
    songs: VecDeque<Song>,
    state: PlaybackState,
    max_size: usize,
    consecutive_failures: u32,
}

impl GuildQueue {
    pub fn new(guild_id: GuildId, max_size: usize) -> Self {
        Self {
            guild_id,
            songs: VecDeque::new(),
            state: PlaybackState::Idle,
            max_size,
            consecutive_failures: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Agrega una canción al final; devuelve su posición (1 = cabeza)
    pub fn push(&mut self, song: Song) -> Result<usize, EngineError> {
        if self.songs.len() >= self.max_size {
            return Err(EngineError::QueueFull(self.max_size));
        }

        info!("➕ Agregado a la cola: {}", song.title());
        self.songs.push_back(song);
        Ok(self.songs.len())
    }

    pub fn head(&self) -> Option<&Song> {
        self.songs.front()
    }

    pub fn pop_head(&mut self) -> Option<Song> {
        self.songs.pop_front()
    }

    /// Limpia la cola
    pub fn clear(&mut self) -> usize {
        let cleared = self.songs.len();
        self.songs.clear();
        if cleared > 0 {
            info!("🗑️ Cola limpiada: {} canciones", cleared);
        }
        cleared
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn set_state(&mut self, state: PlaybackState) {
        debug_assert!(
            state == PlaybackState::Idle || !self.songs.is_empty(),
            "Playing/Paused con la cola vacía"
        );
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state != PlaybackState::Idle
    }

    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            state: self.state,
            now_playing: if self.is_active() {
                self.songs.front().cloned()
            } else {
                None
            },
            songs: self.songs.iter().take(PEEK_LIMIT).cloned().collect(),
            remaining: self.songs.len().saturating_sub(PEEK_LIMIT),
        }
    }
}

/// Read-only view of a guild queue for the command layer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub state: PlaybackState,
    pub now_playing: Option<Song>,
    /// First [`PEEK_LIMIT`] songs, head included.
    pub songs: Vec<Song>,
    /// Songs beyond the ones listed in `songs`.
    pub remaining: usize,
}

impl QueueSnapshot {
    pub fn empty() -> Self {
        Self {
            state: PlaybackState::Idle,
            now_playing: None,
            songs: Vec::new(),
            remaining: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.songs.len() + self.remaining
    }
}
