//! Voice boundary: joining a channel, binding a stream to the player and
//! getting lifecycle signals back into the guild's inbox.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::{error::VoiceError, stream::AudioStream};

/// Lifecycle signal emitted by a player session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerSignal {
    /// El track terminó (naturalmente o porque se detuvo)
    Finished,
    /// Fallo de decodificación o de red a mitad del track
    Errored(String),
}

/// Canal de vuelta hacia el actor del guild, etiquetado con el track enlazado
#[derive(Debug, Clone)]
pub struct PlayerEvents {
    seq: u64,
    tx: mpsc::UnboundedSender<(u64, PlayerSignal)>,
}

impl PlayerEvents {
    pub(crate) fn new(seq: u64, tx: mpsc::UnboundedSender<(u64, PlayerSignal)>) -> Self {
        Self { seq, tx }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn finished(&self) {
        let _ = self.tx.send((self.seq, PlayerSignal::Finished));
    }

    pub fn errored(&self, message: impl Into<String>) {
        let _ = self.tx.send((self.seq, PlayerSignal::Errored(message.into())));
    }
}

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceSession>, VoiceError>;
}

/// A joined voice channel. Owned by exactly one guild actor.
#[async_trait]
pub trait VoiceSession: Send {
    /// Binds `stream` to the player. Signals for this track go to `events`.
    async fn play(
        &mut self,
        stream: AudioStream,
        events: PlayerEvents,
    ) -> Result<Box<dyn PlayerHandle>, VoiceError>;

    async fn leave(&mut self) -> Result<(), VoiceError>;
}

pub trait PlayerHandle: Send + Sync {
    fn pause(&self) -> Result<(), VoiceError>;
    fn resume(&self) -> Result<(), VoiceError>;
    fn stop(&self) -> Result<(), VoiceError>;
}

/// Conector de voz respaldado por Songbird
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    volume: f32,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>, volume: f32) -> Self {
        Self { manager, volume }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceSession>, VoiceError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(Box::new(SongbirdSession {
            manager: self.manager.clone(),
            guild_id,
            call,
            volume: self.volume,
        }))
    }
}

struct SongbirdSession {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    volume: f32,
}

#[async_trait]
impl VoiceSession for SongbirdSession {
    async fn play(
        &mut self,
        stream: AudioStream,
        events: PlayerEvents,
    ) -> Result<Box<dyn PlayerHandle>, VoiceError> {
        let track = {
            let mut call = self.call.lock().await;
            call.play_input(stream.input)
        };

        let _ = track.set_volume(self.volume);

        track
            .add_event(
                Event::Track(TrackEvent::End),
                TrackSignalHandler {
                    events: events.clone(),
                },
            )
            .map_err(|e| VoiceError::Control(e.to_string()))?;
        track
            .add_event(Event::Track(TrackEvent::Error), TrackSignalHandler { events })
            .map_err(|e| VoiceError::Control(e.to_string()))?;

        Ok(Box::new(SongbirdPlayer(track)))
    }

    async fn leave(&mut self) -> Result<(), VoiceError> {
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| VoiceError::Leave(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }
}

struct SongbirdPlayer(TrackHandle);

impl PlayerHandle for SongbirdPlayer {
    fn pause(&self) -> Result<(), VoiceError> {
        self.0.pause().map_err(|e| VoiceError::Control(e.to_string()))
    }

    fn resume(&self) -> Result<(), VoiceError> {
        self.0.play().map_err(|e| VoiceError::Control(e.to_string()))
    }

    fn stop(&self) -> Result<(), VoiceError> {
        self.0.stop().map_err(|e| VoiceError::Control(e.to_string()))
    }
}

/// Reenvía End/Error de Songbird al inbox del guild
struct TrackSignalHandler {
    events: PlayerEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackSignalHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in tracks.iter() {
                match &state.playing {
                    PlayMode::Errored(e) => {
                        self.events.errored(format!("{:?}", e));
                        return None;
                    }
                    PlayMode::End | PlayMode::Stop => {
                        debug!("Track terminado (seq {})", self.events.seq());
                        self.events.finished();
                        return None;
                    }
                    _ => {}
                }
            }
        }

        None
    }
}
