use serenity::model::id::{ChannelId, GuildId, UserId};
use tracing::{info, warn};

use super::{
    engine::{EngineDeps, GuildHandle},
    error::EngineError,
    queue::QueueSnapshot,
    registry::GuildQueueRegistry,
};
use crate::sources::{ResolverChain, Song};

/// Result of a successful `/play`.
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueued {
    pub song: Song,
    pub position: usize,
}

/// Entry point for the command layer: resolves requests and routes queue
/// operations to the right guild.
pub struct Jukebox {
    resolver: ResolverChain,
    registry: GuildQueueRegistry,
}

impl Jukebox {
    pub fn new(resolver: ResolverChain, deps: EngineDeps) -> Self {
        Self {
            resolver,
            registry: GuildQueueRegistry::new(deps),
        }
    }

    pub fn registry(&self) -> &GuildQueueRegistry {
        &self.registry
    }

    /// Resuelve `query` y la agrega a la cola del guild.
    ///
    /// `voice_channel` es el canal de voz del usuario; sin él no se
    /// resuelve nada.
    pub async fn play(
        &self,
        guild_id: GuildId,
        voice_channel: Option<ChannelId>,
        requested_by: UserId,
        query: &str,
    ) -> Result<Enqueued, EngineError> {
        let channel_id = voice_channel.ok_or(EngineError::NotInVoiceChannel)?;
        let song = self.resolver.resolve(query, requested_by).await?;

        let handle = self.registry.get_or_create(guild_id, channel_id);
        let position = match handle.enqueue(song.clone()).await {
            // La cola se cerró entre la búsqueda y el envío: una sola vez más
            Err(EngineError::QueueClosed) => {
                warn!("🔄 Cola de guild {} cerrada, recreando", guild_id);
                self.registry
                    .get_or_create(guild_id, channel_id)
                    .enqueue(song.clone())
                    .await?
            }
            result => result?,
        };

        Ok(Enqueued { song, position })
    }

    pub async fn skip(&self, guild_id: GuildId) -> Result<Song, EngineError> {
        self.existing(guild_id)?.skip().await
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.existing(guild_id)?.pause().await
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.existing(guild_id)?.resume().await
    }

    /// Limpia la cola y sale del canal de voz
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), EngineError> {
        if self.registry.remove(guild_id).await {
            Ok(())
        } else {
            Err(EngineError::NothingPlaying)
        }
    }

    pub async fn peek_queue(&self, guild_id: GuildId) -> QueueSnapshot {
        match self.registry.get(guild_id) {
            Some(handle) => handle.snapshot().await.unwrap_or_else(|_| QueueSnapshot::empty()),
            None => QueueSnapshot::empty(),
        }
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<Song> {
        self.peek_queue(guild_id).await.now_playing
    }

    /// El bot fue desconectado del canal de voz desde fuera.
    ///
    /// Solo afecta a una cola que ya estaba conectada: una que se está
    /// uniendo recibe a lo sumo el aviso atrasado de una salida anterior.
    pub async fn voice_disconnected(&self, guild_id: GuildId) {
        if self.registry.remove_connected(guild_id).await {
            info!("🔌 Bot desconectado de la voz en guild {}, cola eliminada", guild_id);
        }
    }

    pub async fn shutdown(&self) {
        info!("🛑 Cerrando {} colas activas", self.registry.len());
        self.registry.shutdown_all().await;
    }

    fn existing(&self, guild_id: GuildId) -> Result<GuildHandle, EngineError> {
        self.registry.get(guild_id).ok_or(EngineError::NothingPlaying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            queue::PlaybackState,
            testing::{FakeStreams, FakeVoice, RecordingNotifier},
        },
        cache::MusicCache,
        config::EngineConfig,
        sources::{MockVideoProvider, ResolutionError, VideoMetadata},
    };
    use pretty_assertions::assert_eq;
    use std::{sync::Arc, time::Duration};

    fn guild() -> GuildId {
        GuildId::new(5)
    }

    fn user() -> UserId {
        UserId::new(500)
    }

    fn voice_channel() -> Option<ChannelId> {
        Some(ChannelId::new(50))
    }

    fn jukebox(voice: &FakeVoice, provider: MockVideoProvider) -> (Jukebox, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let resolver = ResolverChain::standard(
            Arc::new(provider),
            None,
            MusicCache::new(10, None),
            Duration::from_secs(5),
        );
        let deps = EngineDeps {
            voice: Arc::new(voice.clone()),
            streams: Arc::new(FakeStreams::default()),
            notifier: notifier.clone(),
            config: EngineConfig::default(),
        };
        (Jukebox::new(resolver, deps), notifier)
    }

    fn searching_provider() -> MockVideoProvider {
        let mut provider = MockVideoProvider::new();
        provider.expect_search_top().returning(|query| {
            Ok(Some(VideoMetadata {
                title: Some(query.to_string()),
                url: format!("https://www.youtube.com/watch?v={}", query.replace(' ', "_")),
                ..VideoMetadata::default()
            }))
        });
        provider.expect_metadata().returning(|url| {
            Ok(VideoMetadata {
                title: Some(url.rsplit('=').next().unwrap_or_default().replace('_', " ")),
                url: url.to_string(),
                duration: Some(225.0),
                thumbnail: None,
            })
        });
        provider
    }

    #[tokio::test]
    async fn test_play_requires_voice_channel() {
        let voice = FakeVoice::default();
        let (jukebox, _) = jukebox(&voice, MockVideoProvider::new());

        let result = jukebox.play(guild(), None, user(), "never gonna give you up").await;

        assert!(matches!(result, Err(EngineError::NotInVoiceChannel)));
        assert_eq!(voice.joins(), 0);
    }

    #[tokio::test]
    async fn test_play_resolves_and_enqueues() {
        let voice = FakeVoice::default();
        let (jukebox, notifier) = jukebox(&voice, searching_provider());

        let first = jukebox.play(guild(), voice_channel(), user(), "lofi beats").await.unwrap();
        let second = jukebox.play(guild(), voice_channel(), user(), "synthwave").await.unwrap();

        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);
        assert_eq!(first.song.title(), "lofi beats");
        assert_eq!(first.song.duration(), "3:45");
        assert_eq!(first.song.requested_by(), user());

        let snapshot = jukebox.peek_queue(guild()).await;
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.total(), 2);
        assert_eq!(jukebox.now_playing(guild()).await, Some(first.song));
        assert_eq!(notifier.now_playing(), vec!["lofi beats".to_string()]);
    }

    #[tokio::test]
    async fn test_resolution_failure_leaves_no_queue() {
        let mut provider = MockVideoProvider::new();
        provider.expect_search_top().returning(|_| Ok(None));
        let voice = FakeVoice::default();
        let (jukebox, _) = jukebox(&voice, provider);

        let result = jukebox.play(guild(), voice_channel(), user(), "asdfghjkl").await;

        assert!(matches!(
            result,
            Err(EngineError::Resolution(ResolutionError::NoMatches(_)))
        ));
        assert!(jukebox.registry().is_empty());
        assert_eq!(voice.joins(), 0);
    }

    #[tokio::test]
    async fn test_commands_without_queue() {
        let (jukebox, _) = jukebox(&FakeVoice::default(), MockVideoProvider::new());

        assert!(matches!(jukebox.skip(guild()).await, Err(EngineError::NothingPlaying)));
        assert!(matches!(jukebox.pause(guild()).await, Err(EngineError::NothingPlaying)));
        assert!(matches!(jukebox.stop(guild()).await, Err(EngineError::NothingPlaying)));
        assert_eq!(jukebox.peek_queue(guild()).await, QueueSnapshot::empty());
        assert_eq!(jukebox.now_playing(guild()).await, None);
    }

    #[tokio::test]
    async fn test_stop_then_play_rejoins() {
        let voice = FakeVoice::default();
        let (jukebox, _) = jukebox(&voice, searching_provider());

        jukebox.play(guild(), voice_channel(), user(), "one").await.unwrap();
        jukebox.play(guild(), voice_channel(), user(), "two").await.unwrap();
        jukebox.stop(guild()).await.unwrap();
        assert_eq!(voice.leaves(), 1);

        let again = jukebox.play(guild(), voice_channel(), user(), "three").await.unwrap();
        assert_eq!(again.position, 1);
        assert_eq!(voice.joins(), 2);
        assert_eq!(jukebox.peek_queue(guild()).await.total(), 1);
    }

    #[tokio::test]
    async fn test_forced_disconnect_drops_queue() {
        let voice = FakeVoice::default();
        let (jukebox, _) = jukebox(&voice, searching_provider());
        jukebox.play(guild(), voice_channel(), user(), "one").await.unwrap();

        jukebox.voice_disconnected(guild()).await;

        assert!(!jukebox.registry().contains(guild()));
        assert_eq!(jukebox.peek_queue(guild()).await, QueueSnapshot::empty());
    }
}
