use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::engine::{self, EngineDeps, GuildHandle};

pub(crate) type QueueMap = DashMap<GuildId, GuildHandle>;

/// Owns the guild → actor mapping.
///
/// Creation and removal go through the map's entry API, so two commands
/// racing for a guild without a queue end up sharing one actor and one
/// voice join. A guild's entry stays in the map until its actor has left
/// voice; an actor created to replace it waits for that before joining.
pub struct GuildQueueRegistry {
    queues: Arc<QueueMap>,
    deps: EngineDeps,
    next_generation: AtomicU64,
}

impl GuildQueueRegistry {
    pub fn new(deps: EngineDeps) -> Self {
        Self {
            queues: Arc::new(DashMap::new()),
            deps,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Devuelve la cola del guild, creándola (y uniéndose a `channel_id`) si no existe
    pub fn get_or_create(&self, guild_id: GuildId, channel_id: ChannelId) -> GuildHandle {
        match self.queues.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    let previous = entry.get().released();
                    let handle = self.spawn(guild_id, channel_id, Some(previous));
                    entry.insert(handle.clone());
                    handle
                } else {
                    entry.get().clone()
                }
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn(guild_id, channel_id, None);
                entry.insert(handle.clone());
                handle
            }
        }
    }

    fn spawn(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        previous: Option<CancellationToken>,
    ) -> GuildHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        info!("🆕 Creando cola para guild {} (generación {})", guild_id, generation);
        engine::spawn(
            guild_id,
            channel_id,
            generation,
            previous,
            self.deps.clone(),
            self.queues.clone(),
        )
    }

    pub fn get(&self, guild_id: GuildId) -> Option<GuildHandle> {
        self.queues
            .get(&guild_id)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Quita la cola y espera a que el actor suelte la sesión de voz
    pub async fn remove(&self, guild_id: GuildId) -> bool {
        match self.get(guild_id) {
            Some(handle) => {
                self.retire(handle).await;
                true
            }
            None => false,
        }
    }

    /// Como [`remove`](Self::remove), pero solo si el actor ya estaba en el
    /// canal de voz. Una cola que todavía se está uniendo no puede haber
    /// sido desconectada.
    pub async fn remove_connected(&self, guild_id: GuildId) -> bool {
        match self.get(guild_id) {
            Some(handle) if handle.is_connected() => {
                self.retire(handle).await;
                true
            }
            _ => false,
        }
    }

    /// La entrada sigue ocupada (cerrada) hasta que el actor sale de la voz
    async fn retire(&self, handle: GuildHandle) {
        let guild_id = handle.guild_id();
        let generation = handle.generation();

        handle.shutdown().await;
        self.queues
            .remove_if(&guild_id, |_, current| current.generation() == generation);
        info!("🗑️ Cola del guild {} eliminada", guild_id);
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.get(guild_id).is_some()
    }

    /// Colas abiertas; las que se están cerrando no cuentan
    pub fn len(&self) -> usize {
        self.queues
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn shutdown_all(&self) {
        let handles: Vec<GuildHandle> = self
            .queues
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for handle in handles {
            self.retire(handle).await;
        }
    }
}
