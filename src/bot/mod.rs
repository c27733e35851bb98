//! # Bot Module
//!
//! Discord glue for Guild Jukebox.
//!
//! This module contains:
//! - Slash command registration ([`commands`]) and dispatch ([`handlers`])
//! - The Discord notifier that posts queue events ([`events`])
//! - Event handling (ready, interactions, voice state updates)
//! - Background maintenance tasks
//!
//! The bot is built around [`JukeboxBot`], which implements Serenity's
//! [`EventHandler`] trait and forwards every queue operation to the
//! [`Jukebox`].

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{audio::jukebox::Jukebox, cache::MusicCache, config::Config};
use events::DiscordNotifier;

/// Main Discord event handler.
pub struct JukeboxBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    /// Resolver + per-guild queues
    pub jukebox: Arc<Jukebox>,
    /// Remembers the text channel to post queue events into
    pub notifier: Arc<DiscordNotifier>,
    /// Metadata cache shared with the link resolver
    cache: MusicCache,
}

impl JukeboxBot {
    pub fn new(
        config: Arc<Config>,
        jukebox: Arc<Jukebox>,
        notifier: Arc<DiscordNotifier>,
        cache: MusicCache,
    ) -> Self {
        Self {
            config,
            jukebox,
            notifier,
            cache,
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands (when `GUILD_ID` is set) propagate in about a second;
    /// global commands can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                let guild_id = GuildId::new(guild_id);

                // Verificar que el bot esté en la guild
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        let cache = self.cache.clone();
        tokio::spawn(async move {
            maintenance_tasks(cache).await;
        });
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Si alguien desconecta al bot del canal de voz, la cola del guild se elimina.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                // El caché ya refleja una entrada posterior: el aviso es de una salida vieja
                let rejoined = guild_id
                    .to_guild_cached(&ctx.cache)
                    .and_then(|guild| guild.voice_states.get(&current_user_id).and_then(|s| s.channel_id))
                    .is_some();
                if rejoined {
                    debug!("[{}] Ignorando desconexión atrasada", guild_id);
                    return;
                }

                info!("🔌 Bot desconectado en guild {}", guild_id);
                self.jukebox.voice_disconnected(guild_id).await;
            }
        }
    }
}

/// Limpieza periódica del caché de metadatos (cada hora)
async fn maintenance_tasks(cache: MusicCache) {
    let mut interval = tokio::time::interval(Duration::from_secs(3600));
    // El primer tick es inmediato
    interval.tick().await;

    loop {
        interval.tick().await;
        cache.cleanup_old_entries();
        info!("🧹 Tareas de mantenimiento completadas");
    }
}
