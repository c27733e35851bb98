use dashmap::DashMap;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    audio::events::{Notifier, QueueEvent},
    ui::embeds,
};

/// Publica los eventos de la cola en el último canal de texto usado en cada guild
pub struct DiscordNotifier {
    http: Arc<Http>,
    text_channels: DashMap<GuildId, ChannelId>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            text_channels: DashMap::new(),
        }
    }

    /// Recuerda dónde se usó el último comando del guild
    pub fn remember_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.text_channels.insert(guild_id, channel_id);
    }

    fn channel_for(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.text_channels.get(&guild_id).map(|entry| *entry.value())
    }
}

/// Embed para un evento, o `None` si no se publica
fn render(event: &QueueEvent) -> Option<CreateEmbed> {
    match event {
        // La respuesta de /play ya lo muestra
        QueueEvent::AddedToQueue { .. } => None,
        QueueEvent::NowPlaying { song } => Some(embeds::create_now_playing_embed(song)),
        QueueEvent::Error { message } => Some(embeds::create_error_embed("Error de reproducción", message)),
    }
}

impl Notifier for DiscordNotifier {
    fn notify(&self, guild_id: GuildId, event: QueueEvent) {
        let Some(embed) = render(&event) else {
            debug!("[{}] {:?}", guild_id, event);
            return;
        };

        let Some(channel_id) = self.channel_for(guild_id) else {
            debug!("[{}] Sin canal de texto para notificar", guild_id);
            return;
        };

        // Enviar sin bloquear al actor del guild
        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(e) = channel_id
                .send_message(&*http, CreateMessage::new().embed(embed))
                .await
            {
                warn!("⚠️ No se pudo enviar notificación a {}: {:?}", channel_id, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Song;
    use serenity::model::id::UserId;

    fn song() -> Song {
        Song::new("Song", "https://youtu.be/x", "1:00", "", UserId::new(1))
    }

    #[test]
    fn test_added_to_queue_is_not_published() {
        assert!(render(&QueueEvent::AddedToQueue { song: song(), position: 2 }).is_none());
        assert!(render(&QueueEvent::NowPlaying { song: song() }).is_some());
        assert!(render(&QueueEvent::Error { message: "boom".into() }).is_some());
    }

    #[test]
    fn test_last_channel_wins() {
        let notifier = DiscordNotifier::new(Arc::new(Http::new("token")));
        let guild = GuildId::new(1);

        assert_eq!(notifier.channel_for(guild), None);
        notifier.remember_channel(guild, ChannelId::new(10));
        notifier.remember_channel(guild, ChannelId::new(11));
        assert_eq!(notifier.channel_for(guild), Some(ChannelId::new(11)));
    }
}
