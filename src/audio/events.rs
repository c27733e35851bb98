use serenity::model::id::GuildId;
use tracing::{debug, info, warn};

use crate::sources::Song;

/// Notificaciones que el motor emite hacia la capa de comandos
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    AddedToQueue { song: Song, position: usize },
    NowPlaying { song: Song },
    Error { message: String },
}

/// Sink for queue notifications.
///
/// Called from inside a guild's actor, so implementations must not block;
/// anything slow (Discord HTTP) belongs on a spawned task.
pub trait Notifier: Send + Sync {
    fn notify(&self, guild_id: GuildId, event: QueueEvent);
}

/// Notifier que solo escribe en el log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, guild_id: GuildId, event: QueueEvent) {
        match event {
            QueueEvent::AddedToQueue { song, position } => {
                debug!("➕ [{}] {} en posición {}", guild_id, song.title(), position)
            }
            QueueEvent::NowPlaying { song } => info!("🎵 [{}] Reproduciendo: {}", guild_id, song.title()),
            QueueEvent::Error { message } => warn!("⚠️ [{}] {}", guild_id, message),
        }
    }
}
