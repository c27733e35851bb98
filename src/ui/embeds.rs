use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{error::EngineError, jukebox::Enqueued, queue::{PlaybackState, QueueSnapshot}},
    sources::Song,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Menciona al usuario que pidió la canción
pub fn requester_mention(song: &Song) -> String {
    format!("<@{}>", song.requested_by())
}

fn song_fields(mut embed: CreateEmbed, song: &Song) -> CreateEmbed {
    embed = embed
        .field("⏱️ Duración", song.duration(), true)
        .field("👤 Solicitado por", requester_mention(song), true);

    if !song.thumbnail_url().is_empty() {
        embed = embed.thumbnail(song.thumbnail_url());
    }

    embed.url(song.source_url())
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(song: &Song) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", song.title()))
        .color(colors::SUCCESS_GREEN);

    song_fields(embed, song)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(enqueued: &Enqueued) -> CreateEmbed {
    let song = &enqueued.song;
    let embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!(
            "**{}** se ha agregado a la cola de reproducción",
            song.title()
        ))
        .color(colors::MUSIC_PURPLE)
        .field("📍 Posición", position_label(enqueued.position), true);

    let footer = if enqueued.position == 1 {
        "🎵 Empieza a sonar enseguida"
    } else {
        "🎵 Se reproducirá automáticamente cuando le toque"
    };

    song_fields(embed, song)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(footer))
}

fn position_label(position: usize) -> String {
    if position == 1 {
        "Sonando".to_string()
    } else {
        format!("#{}", position)
    }
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.total() == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    // Canción actual
    if let Some(current) = &snapshot.now_playing {
        let status = match snapshot.state {
            PlaybackState::Paused => "⏸️ En pausa",
            _ => "▶️ Reproduciendo",
        };
        embed = embed.field(
            status,
            format!("**{}** `[{}]` • {}", current.title(), current.duration(), requester_mention(current)),
            false,
        );
    }

    // Próximas canciones
    let upcoming = queue_lines(snapshot);
    if !upcoming.is_empty() {
        embed = embed.field("Próximas canciones", upcoming, false);
    }

    let mut info = format!("**Total:** {} canciones", snapshot.total());
    if snapshot.remaining > 0 {
        info.push_str(&format!(" • y {} más", snapshot.remaining));
    }

    embed
        .field("Información", info, false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Lista numerada de la cola sin la canción que suena
fn queue_lines(snapshot: &QueueSnapshot) -> String {
    let skip = usize::from(snapshot.now_playing.is_some());

    snapshot
        .songs
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, song)| format!("**{}**. {} `[{}]`\n", i + 1, song.title(), song.duration()))
        .collect()
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de advertencia para errores esperables del usuario
pub fn create_warning_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .description(format!("⚠️ {}", description))
        .color(colors::WARNING_ORANGE)
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Convierte un error del motor en el embed que ve el usuario
pub fn create_engine_error_embed(error: &EngineError) -> CreateEmbed {
    match error {
        EngineError::NothingPlaying
        | EngineError::AlreadyPaused
        | EngineError::NotInVoiceChannel
        | EngineError::QueueFull(_) => create_warning_embed(&error.to_string()),
        EngineError::Resolution(e) => create_error_embed("No se pudo encontrar la canción", &e.to_string()),
        _ => create_error_embed("Error", &error.to_string()),
    }
}
