use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::error::EngineError,
    bot::JukeboxBot,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Las notificaciones van al canal donde se usó el último comando
    bot.notifier.remember_channel(guild_id, command.channel_id);

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        _ => {
            respond(
                ctx,
                &command,
                embeds::create_warning_embed("Comando no reconocido"),
                true,
            )
            .await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Verificar que el usuario esté en un canal de voz antes de diferir
    let voice_channel = get_user_voice_channel(ctx, guild_id, command.user.id);
    if voice_channel.is_none() {
        let error = EngineError::NotInVoiceChannel;
        return respond(ctx, command, embeds::create_engine_error_embed(&error), true).await;
    }

    // Defer la respuesta ya que la búsqueda puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let embed = match bot
        .jukebox
        .play(guild_id, voice_channel, command.user.id, query)
        .await
    {
        Ok(enqueued) => embeds::create_track_added_embed(&enqueued),
        Err(e) => {
            warn!("⚠️ /play '{}' falló en guild {}: {}", query, guild_id, e);
            embeds::create_engine_error_embed(&e)
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let reply = bot
        .jukebox
        .pause(guild_id)
        .await
        .map(|()| embeds::create_success_embed("Pausa", "⏸️ Reproducción pausada"));
    respond_result(ctx, command, reply).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let reply = bot
        .jukebox
        .resume(guild_id)
        .await
        .map(|()| embeds::create_success_embed("Reanudado", "▶️ Reproducción reanudada"));
    respond_result(ctx, command, reply).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let reply = bot.jukebox.skip(guild_id).await.map(|song| {
        embeds::create_success_embed("Saltada", &format!("⏭️ **{}**", song.title()))
    });
    respond_result(ctx, command, reply).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let reply = bot.jukebox.stop(guild_id).await.map(|()| {
        embeds::create_success_embed("Detenido", "⏹️ Reproducción detenida y cola limpiada")
    });
    respond_result(ctx, command, reply).await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let snapshot = bot.jukebox.peek_queue(guild_id).await;
    respond(ctx, command, embeds::create_queue_embed(&snapshot), false).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let reply = bot
        .jukebox
        .now_playing(guild_id)
        .await
        .map(|song| embeds::create_now_playing_embed(&song))
        .ok_or(EngineError::NothingPlaying);
    respond_result(ctx, command, reply).await
}

// Funciones auxiliares

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

/// Los errores del motor se muestran solo a quien usó el comando
async fn respond_result(
    ctx: &Context,
    command: &CommandInteraction,
    reply: Result<CreateEmbed, EngineError>,
) -> Result<()> {
    match reply {
        Ok(embed) => respond(ctx, command, embed, false).await,
        Err(e) => respond(ctx, command, embeds::create_engine_error_embed(&e), true).await,
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
