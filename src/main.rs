use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use guild_jukebox::{
    audio::{
        engine::EngineDeps, jukebox::Jukebox, stream::YtDlpStreamProvider,
        voice::SongbirdConnector,
    },
    bot::{events::DiscordNotifier, JukeboxBot},
    cache::MusicCache,
    config::Config,
    sources::{
        spotify::{SpotifyClient, TrackCatalog},
        youtube::YtDlpClient,
        ResolverChain,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        let ytdlp = std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string());
        return health_check(&ytdlp).await;
    }

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    // Inicializar caché
    let cache = MusicCache::new(config.cache_size, config.cache_ttl());

    // Resolución: Spotify (opcional) → enlaces de YouTube → búsqueda
    let catalog = config.spotify_credentials().map(|(id, secret)| {
        info!("🟢 Puente de Spotify habilitado");
        Arc::new(SpotifyClient::new(id, secret)) as Arc<dyn TrackCatalog>
    });
    let resolver = ResolverChain::standard(
        Arc::new(YtDlpClient::new(config.ytdlp_path.clone())),
        catalog,
        cache.clone(),
        config.resolve_timeout(),
    );

    // Voz y notificaciones
    let songbird = Songbird::serenity();
    let notifier = Arc::new(DiscordNotifier::new(Arc::new(Http::new(&config.discord_token))));
    let deps = EngineDeps {
        voice: Arc::new(SongbirdConnector::new(songbird.clone(), config.default_volume)),
        streams: Arc::new(YtDlpStreamProvider::new(config.ytdlp_path.clone())),
        notifier: notifier.clone(),
        config: config.engine(),
    };
    let jukebox = Arc::new(Jukebox::new(resolver, deps));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = JukeboxBot::new(config.clone(), jukebox.clone(), notifier, cache);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        jukebox.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(ytdlp: &str) -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new(ytdlp)
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
