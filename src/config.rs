use anyhow::Result;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Spotify (opcional, solo para el puente de enlaces)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Audio
    pub ytdlp_path: String,
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_consecutive_failures: u32,

    // Tiempos (en segundos)
    pub idle_disconnect_secs: u64, // 0 = nunca
    pub resolve_timeout_secs: u64,
    pub stream_open_timeout_secs: u64,

    // Caché
    pub cache_size: usize,
    pub cache_ttl_secs: u64, // 0 = sin expiración
}

/// The subset of [`Config`] the playback engine consumes.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_queue_size: usize,
    pub max_consecutive_failures: u32,
    pub idle_disconnect: Option<Duration>,
    pub stream_open_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Config::default().engine()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} inválido ({:?}): {}", key, raw, e))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: env_opt("GUILD_ID").and_then(|s| s.parse().ok()),

            // Spotify
            spotify_client_id: env_opt("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: env_opt("SPOTIFY_CLIENT_SECRET"),

            // Audio
            ytdlp_path: env_opt("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            default_volume: env_or("DEFAULT_VOLUME", "0.5")?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", "1000")?,
            max_consecutive_failures: env_or("MAX_CONSECUTIVE_FAILURES", "5")?,

            // Tiempos
            idle_disconnect_secs: env_or("IDLE_DISCONNECT_SECS", "300")?,
            resolve_timeout_secs: env_or("RESOLVE_TIMEOUT_SECS", "20")?,
            stream_open_timeout_secs: env_or("STREAM_OPEN_TIMEOUT_SECS", "30")?,

            // Caché
            cache_size: env_or("CACHE_SIZE", "100")?,
            cache_ttl_secs: env_or("CACHE_TTL_SECS", "3600")?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Queue size, failure limit and cache size must be > 0
    /// - Resolve and stream-open timeouts must be > 0
    /// - Spotify credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_consecutive_failures == 0 {
            anyhow::bail!("Max consecutive failures must be greater than 0");
        }

        if self.cache_size == 0 {
            anyhow::bail!("Cache size must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 || self.stream_open_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be greater than 0");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            max_queue_size: self.max_queue_size,
            max_consecutive_failures: self.max_consecutive_failures,
            idle_disconnect: (self.idle_disconnect_secs > 0)
                .then(|| Duration::from_secs(self.idle_disconnect_secs)),
            stream_open_timeout: Duration::from_secs(self.stream_open_timeout_secs),
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }

    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        self.spotify_client_id
            .clone()
            .zip(self.spotify_client_secret.clone())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and secrets are left out.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {} queue, {} failures max\n  \
            Timeouts: resolve {}, stream {}, idle {}\n  \
            Cache: {} entries, ttl {}\n  \
            Spotify bridge: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.max_consecutive_failures,
            humantime::format_duration(self.resolve_timeout()),
            humantime::format_duration(Duration::from_secs(self.stream_open_timeout_secs)),
            self.engine()
                .idle_disconnect
                .map_or("never".to_string(), |d| humantime::format_duration(d).to_string()),
            self.cache_size,
            self.cache_ttl()
                .map_or("none".to_string(), |d| humantime::format_duration(d).to_string()),
            if self.spotify_credentials().is_some() { "enabled" } else { "disabled" },
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            spotify_client_id: None,
            spotify_client_secret: None,

            // Audio defaults
            ytdlp_path: "yt-dlp".to_string(),
            default_volume: 0.5,
            max_queue_size: 1000,
            max_consecutive_failures: 5,

            idle_disconnect_secs: 300, // 5 minutos
            resolve_timeout_secs: 20,
            stream_open_timeout_secs: 30,

            cache_size: 100,
            cache_ttl_secs: 3600, // 1 hora
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = Config {
            default_volume: 3.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_consecutive_failures: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            spotify_client_id: Some("id".into()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_subset() {
        let config = Config {
            idle_disconnect_secs: 0,
            stream_open_timeout_secs: 12,
            ..Config::default()
        };
        let engine = config.engine();

        assert_eq!(engine.idle_disconnect, None);
        assert_eq!(engine.stream_open_timeout, Duration::from_secs(12));
        assert_eq!(engine.max_consecutive_failures, 5);
    }

    #[test]
    fn test_summary_hides_secrets() {
        let config = Config {
            discord_token: "super-secret-token".into(),
            spotify_client_id: Some("id".into()),
            spotify_client_secret: Some("spotify-secret".into()),
            ..Config::default()
        };
        let summary = config.summary();

        assert!(!summary.contains("super-secret-token"));
        assert!(!summary.contains("spotify-secret"));
        assert!(summary.contains("Spotify bridge: enabled"));
    }
}
