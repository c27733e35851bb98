//! # Sources Module
//!
//! Turns whatever a user typed after `/play` into a canonical, playable [`Song`].
//!
//! Resolution is an ordered list of strategies, all implementing [`SongResolver`].
//! The first strategy whose [`SongResolver::matches`] accepts the query wins:
//!
//! 1. [`spotify::SpotifyBridge`] - Spotify track links are translated into a
//!    `"<name> <artist>"` search and handed to the YouTube search strategy
//! 2. [`youtube::YouTubeLink`] - direct YouTube links, metadata fetched as-is
//! 3. [`youtube::YouTubeSearch`] - everything else, top-1 search
//!
//! Errors are returned as [`ResolutionError`] values; nothing in this module
//! panics into the command layer.

pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::MusicCache;
use spotify::{SpotifyBridge, TrackCatalog};
use youtube::{YouTubeLink, YouTubeSearch};

/// Title used when the provider returns no usable title.
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Duration shown when the provider has no numeric duration.
pub const UNKNOWN_DURATION: &str = "Unknown";

/// Errores de resolución de canciones
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("No se encontraron resultados para: {0}")]
    NoMatches(String),

    #[error("El enlace no apunta a una única canción: {0}")]
    UnsupportedLink(String),

    #[error("La integración con {0} no está configurada")]
    BridgeUnavailable(&'static str),

    #[error("Error del proveedor {provider}: {details}")]
    Provider {
        provider: &'static str,
        details: String,
    },

    #[error("La búsqueda tardó más de {0:?}")]
    Timeout(Duration),

    #[error("El resultado no tiene una URL reproducible")]
    MissingSourceUrl,
}

impl ResolutionError {
    pub fn provider(provider: &'static str, details: impl ToString) -> Self {
        Self::Provider {
            provider,
            details: details.to_string(),
        }
    }
}

/// A resolved, playable track.
///
/// Immutable once built; the queue owns it until it has been played or
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    title: String,
    source_url: String,
    duration: String,
    thumbnail_url: String,
    requested_by: UserId,
}

impl Song {
    pub fn new(
        title: impl Into<String>,
        source_url: impl Into<String>,
        duration: impl Into<String>,
        thumbnail_url: impl Into<String>,
        requested_by: UserId,
    ) -> Self {
        let title = title.into();
        Self {
            title: if title.trim().is_empty() {
                UNKNOWN_TITLE.to_string()
            } else {
                title
            },
            source_url: source_url.into(),
            duration: duration.into(),
            thumbnail_url: thumbnail_url.into(),
            requested_by,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn source_url(&self) -> &str {
        &self.source_url
    }
    pub fn duration(&self) -> &str {
        &self.duration
    }
    pub fn thumbnail_url(&self) -> &str {
        &self.thumbnail_url
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
}

/// Formats a duration in seconds as `H:MM:SS`, dropping the hour segment
/// when it is zero. Anything that is not a finite, non-negative number
/// yields [`UNKNOWN_DURATION`].
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite() && *s >= 0.0) else {
        return UNKNOWN_DURATION.to_string();
    };

    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Metadata de un video tal como la devuelve el proveedor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub url: String,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
}

impl VideoMetadata {
    /// Convierte la metadata en una canción; sin URL no hay canción
    pub fn into_song(self, requested_by: UserId) -> Result<Song, ResolutionError> {
        if self.url.trim().is_empty() {
            return Err(ResolutionError::MissingSourceUrl);
        }

        Ok(Song::new(
            self.title.unwrap_or_default(),
            self.url,
            format_duration(self.duration),
            self.thumbnail.unwrap_or_default(),
            requested_by,
        ))
    }
}

/// Backend de búsqueda y metadata de video (yt-dlp en producción)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Busca y devuelve solo el primer resultado
    async fn search_top(&self, query: &str) -> Result<Option<VideoMetadata>, ResolutionError>;

    /// Metadata canónica de una URL concreta
    async fn metadata(&self, url: &str) -> Result<VideoMetadata, ResolutionError>;
}

/// A single resolution strategy.
#[async_trait]
pub trait SongResolver: Send + Sync {
    /// Whether this strategy handles the query.
    fn matches(&self, query: &str) -> bool;

    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Song, ResolutionError>;

    fn source_name(&self) -> &'static str;
}

/// Lista ordenada de estrategias; gana la primera que acepta la consulta
pub struct ResolverChain {
    strategies: Vec<Box<dyn SongResolver>>,
    timeout: Duration,
}

impl ResolverChain {
    pub fn new(timeout: Duration) -> Self {
        Self {
            strategies: Vec::new(),
            timeout,
        }
    }

    pub fn with(mut self, strategy: impl SongResolver + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Spotify bridge, then YouTube links, then YouTube search.
    pub fn standard(
        video: Arc<dyn VideoProvider>,
        catalog: Option<Arc<dyn TrackCatalog>>,
        cache: MusicCache,
        timeout: Duration,
    ) -> Self {
        let search = YouTubeSearch::new(video.clone());

        Self::new(timeout)
            .with(SpotifyBridge::new(catalog, search.clone()))
            .with(YouTubeLink::new(video).with_cache(cache))
            .with(search)
    }

    /// Resuelve una consulta libre a una canción
    pub async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Song, ResolutionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolutionError::NoMatches(String::new()));
        }

        let strategy = self
            .strategies
            .iter()
            .find(|s| s.matches(query))
            .ok_or_else(|| ResolutionError::NoMatches(query.to_string()))?;

        debug!("🔎 Resolviendo '{}' con {}", query, strategy.source_name());

        let song = tokio::time::timeout(self.timeout, strategy.resolve(query, requested_by))
            .await
            .map_err(|_| ResolutionError::Timeout(self.timeout))?;

        match &song {
            Ok(song) => info!("✅ Resuelto: {} ({})", song.title(), song.source_url()),
            Err(e) => warn!("❌ No se pudo resolver '{}': {}", query, e),
        }

        song
    }
}
