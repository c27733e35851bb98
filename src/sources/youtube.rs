use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::sync::{Arc, LazyLock};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{ResolutionError, Song, SongResolver, VideoMetadata, VideoProvider};
use crate::cache::MusicCache;

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?(.*&)?v=|embed/|v/|shorts/)|youtu\.be/|music\.youtube\.com/watch\?)",
    )
    .expect("regex de YouTube válida")
});

/// Verifica si una URL es válida para YouTube
pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_URL.is_match(url)
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl YtDlpInfo {
    fn into_metadata(self) -> VideoMetadata {
        // En modo --flat-playlist yt-dlp no siempre incluye webpage_url
        let url = self
            .webpage_url
            .or(self.url)
            .or_else(|| self.id.map(|id| format!("https://www.youtube.com/watch?v={}", id)))
            .unwrap_or_default();

        VideoMetadata {
            title: self.title,
            url,
            duration: self.duration,
            thumbnail: self.thumbnail,
        }
    }
}

/// Cliente de búsqueda y metadata basado en yt-dlp
pub struct YtDlpClient {
    binary: String,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

impl YtDlpClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(3),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ResolutionError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolutionError::provider("yt-dlp", e))?;

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| ResolutionError::provider("yt-dlp", format!("no se pudo ejecutar: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolutionError::provider("yt-dlp", error.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VideoProvider for YtDlpClient {
    async fn search_top(&self, query: &str) -> Result<Option<VideoMetadata>, ResolutionError> {
        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch1:{}", query);
        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                &search_query,
            ])
            .await?;

        Ok(stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
            .map(YtDlpInfo::into_metadata)
            .next())
    }

    async fn metadata(&self, url: &str) -> Result<VideoMetadata, ResolutionError> {
        debug!("📊 Obteniendo info de: {}", url);

        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--skip-download", "--no-warnings", url])
            .await?;

        let info: YtDlpInfo = serde_json::from_str(stdout.trim())
            .map_err(|e| ResolutionError::provider("yt-dlp", format!("respuesta inválida: {}", e)))?;

        Ok(info.into_metadata())
    }
}

/// Direct YouTube links: metadata for exactly that video, no search.
pub struct YouTubeLink {
    provider: Arc<dyn VideoProvider>,
    cache: Option<MusicCache>,
}

impl YouTubeLink {
    pub fn new(provider: Arc<dyn VideoProvider>) -> Self {
        Self {
            provider,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: MusicCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[async_trait]
impl SongResolver for YouTubeLink {
    fn matches(&self, query: &str) -> bool {
        is_youtube_url(query)
    }

    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Song, ResolutionError> {
        let key = query.to_string();
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            debug!("💾 Metadata en caché para {}", query);
            return cached.into_song(requested_by);
        }

        let metadata = self.provider.metadata(query).await?;
        if let Some(cache) = &self.cache {
            cache.insert(key, metadata.clone());
        }

        metadata.into_song(requested_by)
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}

/// Catch-all strategy: top-1 search, then canonical metadata of the hit.
#[derive(Clone)]
pub struct YouTubeSearch {
    provider: Arc<dyn VideoProvider>,
}

impl YouTubeSearch {
    pub fn new(provider: Arc<dyn VideoProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl SongResolver for YouTubeSearch {
    fn matches(&self, _query: &str) -> bool {
        true
    }

    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Song, ResolutionError> {
        let hit = self
            .provider
            .search_top(query)
            .await?
            .ok_or_else(|| ResolutionError::NoMatches(query.to_string()))?;

        if hit.url.is_empty() {
            return Err(ResolutionError::MissingSourceUrl);
        }

        self.provider.metadata(&hit.url).await?.into_song(requested_by)
    }

    fn source_name(&self) -> &'static str {
        "YouTube Search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockVideoProvider;
    use mockall::predicate::eq;

    #[test]
    fn test_youtube_url_detection() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://music.youtube.com/watch?v=test"));
        assert!(is_youtube_url("https://www.youtube.com/shorts/abc123"));
        assert!(is_youtube_url("https://www.youtube.com/watch?feature=share&v=abc"));
        assert!(is_youtube_url("youtube.com/embed/abc"));
        assert!(!is_youtube_url("https://example.com/video"));
        assert!(!is_youtube_url("never gonna give you up"));
        assert!(!is_youtube_url("https://open.spotify.com/track/abc"));
    }

    #[test]
    fn test_flat_search_entry_builds_watch_url() {
        let info: YtDlpInfo =
            serde_json::from_str(r#"{"id":"abc123","title":"Song","duration":61.0}"#).unwrap();
        let meta = info.into_metadata();

        assert_eq!(meta.url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(meta.duration, Some(61.0));
    }

    #[test]
    fn test_webpage_url_is_preferred() {
        let info: YtDlpInfo = serde_json::from_str(
            r#"{"id":"x","title":"T","webpage_url":"https://www.youtube.com/watch?v=x","url":"https://rr1.googlevideo.com/x"}"#,
        )
        .unwrap();

        assert_eq!(info.into_metadata().url, "https://www.youtube.com/watch?v=x");
    }

    #[tokio::test]
    async fn test_link_metadata_is_cached() {
        let url = "https://youtu.be/abc";
        let mut video = MockVideoProvider::new();
        video.expect_metadata().with(eq(url)).times(1).returning(|url| {
            Ok(VideoMetadata {
                title: Some("Cached".into()),
                url: url.to_string(),
                duration: Some(90.0),
                thumbnail: Some("https://i.ytimg.com/x.jpg".into()),
            })
        });

        let link = YouTubeLink::new(Arc::new(video)).with_cache(MusicCache::new(10, None));
        let first = link.resolve(url, UserId::new(1)).await.unwrap();
        let second = link.resolve(url, UserId::new(2)).await.unwrap();

        assert_eq!(first.title(), second.title());
        assert_eq!(second.duration(), "1:30");
        assert_eq!(second.thumbnail_url(), "https://i.ytimg.com/x.jpg");
        assert_eq!(second.requested_by(), UserId::new(2));
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let mut video = MockVideoProvider::new();
        video
            .expect_metadata()
            .returning(|_| Err(ResolutionError::provider("yt-dlp", "Video unavailable")));

        let link = YouTubeLink::new(Arc::new(video));
        let result = link.resolve("https://youtu.be/gone", UserId::new(1)).await;

        assert!(matches!(result, Err(ResolutionError::Provider { .. })));
    }
}
