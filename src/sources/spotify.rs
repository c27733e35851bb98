use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info};
use url::Url;

use super::{youtube::YouTubeSearch, ResolutionError, Song, SongResolver};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";

/// What a Spotify link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyLink {
    Track(String),
    /// album, playlist, artist, episode...
    Other(String),
}

/// Detecta enlaces `open.spotify.com` y URIs `spotify:`
pub fn is_spotify_link(query: &str) -> bool {
    query.starts_with("spotify:")
        || Url::parse(query)
            .ok()
            .and_then(|url| url.host_str().map(|h| h == "open.spotify.com"))
            .unwrap_or(false)
}

/// Extrae el tipo e id de un enlace o URI de Spotify
pub fn parse_spotify_link(query: &str) -> Option<SpotifyLink> {
    let (kind, id) = if let Some(rest) = query.strip_prefix("spotify:") {
        let mut parts = rest.split(':');
        (parts.next()?.to_string(), parts.next()?.to_string())
    } else {
        let url = Url::parse(query).ok()?;
        if url.host_str() != Some("open.spotify.com") {
            return None;
        }
        // Los enlaces localizados llevan un prefijo "intl-xx"
        let mut segments = url
            .path_segments()?
            .filter(|s| !s.is_empty() && !s.starts_with("intl-"));
        (segments.next()?.to_string(), segments.next()?.to_string())
    };

    let id = id.split(['?', '&']).next().unwrap_or_default().to_string();
    if id.is_empty() {
        return None;
    }

    Some(if kind == "track" {
        SpotifyLink::Track(id)
    } else {
        SpotifyLink::Other(kind)
    })
}

/// Nombre y artista principal de una pista del catálogo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub name: String,
    pub artist: Option<String>,
}

impl CatalogTrack {
    /// `"<name> <artist>"`, the string handed to the video search.
    pub fn search_query(&self) -> String {
        match &self.artist {
            Some(artist) if !artist.trim().is_empty() => format!("{} {}", self.name, artist),
            _ => self.name.clone(),
        }
    }
}

/// Catálogo externo usado como puente hacia la búsqueda de video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn track(&self, track_id: &str) -> Result<CatalogTrack, ResolutionError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    name: String,
    #[serde(default)]
    artists: Vec<ArtistResponse>,
}

#[derive(Debug, Deserialize)]
struct ArtistResponse {
    name: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Cliente de la Web API de Spotify (client credentials)
pub struct SpotifyClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
            client_secret,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, ResolutionError> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|token| token.expires_at > Instant::now())
            .map(|token| token.value.clone());
        if let Some(token) = cached {
            return Ok(token);
        }

        debug!("🔑 Solicitando token de Spotify");
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ResolutionError::provider("Spotify", e))?
            .json()
            .await
            .map_err(|e| ResolutionError::provider("Spotify", e))?;

        // Renovar un poco antes de que expire
        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(30));
        *self.token.lock() = Some(AccessToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(response.access_token)
    }
}

#[async_trait]
impl TrackCatalog for SpotifyClient {
    async fn track(&self, track_id: &str) -> Result<CatalogTrack, ResolutionError> {
        let token = self.access_token().await?;

        let track: TrackResponse = self
            .client
            .get(format!("{}/tracks/{}", API_URL, track_id))
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ResolutionError::provider("Spotify", e))?
            .json()
            .await
            .map_err(|e| ResolutionError::provider("Spotify", e))?;

        Ok(CatalogTrack {
            name: track.name,
            artist: track.artists.into_iter().next().map(|a| a.name),
        })
    }
}

/// Bridging strategy: a Spotify track becomes a YouTube search for
/// `"<name> <artist>"`. Anything but a single track fails.
pub struct SpotifyBridge {
    catalog: Option<Arc<dyn TrackCatalog>>,
    search: YouTubeSearch,
}

impl SpotifyBridge {
    pub fn new(catalog: Option<Arc<dyn TrackCatalog>>, search: YouTubeSearch) -> Self {
        Self { catalog, search }
    }
}

#[async_trait]
impl SongResolver for SpotifyBridge {
    fn matches(&self, query: &str) -> bool {
        is_spotify_link(query)
    }

    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Song, ResolutionError> {
        let track_id = match parse_spotify_link(query) {
            Some(SpotifyLink::Track(id)) => id,
            _ => return Err(ResolutionError::UnsupportedLink(query.to_string())),
        };

        let catalog = self
            .catalog
            .as_ref()
            .ok_or(ResolutionError::BridgeUnavailable("Spotify"))?;

        let track = catalog.track(&track_id).await?;
        let search_query = track.search_query();
        info!("🌉 Spotify {} -> búsqueda '{}'", track_id, search_query);

        self.search.resolve(&search_query, requested_by).await
    }

    fn source_name(&self) -> &'static str {
        "Spotify"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MusicCache,
        sources::{MockVideoProvider, ResolverChain, VideoMetadata},
    };
    use mockall::predicate::eq;

    #[test]
    fn test_parse_track_links() {
        assert_eq!(
            parse_spotify_link("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            Some(SpotifyLink::Track("4uLU6hMCjMI75M1A2tKUQC".into()))
        );
        assert_eq!(
            parse_spotify_link("https://open.spotify.com/intl-es/track/4uLU6hMCjMI75M1A2tKUQC"),
            Some(SpotifyLink::Track("4uLU6hMCjMI75M1A2tKUQC".into()))
        );
        assert_eq!(
            parse_spotify_link("spotify:track:4uLU6hMCjMI75M1A2tKUQC"),
            Some(SpotifyLink::Track("4uLU6hMCjMI75M1A2tKUQC".into()))
        );
        assert_eq!(
            parse_spotify_link("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Some(SpotifyLink::Other("playlist".into()))
        );
        assert_eq!(parse_spotify_link("https://open.spotify.com/"), None);
        assert_eq!(parse_spotify_link("https://youtu.be/abc"), None);
    }

    #[test]
    fn test_search_query_synthesis() {
        let track = CatalogTrack {
            name: "Blinding Lights".into(),
            artist: Some("The Weeknd".into()),
        };
        assert_eq!(track.search_query(), "Blinding Lights The Weeknd");

        let solo = CatalogTrack {
            name: "Untitled".into(),
            artist: None,
        };
        assert_eq!(solo.search_query(), "Untitled");
    }

    fn chain(video: MockVideoProvider, catalog: Option<MockTrackCatalog>) -> ResolverChain {
        ResolverChain::standard(
            Arc::new(video),
            catalog.map(|c| Arc::new(c) as Arc<dyn TrackCatalog>),
            MusicCache::new(10, None),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_bridge_then_search() {
        let mut catalog = MockTrackCatalog::new();
        catalog
            .expect_track()
            .with(eq("4uLU6hMCjMI75M1A2tKUQC"))
            .times(1)
            .returning(|_| {
                Ok(CatalogTrack {
                    name: "Blinding Lights".into(),
                    artist: Some("The Weeknd".into()),
                })
            });

        let mut video = MockVideoProvider::new();
        video
            .expect_search_top()
            .with(eq("Blinding Lights The Weeknd"))
            .times(1)
            .returning(|_| {
                Ok(Some(VideoMetadata {
                    url: "https://www.youtube.com/watch?v=4NRXx6U8ABQ".into(),
                    ..Default::default()
                }))
            });
        video.expect_metadata().times(1).returning(|url| {
            Ok(VideoMetadata {
                title: Some("The Weeknd - Blinding Lights".into()),
                url: url.to_string(),
                duration: Some(263.0),
                thumbnail: None,
            })
        });

        let song = chain(video, Some(catalog))
            .resolve("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC", UserId::new(3))
            .await
            .unwrap();

        assert_eq!(song.title(), "The Weeknd - Blinding Lights");
        assert_eq!(song.source_url(), "https://www.youtube.com/watch?v=4NRXx6U8ABQ");
        assert_eq!(song.duration(), "4:23");
    }

    #[tokio::test]
    async fn test_bridge_wins_over_generic_link_patterns() {
        // Contiene "youtube.com/watch?v=" en la query, pero es un enlace de Spotify
        let query = "https://open.spotify.com/track/abc?ref=youtube.com/watch?v=zzz";
        let mut catalog = MockTrackCatalog::new();
        catalog.expect_track().times(1).returning(|_| {
            Ok(CatalogTrack {
                name: "Song".into(),
                artist: Some("Artist".into()),
            })
        });

        let mut video = MockVideoProvider::new();
        video
            .expect_search_top()
            .with(eq("Song Artist"))
            .times(1)
            .returning(|_| {
                Ok(Some(VideoMetadata {
                    url: "https://www.youtube.com/watch?v=x".into(),
                    ..Default::default()
                }))
            });
        video
            .expect_metadata()
            .with(eq("https://www.youtube.com/watch?v=x"))
            .times(1)
            .returning(|url| {
                Ok(VideoMetadata {
                    title: Some("Song".into()),
                    url: url.to_string(),
                    ..Default::default()
                })
            });

        let song = chain(video, Some(catalog))
            .resolve(query, UserId::new(1))
            .await
            .unwrap();
        assert_eq!(song.duration(), crate::sources::UNKNOWN_DURATION);
    }

    #[tokio::test]
    async fn test_playlist_link_fails_without_search() {
        let mut catalog = MockTrackCatalog::new();
        catalog.expect_track().never();
        let mut video = MockVideoProvider::new();
        video.expect_search_top().never();
        video.expect_metadata().never();

        let result = chain(video, Some(catalog))
            .resolve(
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
                UserId::new(1),
            )
            .await;

        assert!(matches!(result, Err(ResolutionError::UnsupportedLink(_))));
    }

    #[tokio::test]
    async fn test_bridge_lookup_failure_is_resolution_failure() {
        let mut catalog = MockTrackCatalog::new();
        catalog
            .expect_track()
            .returning(|_| Err(ResolutionError::provider("Spotify", "404 Not Found")));
        let mut video = MockVideoProvider::new();
        video.expect_search_top().never();

        let result = chain(video, Some(catalog))
            .resolve("spotify:track:missing", UserId::new(1))
            .await;

        assert!(matches!(result, Err(ResolutionError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_bridge_without_credentials() {
        let mut video = MockVideoProvider::new();
        video.expect_search_top().never();

        let result = chain(video, None)
            .resolve("https://open.spotify.com/track/abc", UserId::new(1))
            .await;

        assert!(matches!(result, Err(ResolutionError::BridgeUnavailable("Spotify"))));
    }
}
