//! # Cache Module
//!
//! Bounded in-memory cache for resolved video metadata.
//!
//! Resolving a YouTube link means spawning `yt-dlp`, which easily takes a
//! second or more. Popular links get requested again and again, so the link
//! resolver keeps the canonical metadata around, keyed by the URL as typed.
//!
//! ## Configuration
//!
//! ```env
//! CACHE_SIZE=100              # Maximum number of metadata entries
//! CACHE_TTL_SECS=3600         # Time-to-live in seconds, 0 disables expiry
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::cache::MusicCache;
//! use guild_jukebox::sources::VideoMetadata;
//! use std::time::Duration;
//!
//! let cache = MusicCache::new(100, Some(Duration::from_secs(3600)));
//! cache.insert(
//!     "https://youtu.be/dQw4w9WgXcQ".to_string(),
//!     VideoMetadata {
//!         title: Some("Never Gonna Give You Up".to_string()),
//!         url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
//!         duration: Some(213.0),
//!         thumbnail: None,
//!     },
//! );
//! assert!(cache.get(&"https://youtu.be/dQw4w9WgXcQ".to_string()).is_some());
//! ```

pub mod lru_cache;

use lru_cache::LRUCache;
use tracing::info;

use crate::sources::VideoMetadata;

/// Metadata cache keyed by the link the user typed.
pub type MusicCache = LRUCache<String, VideoMetadata>;

impl MusicCache {
    /// Limpieza periódica de entradas expiradas
    pub fn cleanup_old_entries(&self) {
        let removed = self.cleanup_expired();
        let metrics = self.metrics();

        info!(
            "🧹 Cache: {} expiradas, {}/{} entradas, {:.0}% aciertos",
            removed,
            self.len(),
            self.capacity(),
            metrics.hit_rate() * 100.0
        );
    }
}
