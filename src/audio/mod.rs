//! # Audio Module
//!
//! Per-guild playback queues and the boundaries they drive.
//!
//! ## Architecture
//!
//! ### [`jukebox`] - Command Entry Point
//! - Resolves `/play` requests into songs
//! - Routes queue commands to the guild they belong to
//!
//! ### [`registry`] - Guild Queue Registry
//! - One queue per guild, created on the first `/play`
//! - Atomic creation and teardown per guild
//!
//! ### [`engine`] - Playback Engine
//! - One actor task per guild owning its queue, voice session and player
//! - Advances on track end, drops songs that fail to stream
//! - Disconnects after a configurable idle period
//!
//! ### [`voice`] / [`stream`] - Boundaries
//! - Songbird voice sessions and player lifecycle signals
//! - `yt-dlp` format extraction into lazy HTTP inputs
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::audio::{
//!     engine::EngineDeps, events::LogNotifier, jukebox::Jukebox, stream::YtDlpStreamProvider,
//!     voice::SongbirdConnector,
//! };
//! use guild_jukebox::{cache::MusicCache, config::Config, sources::{youtube::YtDlpClient, ResolverChain}};
//! use serenity::all::{ChannelId, GuildId, UserId};
//! use std::sync::Arc;
//!
//! # async fn example(songbird: Arc<songbird::Songbird>) -> anyhow::Result<()> {
//! let config = Config::default();
//! let resolver = ResolverChain::standard(
//!     Arc::new(YtDlpClient::new("yt-dlp")),
//!     None,
//!     MusicCache::new(config.cache_size, config.cache_ttl()),
//!     config.resolve_timeout(),
//! );
//! let jukebox = Jukebox::new(
//!     resolver,
//!     EngineDeps {
//!         voice: Arc::new(SongbirdConnector::new(songbird, config.default_volume)),
//!         streams: Arc::new(YtDlpStreamProvider::new("yt-dlp")),
//!         notifier: Arc::new(LogNotifier),
//!         config: config.engine(),
//!     },
//! );
//!
//! let guild_id = GuildId::new(123456789);
//! jukebox
//!     .play(guild_id, Some(ChannelId::new(42)), UserId::new(7), "never gonna give you up")
//!     .await?;
//! jukebox.pause(guild_id).await?;
//! jukebox.resume(guild_id).await?;
//! jukebox.skip(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod jukebox;
pub mod queue;
pub mod registry;
pub mod stream;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;
