//! # Guild Jukebox
//!
//! Discord music bot: members queue tracks with `/play` and the bot plays
//! them one after another in their voice channel, one queue per guild.
//!
//! - [`sources`] turns a query or link into a [`sources::Song`]
//! - [`audio`] owns the per-guild queues and drives Songbird
//! - [`bot`] and [`ui`] are the Discord command layer

pub mod audio;
pub mod bot;
pub mod cache;
pub mod config;
pub mod sources;
pub mod ui;
