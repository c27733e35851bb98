//! Discord embed rendering for command replies and queue notifications.

pub mod embeds;
