//! Streaming-music client core: catalog access, playlist sync and the
//! single playback session that sequences tracks over an injected media
//! backend.

pub mod catalog;
pub mod config;
pub mod error;
pub mod genre;
pub mod history;
pub mod http;
pub mod likes;
pub mod lyrics;
pub mod model;
pub mod platform;
pub mod player;
pub mod playlists;
pub mod radio;
pub mod stream_url;
