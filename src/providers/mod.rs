//! Library capabilities for the two services.
//!
//! The pipeline only talks to these traits; the HTTP clients behind them are
//! constructed once in `main` and passed down by reference.

pub mod spotify;
pub mod ytmusic;

use crate::error::ProviderError;
use crate::models::Track;

pub use spotify::SpotifyClient;
pub use ytmusic::YtMusicClient;

/// Library whose likes define what should exist.
pub trait SourceLibrary {
    /// All liked tracks, pagination flattened.
    fn liked_tracks(&self) -> Result<Vec<Track>, ProviderError>;
}

/// Library being reconciled. Returned tracks carry `external_id`.
pub trait DestinationLibrary {
    fn liked_tracks(&self) -> Result<Vec<Track>, ProviderError>;

    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, ProviderError>;

    fn add_tracks(&self, ids: &[String]) -> Result<(), ProviderError>;
}
