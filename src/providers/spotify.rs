//! Spotify Web API client (destination library).
//!
//! Authentication is not handled here: the client is given a bearer token
//! with the `user-library-read` and `user-library-modify` scopes.

use serde::Deserialize;
use std::time::Duration;

use crate::error::ProviderError;
use crate::models::Track;
use crate::providers::DestinationLibrary;

pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Spotify caps both page size and ids per library write at 50.
const PAGE_SIZE: usize = 50;

// ── API response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SavedTrack {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Paging<ApiTrack>>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    album: Option<ApiAlbum>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    name: Option<String>,
}

impl ApiTrack {
    /// Liked tracks keep the primary artist only; search results credit
    /// everyone so the scorer can see featured artists.
    fn into_track(self, all_artists: bool) -> Option<Track> {
        let id = self.id?;
        let title = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unknown Title".to_string());
        let artist = if all_artists {
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.artists.first().map(|a| a.name.clone()).unwrap_or_default()
        };
        let artist = if artist.trim().is_empty() {
            "Unknown Artist".to_string()
        } else {
            artist
        };
        let album = self.album.and_then(|a| a.name);
        Some(Track::new(title, artist, album.as_deref()).with_id(id))
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

pub struct SpotifyClient {
    agent: ureq::Agent,
    token: String,
    base_url: String,
}

impl SpotifyClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(20))
                .build(),
            token: token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let response = self
            .agent
            .get(url)
            .set("Authorization", &self.authorization())
            .call()?;
        response
            .into_json::<T>()
            .map_err(|e| ProviderError::Decode(format!("{}: {}", url, e)))
    }
}

impl DestinationLibrary for SpotifyClient {
    fn liked_tracks(&self) -> Result<Vec<Track>, ProviderError> {
        let mut tracks = Vec::new();
        let mut next = Some(format!("{}/me/tracks?limit={}", self.base_url, PAGE_SIZE));

        while let Some(url) = next {
            let page: Paging<SavedTrack> = self.get(&url)?;
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .filter_map(|t| t.into_track(false)),
            );
            tracing::debug!("Fetched {} Spotify likes so far", tracks.len());
            next = page.next;
        }

        Ok(tracks)
    }

    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, ProviderError> {
        let url = format!(
            "{}/search?q={}&type=track&limit={}",
            self.base_url,
            urlencoding::encode(query),
            limit.clamp(1, PAGE_SIZE)
        );
        let response: SearchResponse = self.get(&url)?;
        Ok(response
            .tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| t.into_track(true))
            .collect())
    }

    fn add_tracks(&self, ids: &[String]) -> Result<(), ProviderError> {
        let url = format!("{}/me/tracks", self.base_url);
        for chunk in ids.chunks(PAGE_SIZE) {
            self.agent
                .put(&url)
                .set("Authorization", &self.authorization())
                .send_json(serde_json::json!({ "ids": chunk }))?;
        }
        Ok(())
    }
}
