//! YouTube Music client (source library).
//!
//! Uses the InnerTube `browse` endpoint that the web client calls for the
//! "Liked music" playlist. Requests are authenticated with request headers
//! exported from a signed-in browser session (cookie, authorization,
//! x-goog-authuser, ...), stored as a flat JSON object.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::ProviderError;
use crate::models::Track;
use crate::providers::SourceLibrary;

pub const DEFAULT_BASE_URL: &str = "https://music.youtube.com/youtubei/v1";
const LIKED_PLAYLIST: &str = "VLLM";
const CLIENT_NAME: &str = "WEB_REMIX";
const CLIENT_VERSION: &str = "1.20240918.01.00";

/// Guards against a continuation loop if the service keeps handing back tokens.
const MAX_PAGES: usize = 500;

pub struct YtMusicClient {
    agent: ureq::Agent,
    headers: BTreeMap<String, String>,
    base_url: String,
}

impl YtMusicClient {
    pub fn new(headers: BTreeMap<String, String>) -> Self {
        Self::with_base_url(headers, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(headers: BTreeMap<String, String>, base_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            headers,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Load the exported headers file.
    pub fn from_headers_file(path: &Path) -> Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path)?;
        let raw: BTreeMap<String, Value> = serde_json::from_str(&content)
            .map_err(|e| ProviderError::Decode(format!("{}: {}", path.display(), e)))?;
        let headers = raw
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k.to_lowercase(), s)),
                Value::Number(n) => Some((k.to_lowercase(), n.to_string())),
                _ => None,
            })
            .collect();
        Ok(Self::new(headers))
    }

    fn post(&self, body: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/browse?alt=json&prettyPrint=false", self.base_url);
        let mut request = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Origin", "https://music.youtube.com");
        for (name, value) in &self.headers {
            // Let ureq compute framing headers itself.
            if name == "content-length" || name == "accept-encoding" {
                continue;
            }
            request = request.set(name, value);
        }
        let response = request.send_json(body)?;
        response
            .into_json::<Value>()
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    fn context() -> Value {
        json!({
            "client": {
                "clientName": CLIENT_NAME,
                "clientVersion": CLIENT_VERSION,
                "hl": "en"
            },
            "user": {}
        })
    }
}

impl SourceLibrary for YtMusicClient {
    fn liked_tracks(&self) -> Result<Vec<Track>, ProviderError> {
        let mut tracks = Vec::new();
        let first = self.post(json!({
            "context": Self::context(),
            "browseId": LIKED_PLAYLIST
        }))?;

        let mut page = parse_page(&first);
        let mut pages = 1;
        loop {
            tracks.append(&mut page.tracks);
            tracing::debug!("Fetched {} YouTube Music likes so far", tracks.len());
            let Some(token) = page.continuation.take() else {
                break;
            };
            if pages >= MAX_PAGES {
                tracing::warn!("Stopping after {} pages of YouTube Music likes", pages);
                break;
            }
            pages += 1;
            let next = self.post(json!({
                "context": Self::context(),
                "continuation": token
            }))?;
            page = parse_page(&next);
        }

        Ok(tracks)
    }
}

// ── Response parsing ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Page {
    tracks: Vec<Track>,
    continuation: Option<String>,
}

/// Depth-first search for the first value stored under `key`.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

fn collect_key<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == key {
                    out.push(v);
                } else {
                    collect_key(v, key, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_key(v, key, out)),
        _ => {}
    }
}

fn parse_page(response: &Value) -> Page {
    let mut renderers = Vec::new();
    collect_key(response, "musicResponsiveListItemRenderer", &mut renderers);

    let continuation = find_key(response, "continuationCommand")
        .and_then(|c| c.get("token"))
        .or_else(|| find_key(response, "nextContinuationData").and_then(|c| c.get("continuation")))
        .and_then(Value::as_str)
        .map(str::to_string);

    Page {
        tracks: renderers.into_iter().filter_map(parse_item).collect(),
        continuation,
    }
}

fn column_runs(item: &Value, index: usize) -> Option<&Vec<Value>> {
    item.get("flexColumns")?
        .get(index)?
        .get("musicResponsiveListItemFlexColumnRenderer")?
        .get("text")?
        .get("runs")?
        .as_array()
}

fn first_run_text(item: &Value, index: usize) -> Option<String> {
    column_runs(item, index)?
        .first()?
        .get("text")?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Title in column 0, artists in column 1, album (when present) in column 2.
fn parse_item(item: &Value) -> Option<Track> {
    let title = first_run_text(item, 0)?;
    let artist = first_run_text(item, 1).unwrap_or_else(|| "Unknown Artist".to_string());
    let album = first_run_text(item, 2);
    Some(Track::new(title, artist, album.as_deref()))
}
