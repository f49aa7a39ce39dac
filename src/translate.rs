//! Machine translation backend for the normalizer.
//!
//! Talks to Google's public `translate_a/single` endpoint (the one browser
//! extensions use) and memoizes results for the lifetime of the client, since
//! the same artist name is normalized once per generated query.

use std::cell::RefCell;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::TranslateError;
use crate::normalize::{Language, Translator};

pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

pub struct GoogleTranslator {
    agent: ureq::Agent,
    endpoint: String,
    cache: RefCell<FxHashMap<(Language, String), String>>,
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl GoogleTranslator {
    pub fn new(endpoint: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(10))
                .build(),
            endpoint: endpoint.to_string(),
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    fn request(&self, text: &str, source: Language) -> Result<String, TranslateError> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("client", "gtx")
            .query("sl", source_code(source))
            .query("tl", "en")
            .query("dt", "t")
            .query("q", text)
            .call()
            .map_err(|e| TranslateError::Request(e.to_string()))?;
        let body: Value = response
            .into_json()
            .map_err(|e| TranslateError::Response(e.to_string()))?;
        parse_response(&body)
    }
}

/// Google still expects the legacy code for Hebrew.
fn source_code(language: Language) -> &'static str {
    match language {
        Language::Hebrew => "iw",
        other => other.code(),
    }
}

/// Response shape: `[[["translated", "original", ...], ...], ...]`; long
/// inputs come back split into several segments.
fn parse_response(body: &Value) -> Result<String, TranslateError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::Response(body.to_string()))?;
    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();
    if translated.trim().is_empty() {
        return Err(TranslateError::Response("empty translation".to_string()));
    }
    Ok(translated)
}

impl Translator for GoogleTranslator {
    fn translate(&self, text: &str, source: Language) -> Result<String, TranslateError> {
        let key = (source, text.to_string());
        if let Some(hit) = self.cache.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let translated = self.request(text, source)?;
        tracing::debug!("Translated '{}' -> '{}'", text, translated);
        self.cache.borrow_mut().insert(key, translated.clone());
        Ok(translated)
    }
}
