//! Text normalization for cross-service track matching.
//!
//! Titles, artists and albums from both services go through the same
//! pipeline before they are compared or turned into search queries:
//! suffix stripping, script detection, optional romanization and machine
//! translation, Unicode composition, case folding and punctuation removal.
//!
//! Normalization never fails. Romanization and translation are backed by
//! capabilities that may error; those errors are logged and the text from
//! before the failing stage is used.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use unicode_normalization::UnicodeNormalization;

use crate::error::{TranslateError, TransliterateError};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Release suffixes appended after a dash: "Song - Original Mix", "Song - Remix".
pub static SUFFIX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+[-–—]\s+(?:original mix|extended mix|remix|edit|version|instrumental)\s*$")
        .unwrap()
});

/// Anything that is not a letter, combining mark, digit or whitespace.
pub static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{M}\p{N}\s]").unwrap());

/// Runs of whitespace (including non-breaking and other Unicode spaces).
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub static HEBREW: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{0590}-\u{05FF}]").unwrap());

pub static CYRILLIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{0400}-\u{04FF}]").unwrap());

// ============================================================================
// KNOWN ROMANIZATIONS
// ============================================================================

/// Established Latin spellings for artists whose letter-by-letter
/// romanization differs from the name used on the destination service.
pub static KNOWN_ROMANIZATIONS: Lazy<FxHashMap<&str, &str>> = Lazy::new(|| {
    let mut m = FxHashMap::default();

    // Russian
    m.insert("кино", "kino");
    m.insert("ддт", "ddt");
    m.insert("аквариум", "aquarium");
    m.insert("сплин", "splean");
    m.insert("мумий тролль", "mumiy troll");
    m.insert("земфира", "zemfira");
    m.insert("король и шут", "korol i shut");
    m.insert("виктор цой", "viktor tsoi");
    m.insert("егор крид", "egor kreed");
    m.insert("хаски", "husky");
    m.insert("молчат дома", "molchat doma");

    // Hebrew
    m.insert("היהודים", "hayehudim");
    m.insert("משינה", "mashina");
    m.insert("כוורת", "kaveret");
    m.insert("הדג נחש", "hadag nahash");
    m.insert("שלמה ארצי", "shlomo artzi");
    m.insert("אריק איינשטיין", "arik einstein");
    m.insert("עידן רייכל", "idan raichel");
    m.insert("עומר אדם", "omer adam");
    m.insert("נועה קירל", "noa kirel");
    m.insert("עפרה חזה", "ofra haza");
    m.insert("אייל גולן", "eyal golan");

    m
});

// ============================================================================
// LANGUAGE DETECTION
// ============================================================================

/// Script family detected from Unicode code-point ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Hebrew,
    Russian,
    English,
}

impl Language {
    /// ISO 639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            Language::Hebrew => "he",
            Language::Russian => "ru",
            Language::English => "en",
        }
    }
}

/// Hebrew wins over Cyrillic when both scripts appear.
pub fn detect_language(text: &str) -> Language {
    if HEBREW.is_match(text) {
        Language::Hebrew
    } else if CYRILLIC.is_match(text) {
        Language::Russian
    } else {
        Language::English
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Romanizes text of a given script.
pub trait Transliterator {
    fn supports(&self, language: Language) -> bool;

    fn transliterate(&self, text: &str, language: Language) -> Result<String, TransliterateError>;
}

/// Renders text in English.
pub trait Translator {
    fn translate(&self, text: &str, source: Language) -> Result<String, TranslateError>;
}

/// Table lookup for well-known names, `any_ascii` for everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsciiTransliterator;

impl Transliterator for AsciiTransliterator {
    fn supports(&self, language: Language) -> bool {
        matches!(language, Language::Hebrew | Language::Russian)
    }

    fn transliterate(&self, text: &str, language: Language) -> Result<String, TransliterateError> {
        if !self.supports(language) {
            return Err(TransliterateError(language.code().to_string()));
        }
        let key = text.trim().to_lowercase();
        if let Some(&known) = KNOWN_ROMANIZATIONS.get(key.as_str()) {
            return Ok(known.to_string());
        }
        Ok(any_ascii(text))
    }
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Remove one trailing release suffix such as " - Original Mix".
pub fn strip_suffixes(text: &str) -> String {
    SUFFIX_PATTERN.replace(text, "").to_string()
}

/// Composition, lowercase, punctuation removal and whitespace collapse.
///
/// Removing punctuation can leave a combining mark or a conjoining jamo
/// next to a character it composes with, so the result is composed once
/// more; otherwise folding the output again would change it.
pub fn fold(text: &str) -> String {
    let composed: String = text.nfkc().collect();
    let lowered = composed.to_lowercase();
    let stripped = PUNCTUATION.replace_all(lowered.trim(), "");
    let collapsed = MULTI_SPACE.replace_all(&stripped, " ");
    collapsed.trim().nfkc().collect()
}

/// Plain normalization without romanization or translation.
/// Used for identity keys (diffing, ledger membership).
pub fn normalize_text(text: &str) -> String {
    fold(&strip_suffixes(text))
}

/// Which optional stages to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub transliterate: bool,
    pub translate: bool,
}

impl NormalizeOptions {
    pub const PLAIN: Self = Self {
        transliterate: false,
        translate: false,
    };
    pub const TRANSLITERATE: Self = Self {
        transliterate: true,
        translate: false,
    };
    pub const FULL: Self = Self {
        transliterate: true,
        translate: true,
    };
}

/// Normalizer with its optional backends. Constructed once and passed by
/// reference to the stages that need it.
pub struct Normalizer {
    transliterator: Box<dyn Transliterator>,
    translator: Option<Box<dyn Translator>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Box::new(AsciiTransliterator), None)
    }
}

impl Normalizer {
    pub fn new(transliterator: Box<dyn Transliterator>, translator: Option<Box<dyn Translator>>) -> Self {
        Self {
            transliterator,
            translator,
        }
    }

    pub fn with_translator(translator: Box<dyn Translator>) -> Self {
        Self::new(Box::new(AsciiTransliterator), Some(translator))
    }

    pub fn has_translator(&self) -> bool {
        self.translator.is_some()
    }

    pub fn normalize(&self, text: &str, options: NormalizeOptions) -> String {
        let stripped = strip_suffixes(text);
        let language = detect_language(&stripped);

        let transliterated = if options.transliterate && self.transliterator.supports(language) {
            match self.transliterator.transliterate(&stripped, language) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("Transliteration error for text '{}': {}", text, e);
                    stripped
                }
            }
        } else {
            stripped
        };

        let translated = if options.translate && language != Language::English {
            match &self.translator {
                Some(translator) => match translator.translate(&transliterated, language) {
                    Ok(t) if !t.trim().is_empty() => t,
                    Ok(_) => transliterated,
                    Err(e) => {
                        tracing::warn!("Translation error for text '{}': {}", text, e);
                        transliterated
                    }
                },
                None => {
                    tracing::debug!("No translator configured, keeping '{}'", transliterated);
                    transliterated
                }
            }
        } else {
            transliterated
        };

        fold(&translated)
    }

    /// Plain normalization (titles, albums).
    pub fn plain(&self, text: &str) -> String {
        self.normalize(text, NormalizeOptions::PLAIN)
    }
}

// ============================================================================
// TESTS
// ============================================================================
