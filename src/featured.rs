//! Featured-artist extraction from track titles.

use once_cell::sync::Lazy;
use regex::Regex;

/// Trailing " (feat. A, B)" clause. The marker must open the parenthetical
/// and the clause must end the title.
pub static FEATURED_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s\((?:feat\.?|ft\.?|freq\.?|featuring)\s+(.+?)\)$").unwrap()
});

/// Split a title into its main part and the featured artists named in a
/// trailing parenthetical. Titles without the clause come back unchanged.
///
/// "Wicked Games (feat. Anna Naklab)" → ("Wicked Games", ["Anna Naklab"])
pub fn extract_featured_artists(title: &str) -> (String, Vec<String>) {
    let Some(caps) = FEATURED_CLAUSE.captures(title) else {
        return (title.to_string(), Vec::new());
    };
    let (Some(clause), Some(names)) = (caps.get(0), caps.get(1)) else {
        return (title.to_string(), Vec::new());
    };

    let main_title = title[..clause.start()].trim().to_string();
    let featured = names
        .as_str()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    (main_title, featured)
}
