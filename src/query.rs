//! Search query generation.
//!
//! Services disagree on where featured artists live (title, artist credits
//! or album name), so one source track fans out into up to seven
//! field-scoped queries. Order matters: callers issue them front to back and
//! the later queries add information to the earlier ones.

use crate::models::NormalizedTrack;

/// Upper bound on queries produced for a single track.
pub const MAX_QUERIES: usize = 7;

fn field_query(title: &str, artist: &str, album: Option<&str>) -> String {
    match album {
        Some(album) => format!("track:{} artist:{} album:{}", title, artist, album),
        None => format!("track:{} artist:{}", title, artist),
    }
}

/// Build the ordered query list for a normalized track.
pub fn generate_queries(
    title: &str,
    artist: &str,
    album: Option<&str>,
    featured_artists: &[String],
) -> Vec<String> {
    let mut queries = Vec::with_capacity(MAX_QUERIES);
    let album = album.filter(|a| !a.is_empty());

    let featured = featured_artists.join(" ");
    let has_featured = !featured.trim().is_empty();

    let all_artists = if has_featured {
        format!("{} {}", artist, featured)
    } else {
        artist.to_string()
    };
    let title_with_feat = format!("{} (feat. {})", title, featured);

    queries.push(field_query(title, &all_artists, None));

    if has_featured {
        queries.push(field_query(&title_with_feat, artist, None));
    }

    if let Some(album) = album {
        queries.push(field_query(title, &all_artists, Some(album)));

        if has_featured {
            let album_with_feat = format!("{} (feat. {})", album, featured);
            queries.push(field_query(&title_with_feat, artist, Some(album)));
            queries.push(field_query(title, &all_artists, Some(&album_with_feat)));
            queries.push(field_query(&title_with_feat, &all_artists, Some(album)));
            queries.push(field_query(&title_with_feat, &all_artists, Some(&album_with_feat)));
        }
    }

    queries
}

/// Convenience wrapper over [`generate_queries`].
pub fn queries_for(track: &NormalizedTrack) -> Vec<String> {
    generate_queries(
        &track.normalized_title,
        &track.normalized_artist,
        track.normalized_album.as_deref(),
        &track.featured_artists,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_artist_only() {
        assert_eq!(
            generate_queries("song a", "artist x", None, &[]),
            vec!["track:song a artist:artist x"]
        );
    }

    #[test]
    fn test_with_album() {
        assert_eq!(
            generate_queries("song a", "artist x", Some("some album"), &[]),
            vec![
                "track:song a artist:artist x",
                "track:song a artist:artist x album:some album",
            ]
        );
    }

    #[test]
    fn test_with_featured_no_album() {
        let featured = vec!["anna naklab".to_string()];
        assert_eq!(
            generate_queries("wicked games", "parra for cuva", None, &featured),
            vec![
                "track:wicked games artist:parra for cuva anna naklab",
                "track:wicked games (feat. anna naklab) artist:parra for cuva",
            ]
        );
    }

    #[test]
    fn test_full_fan_out() {
        let featured = vec!["anna naklab".to_string()];
        let queries = generate_queries("wicked games", "parra for cuva", Some("wicked games"), &featured);
        assert_eq!(queries.len(), MAX_QUERIES);
        assert_eq!(
            queries,
            vec![
                "track:wicked games artist:parra for cuva anna naklab",
                "track:wicked games (feat. anna naklab) artist:parra for cuva",
                "track:wicked games artist:parra for cuva anna naklab album:wicked games",
                "track:wicked games (feat. anna naklab) artist:parra for cuva album:wicked games",
                "track:wicked games artist:parra for cuva anna naklab album:wicked games (feat. anna naklab)",
                "track:wicked games (feat. anna naklab) artist:parra for cuva anna naklab album:wicked games",
                "track:wicked games (feat. anna naklab) artist:parra for cuva anna naklab album:wicked games (feat. anna naklab)",
            ]
        );
    }

    #[test]
    fn test_multiple_featured_are_space_joined() {
        let featured = vec!["a".to_string(), "b".to_string()];
        let queries = generate_queries("t", "x", None, &featured);
        assert_eq!(queries[0], "track:t artist:x a b");
        assert_eq!(queries[1], "track:t (feat. a b) artist:x");
    }

    #[test]
    fn test_empty_album_is_ignored() {
        assert_eq!(generate_queries("t", "x", Some(""), &[]).len(), 1);
    }

    #[test]
    fn test_queries_for_normalized_track() {
        let track = NormalizedTrack {
            normalized_title: "t".to_string(),
            normalized_artist: "x".to_string(),
            normalized_album: Some("b".to_string()),
            featured_artists: vec![],
        };
        assert_eq!(queries_for(&track).len(), 2);
    }
}
