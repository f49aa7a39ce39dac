//! JSON artifact persistence.
//!
//! Every artifact (likes snapshots, search dump, match dump, ledger) is a
//! pretty-printed JSON array written whole. Writes go to a temporary file in
//! the same directory and are renamed into place, so a crash mid-write
//! leaves the previous version intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{ProviderError, SyncError, SyncResult};
use crate::models::Track;

fn persistence(path: &Path, source: std::io::Error) -> SyncError {
    SyncError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a JSON artifact. An absent file is `Ok(None)`; a present but
/// unreadable or malformed file is an error.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> SyncResult<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(persistence(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| SyncError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Replace `path` with the pretty JSON rendering of `value`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> SyncResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| persistence(dir, e))?;

    let tmp = NamedTempFile::new_in(dir).map_err(|e| persistence(path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| SyncError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|e| persistence(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| persistence(path, e))?;
    tmp.persist(path).map_err(|e| persistence(path, e.error))?;
    Ok(())
}

/// Reject records that break the non-empty title/artist contract.
pub fn validate_tracks(tracks: &[Track], origin: &Path) -> SyncResult<()> {
    if let Some((i, _)) = tracks
        .iter()
        .enumerate()
        .find(|(_, t)| t.title.trim().is_empty() || t.artist.trim().is_empty())
    {
        return Err(SyncError::Structural(format!(
            "record {} in {} has an empty title or artist",
            i,
            origin.display()
        )));
    }
    Ok(())
}

/// Load a cached likes snapshot, or fetch from the provider and cache it.
/// Delete the file to force a refresh.
pub fn read_or_fetch<F>(path: &Path, fetch: F) -> SyncResult<Vec<Track>>
where
    F: FnOnce() -> Result<Vec<Track>, ProviderError>,
{
    if let Some(tracks) = read_json::<Vec<Track>>(path)? {
        validate_tracks(&tracks, path)?;
        tracing::info!("Loaded {} tracks from {}", tracks.len(), path.display());
        return Ok(tracks);
    }

    let tracks = fetch()?;
    validate_tracks(&tracks, path)?;
    write_json(path, &tracks)?;
    tracing::info!("Fetched {} tracks, cached to {}", tracks.len(), path.display());
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_absent_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let result: Option<Vec<Track>> = read_json(&dir.path().join("missing.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let err = read_json::<Vec<Track>>(&path).unwrap_err();
        assert!(matches!(err, SyncError::Json { .. }));
    }

    #[test]
    fn test_missing_required_field_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("likes.json");
        fs::write(&path, r#"[{"artist": "X"}]"#).unwrap();
        assert!(read_json::<Vec<Track>>(&path).is_err());
    }

    #[test]
    fn test_write_then_read_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("likes.json");
        let tracks = vec![Track::new("A", "B", None)];
        write_json(&path, &tracks).unwrap();
        let loaded: Vec<Track> = read_json(&path).unwrap().unwrap();
        assert_eq!(loaded, tracks);
        // Overwrite replaces the whole file
        write_json(&path, &Vec::<Track>::new()).unwrap();
        let loaded: Vec<Track> = read_json(&path).unwrap().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_read_or_fetch_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("likes.json");
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok(vec![Track::new("Song", "Artist", Some("Album"))])
        };

        let first = read_or_fetch(&path, fetch).unwrap();
        let second = read_or_fetch(&path, || {
            calls.set(calls.get() + 1);
            Ok(Vec::new())
        })
        .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_read_or_fetch_does_not_cache_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("likes.json");
        let result = read_or_fetch(&path, || Err(ProviderError::Network("down".to_string())));
        assert!(matches!(result, Err(SyncError::Provider(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_title_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("likes.json");
        fs::write(&path, r#"[{"title": "", "artist": "X"}]"#).unwrap();
        let err = read_or_fetch(&path, || Ok(Vec::new())).unwrap_err();
        assert!(matches!(err, SyncError::Structural(_)));
    }
}
