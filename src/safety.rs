//! Safety checks for artifact paths.
//!
//! Every stage rewrites its artifact whole, so two artifacts configured to
//! the same file would silently clobber each other (worst case: the search
//! dump overwriting the ledger). These checks run before any stage starts.

use std::path::Path;

use crate::error::{SyncError, SyncResult};

/// Validates that an artifact path is safe to overwrite.
///
/// Checks:
/// - The file name must end in `.json`
/// - The path cannot be the same as any of the other artifact paths
pub fn validate_artifact_path(path: &Path, others: &[&Path]) -> SyncResult<()> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !name.ends_with(".json") {
        return Err(SyncError::Config(format!(
            "Safety check failed: artifact '{}' must be a .json file",
            path.display()
        )));
    }

    for other in others {
        if path == *other {
            return Err(SyncError::Config(format!(
                "Safety check failed: artifact '{}' is configured twice",
                path.display()
            )));
        }
    }

    Ok(())
}

/// Validate a full set of artifact paths against each other.
pub fn validate_artifact_set(paths: &[&Path]) -> SyncResult<()> {
    for (i, path) in paths.iter().enumerate() {
        validate_artifact_path(path, &paths[i + 1..])?;
    }
    Ok(())
}
