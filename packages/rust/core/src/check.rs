//! Manifest consistency check.
//!
//! Compares the keys listed in a manifest with the page directories present
//! under the site root.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, instrument};

use stitchbook_shared::{INDEX_KEY, Manifest, Result, StitchError};

/// Differences between a manifest and the files on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Keys in the manifest with no source page.
    pub missing_files: Vec<String>,
    /// Page directories under the root that the manifest does not list.
    pub unlisted_files: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.missing_files.is_empty() && self.unlisted_files.is_empty()
    }
}

/// Check the manifest against `root_dir[/language]`.
///
/// A directory counts as a page when it holds `index_filename`. Hidden
/// directories and the index page are ignored.
#[instrument(skip_all, fields(root = %root_dir.display(), language = language.unwrap_or("")))]
pub fn check_manifest(
    manifest: &Manifest,
    root_dir: &Path,
    language: Option<&str>,
    index_filename: &str,
) -> Result<CheckReport> {
    let base = match language {
        Some(lang) => root_dir.join(lang),
        None => root_dir.to_path_buf(),
    };

    let listed: BTreeSet<&str> = manifest.entries().iter().map(|e| e.key.as_str()).collect();

    let missing_files: Vec<String> = listed
        .iter()
        .filter(|key| !base.join(key).join(index_filename).is_file())
        .map(|key| key.to_string())
        .collect();

    let mut on_disk = BTreeSet::new();
    let entries = std::fs::read_dir(&base).map_err(|e| StitchError::io(&base, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StitchError::io(&base, e))?;
        let path = entry.path();
        if !path.is_dir() || !path.join(index_filename).is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == INDEX_KEY {
            continue;
        }
        on_disk.insert(name);
    }

    let unlisted_files: Vec<String> = on_disk
        .into_iter()
        .filter(|name| !listed.contains(name.as_str()))
        .collect();

    debug!(
        missing = missing_files.len(),
        unlisted = unlisted_files.len(),
        "manifest checked"
    );

    Ok(CheckReport {
        missing_files,
        unlisted_files,
    })
}
