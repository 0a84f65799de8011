//! Core domain types: document keys, the validated manifest, and the TOC.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StitchError};

/// Reserved key of the index document, which always comes first.
pub const INDEX_KEY: &str = "index";

// ---------------------------------------------------------------------------
// DocKey
// ---------------------------------------------------------------------------

/// A document key: one path segment naming a source directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocKey(String);

impl DocKey {
    /// Validate a raw manifest key. Surrounding slashes are trimmed, so
    /// `/intro/` and `intro` name the same document.
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim().trim_matches('/');

        if key.is_empty() {
            return Err(StitchError::config(format!("empty document key '{raw}'")));
        }
        if key == "." || key == ".." {
            return Err(StitchError::config(format!("document key '{raw}' is not a directory name")));
        }
        if let Some(bad) = key.chars().find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_whitespace()) {
            return Err(StitchError::config(format!(
                "document key '{raw}' contains invalid character {bad:?}"
            )));
        }

        Ok(Self(key.to_string()))
    }

    /// The key of the index document.
    pub fn index() -> Self {
        Self(INDEX_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Manifest grouping. Documents are merged in declaration order of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Index,
    Lessons,
    Bib,
    Extras,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Index => "index",
            Self::Lessons => "lessons",
            Self::Bib => "bib",
            Self::Extras => "extras",
        };
        f.write_str(name)
    }
}

/// One manifest document in merge order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub category: Category,
    pub key: DocKey,
}

/// On-disk manifest shape (`title` + `toc.{lessons,bib,extras}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawManifest {
    /// Title of the combined document.
    pub title: Option<String>,
    /// Ordered document keys by category.
    pub toc: Option<RawManifestToc>,
}

/// The `toc` mapping of a manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawManifestToc {
    pub lessons: Option<Vec<String>>,
    #[serde(default)]
    pub bib: Vec<String>,
    #[serde(default)]
    pub extras: Vec<String>,
}

/// A validated, immutable manifest.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    title: String,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from its parts, validating every key.
    pub fn new<S: AsRef<str>>(title: &str, lessons: &[S], bib: &[S], extras: &[S]) -> Result<Self> {
        if title.trim().is_empty() {
            return Err(StitchError::config("manifest `title` must not be empty"));
        }

        let groups = [
            (Category::Lessons, lessons),
            (Category::Bib, bib),
            (Category::Extras, extras),
        ];

        let mut seen: HashSet<DocKey> = HashSet::new();
        let mut entries = Vec::new();

        for (category, keys) in groups {
            for raw in keys {
                let key = DocKey::parse(raw.as_ref())?;
                if key.as_str() == INDEX_KEY {
                    return Err(StitchError::config(format!(
                        "manifest key '{INDEX_KEY}' is reserved for the index document"
                    )));
                }
                if !seen.insert(key.clone()) {
                    return Err(StitchError::config(format!(
                        "manifest lists document '{key}' more than once"
                    )));
                }
                entries.push(ManifestEntry { category, key });
            }
        }

        Ok(Self {
            title: title.trim().to_string(),
            entries,
        })
    }

    /// Validate a deserialized manifest file.
    pub fn from_raw(raw: RawManifest) -> Result<Self> {
        let title = raw
            .title
            .ok_or_else(|| StitchError::config("manifest is missing required key `title`"))?;
        let toc = raw
            .toc
            .ok_or_else(|| StitchError::config("manifest is missing required key `toc`"))?;
        let lessons = toc
            .lessons
            .ok_or_else(|| StitchError::config("manifest is missing required key `toc.lessons`"))?;

        Self::new(&title, lessons.as_slice(), toc.bib.as_slice(), toc.extras.as_slice())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Entries in merge order: lessons, then bib, then extras.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Toc
// ---------------------------------------------------------------------------

/// A single top-level heading listed in the merged table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Plain-text heading title.
    pub title: String,
    /// Fragment identifier of the heading (without `#`).
    pub anchor: String,
}

/// Table of contents derived from the merged document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    pub entries: Vec<TocEntry>,
}

impl Toc {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
