//! Manifest loading.
//!
//! The manifest is a YAML mapping (the static-site `_config.yml` shape),
//! with TOML and JSON accepted by file extension.

use std::path::Path;

use tracing::debug;

use crate::error::{Result, StitchError};
use crate::types::{Manifest, RawManifest};

/// Serialization format of a manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Toml,
    Json,
}

impl ManifestFormat {
    /// Pick the format from the file extension; anything unknown is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse and validate manifest text.
pub fn parse_manifest(content: &str, format: ManifestFormat) -> Result<Manifest> {
    let raw: RawManifest = match format {
        ManifestFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| StitchError::config(format!("invalid manifest YAML: {e}")))?,
        ManifestFormat::Toml => toml::from_str(content)
            .map_err(|e| StitchError::config(format!("invalid manifest TOML: {e}")))?,
        ManifestFormat::Json => serde_json::from_str(content)
            .map_err(|e| StitchError::config(format!("invalid manifest JSON: {e}")))?,
    };

    Manifest::from_raw(raw)
}

/// Load a manifest from disk. A missing or unreadable file is a config error.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StitchError::config(format!("cannot read manifest {}: {e}", path.display()))
    })?;

    let manifest = parse_manifest(&content, ManifestFormat::from_path(path))?;
    debug!(
        path = %path.display(),
        documents = manifest.len(),
        title = %manifest.title(),
        "manifest loaded"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    #[test]
    fn parse_yaml_manifest_with_extra_keys() {
        let yaml = r#"
title: "Software Design by Example"
baseurl: /sdxjs
toc:
  lessons:
  - /intro/
  - /setup/
  bib:
  - /bib/
  extras:
  - /license/
"#;
        let manifest = parse_manifest(yaml, ManifestFormat::Yaml).unwrap();
        assert_eq!(manifest.title(), "Software Design by Example");
        let keys: Vec<&str> = manifest.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["intro", "setup", "bib", "license"]);
        assert_eq!(manifest.entries()[2].category, Category::Bib);
    }

    #[test]
    fn parse_toml_manifest_defaults_optional_groups() {
        let toml_str = r#"
title = "Guide"

[toc]
lessons = ["intro"]
"#;
        let manifest = parse_manifest(toml_str, ManifestFormat::Toml).unwrap();
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn parse_json_manifest() {
        let json = r#"{"title": "Guide", "toc": {"lessons": ["a"], "extras": ["z"]}}"#;
        let manifest = parse_manifest(json, ManifestFormat::Json).unwrap();
        let keys: Vec<_> = manifest.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["a", "z"]);
    }

    #[test]
    fn unparsable_manifest_is_config_error() {
        let err = parse_manifest("title: [unterminated", ManifestFormat::Yaml).unwrap_err();
        assert!(matches!(err, StitchError::Config { .. }));
    }

    #[test]
    fn missing_toc_is_config_error() {
        let err = parse_manifest("title: Guide\n", ManifestFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("`toc`"));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ManifestFormat::from_path(Path::new("_config.yml")), ManifestFormat::Yaml);
        assert_eq!(ManifestFormat::from_path(Path::new("book.TOML")), ManifestFormat::Toml);
        assert_eq!(ManifestFormat::from_path(Path::new("book.json")), ManifestFormat::Json);
    }

    #[test]
    fn load_missing_manifest_fails() {
        let path = std::env::temp_dir().join(format!("sb-missing-{}.yml", uuid::Uuid::now_v7()));
        let err = load_manifest(&path).unwrap_err();
        assert!(matches!(err, StitchError::Config { .. }));
    }
}
