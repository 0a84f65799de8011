//! Shared types, error model, and configuration for stitchbook.
//!
//! This crate is the foundation depended on by all other stitchbook crates.
//! It provides:
//! - [`StitchError`], the unified error type
//! - Domain types ([`Manifest`], [`DocKey`], [`Toc`], [`TocEntry`])
//! - Configuration ([`AppConfig`], [`StitchOptions`], config loading)
//! - Manifest loading ([`load_manifest`])

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnhanceConfig, FrontMatter, LabelsConfig, SelectorsConfig, StitchOptions,
    StitchSection, TocMode, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_config,
};
pub use error::{Result, StitchError};
pub use manifest::{ManifestFormat, load_manifest, parse_manifest};
pub use types::{
    Category, DocKey, INDEX_KEY, Manifest, ManifestEntry, RawManifest, RawManifestToc, Toc,
    TocEntry,
};
