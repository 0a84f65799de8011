//! Application configuration for stitchbook.
//!
//! Config is looked up at `./stitchbook.toml`, then
//! `~/.stitchbook/stitchbook.toml`. CLI flags override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StitchError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "stitchbook.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".stitchbook";

// ---------------------------------------------------------------------------
// Config structs (matching stitchbook.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Merge behavior.
    #[serde(default)]
    pub stitch: StitchSection,

    /// Selectors locating the parts of each page.
    #[serde(default)]
    pub selectors: SelectorsConfig,

    /// Class labels applied to the output.
    #[serde(default)]
    pub labels: LabelsConfig,

    /// Special-link and styling fixups.
    #[serde(default)]
    pub enhance: EnhanceConfig,

    /// Header block emitted before the output, for static-site layouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_matter: Option<FrontMatter>,
}

/// How the merged table of contents is populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TocMode {
    /// Leave the container empty for a view-time script to fill.
    ClientPopulated,
    /// Fill the container with the heading list while merging.
    #[default]
    MergeTimePopulated,
}

impl FromStr for TocMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "client-populated" | "client" => Ok(Self::ClientPopulated),
            "merge-time-populated" | "merge-time" => Ok(Self::MergeTimePopulated),
            other => Err(format!(
                "unknown TOC mode '{other}': expected 'client-populated' or 'merge-time-populated'"
            )),
        }
    }
}

impl std::fmt::Display for TocMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientPopulated => f.write_str("client-populated"),
            Self::MergeTimePopulated => f.write_str("merge-time-populated"),
        }
    }
}

/// `[stitch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchSection {
    /// Prefix of the synthesized per-document anchor (`<prefix><key>`).
    #[serde(default = "default_section_prefix")]
    pub section_prefix: String,

    /// TOC population mode.
    #[serde(default)]
    pub toc_mode: TocMode,

    /// File name of each document inside its key directory.
    #[serde(default = "default_index_filename")]
    pub index_filename: String,

    /// Reject documents without exactly one `<h1>`.
    #[serde(default = "default_true")]
    pub require_single_title: bool,

    /// Fail when a rewritten link has no matching anchor.
    #[serde(default = "default_true")]
    pub strict_links: bool,
}

impl Default for StitchSection {
    fn default() -> Self {
        Self {
            section_prefix: default_section_prefix(),
            toc_mode: TocMode::default(),
            index_filename: default_index_filename(),
            require_single_title: true,
            strict_links: true,
        }
    }
}

fn default_section_prefix() -> String {
    "section-".into()
}
fn default_index_filename() -> String {
    "index.html".into()
}
fn default_true() -> bool {
    true
}

/// `[selectors]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorsConfig {
    /// Content container candidates, tried in order.
    #[serde(default = "default_content_selectors")]
    pub content: Vec<String>,

    /// Editorial notice removed from every page.
    #[serde(default = "default_disclaimer_selector")]
    pub disclaimer: String,

    /// Per-page heading index placeholder.
    #[serde(default = "default_headings_selector")]
    pub headings: String,

    /// Container in a template that receives the merged content.
    #[serde(default = "default_template_content_selector")]
    pub template_content: String,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            content: default_content_selectors(),
            disclaimer: default_disclaimer_selector(),
            headings: default_headings_selector(),
            template_content: default_template_content_selector(),
        }
    }
}

fn default_content_selectors() -> Vec<String> {
    ["div.main", "main", "article", "body"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_disclaimer_selector() -> String {
    "div.disclaimer".into()
}
fn default_headings_selector() -> String {
    "div.headings".into()
}
fn default_template_content_selector() -> String {
    "div.main".into()
}

/// `[labels]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    /// Class given to each relocated document container.
    #[serde(default = "default_chapter_class")]
    pub chapter_class: String,

    /// Classes of the generated TOC container.
    #[serde(default = "default_toc_classes")]
    pub toc_classes: Vec<String>,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            chapter_class: default_chapter_class(),
            toc_classes: default_toc_classes(),
        }
    }
}

fn default_chapter_class() -> String {
    "chapter".into()
}
fn default_toc_classes() -> Vec<String> {
    vec!["list-block".into(), "headings".into()]
}

/// `[enhance]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Expand `#b:` citation links into per-key bibliography links.
    #[serde(default = "default_true")]
    pub citations: bool,

    /// Class added to `#g:` glossary links.
    #[serde(default = "default_glossary_class")]
    pub glossary_class: String,

    /// Classes added to every table.
    #[serde(default)]
    pub table_classes: Vec<String>,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            citations: true,
            glossary_class: default_glossary_class(),
            table_classes: Vec::new(),
        }
    }
}

fn default_glossary_class() -> String {
    "glossref".into()
}

/// `[front_matter]` section. Fields are emitted in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

// ---------------------------------------------------------------------------
// Stitch options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime stitching options, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct StitchOptions {
    pub section_prefix: String,
    pub toc_mode: TocMode,
    pub index_filename: String,
    pub require_single_title: bool,
    pub strict_links: bool,
    pub content_selectors: Vec<String>,
    pub disclaimer_selector: String,
    pub headings_selector: String,
    pub template_content_selector: String,
    pub chapter_class: String,
    pub toc_classes: Vec<String>,
    pub citations: bool,
    pub glossary_class: String,
    pub table_classes: Vec<String>,
    pub front_matter: Option<FrontMatter>,
}

impl From<&AppConfig> for StitchOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            section_prefix: config.stitch.section_prefix.clone(),
            toc_mode: config.stitch.toc_mode,
            index_filename: config.stitch.index_filename.clone(),
            require_single_title: config.stitch.require_single_title,
            strict_links: config.stitch.strict_links,
            content_selectors: config.selectors.content.clone(),
            disclaimer_selector: config.selectors.disclaimer.clone(),
            headings_selector: config.selectors.headings.clone(),
            template_content_selector: config.selectors.template_content.clone(),
            chapter_class: config.labels.chapter_class.clone(),
            toc_classes: config.labels.toc_classes.clone(),
            citations: config.enhance.citations,
            glossary_class: config.enhance.glossary_class.clone(),
            table_classes: config.enhance.table_classes.clone(),
            front_matter: config.front_matter.clone(),
        }
    }
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl StitchOptions {
    /// Synthesized anchor id for a document key.
    pub fn section_anchor(&self, key: &str) -> String {
        format!("{}{key}", self.section_prefix)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.stitchbook/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| StitchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.stitchbook/stitchbook.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config. A `stitchbook.toml` in the working directory
/// wins over the user config; defaults apply when neither exists.
pub fn load_config() -> Result<AppConfig> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return load_config_from(&local);
    }

    let path = config_file_path()?;
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StitchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| StitchError::config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StitchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StitchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StitchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject option values the pipeline cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let prefix = &config.stitch.section_prefix;
    if prefix.chars().any(|c| c.is_whitespace() || c == '#') {
        return Err(StitchError::config(format!(
            "section_prefix '{prefix}' must not contain whitespace or '#'"
        )));
    }

    let index = &config.stitch.index_filename;
    if index.is_empty() || index.contains('/') || index.contains('\\') {
        return Err(StitchError::config(format!(
            "index_filename '{index}' must be a bare file name"
        )));
    }

    if config.selectors.content.is_empty() {
        return Err(StitchError::config("selectors.content must list at least one selector"));
    }

    if config.labels.chapter_class.trim().is_empty() {
        return Err(StitchError::config("labels.chapter_class must not be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("section_prefix"));
        assert!(toml_str.contains("merge-time-populated"));
        assert!(!toml_str.contains("front_matter"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.stitch.section_prefix, "section-");
        assert_eq!(parsed.selectors.content[0], "div.main");
        assert_eq!(parsed.labels.toc_classes, vec!["list-block", "headings"]);
    }

    #[test]
    fn config_with_front_matter_and_mode() {
        let toml_str = r#"
[stitch]
toc_mode = "client-populated"
strict_links = false

[front_matter]
permalink = "/all/"
layout = "default"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.stitch.toc_mode, TocMode::ClientPopulated);
        assert!(!config.stitch.strict_links);
        assert!(config.stitch.require_single_title);
        let fm = config.front_matter.expect("front matter");
        assert_eq!(fm.permalink.as_deref(), Some("/all/"));
        assert_eq!(fm.root, None);
    }

    #[test]
    fn stitch_options_from_app_config() {
        let app = AppConfig::default();
        let opts = StitchOptions::from(&app);
        assert_eq!(opts.section_anchor("setup"), "section-setup");
        assert_eq!(opts.index_filename, "index.html");
        assert_eq!(opts.headings_selector, "div.headings");
        assert!(opts.citations);
    }

    #[test]
    fn toc_mode_parses_from_str() {
        assert_eq!("client-populated".parse::<TocMode>(), Ok(TocMode::ClientPopulated));
        assert_eq!("merge-time".parse::<TocMode>(), Ok(TocMode::MergeTimePopulated));
        assert!("sometimes".parse::<TocMode>().is_err());
    }

    #[test]
    fn validation_rejects_bad_prefix() {
        let mut config = AppConfig::default();
        config.stitch.section_prefix = "#sec".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("section_prefix"));
    }

    #[test]
    fn validation_rejects_index_path() {
        let mut config = AppConfig::default();
        config.stitch.index_filename = "pages/index.html".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("sb-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stitchbook.toml");
        std::fs::write(&path, "[stitch]\nsection_prefix = \"s-\"\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.stitch.section_prefix, "s-");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
