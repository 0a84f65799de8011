//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use stitchbook_core::check::check_manifest;
use stitchbook_core::pipeline::{ProgressReporter, StitchReport, StitchRequest, stitch};
use stitchbook_shared::{
    AppConfig, StitchOptions, TocMode, init_config, load_config, load_config_from, load_manifest,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// stitchbook: merge lesson pages into a single document.
#[derive(Parser)]
#[command(
    name = "stitchbook",
    version,
    about = "Merge independently generated HTML lesson pages into one document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./stitchbook.toml, then ~/.stitchbook/stitchbook.toml).
    #[arg(long, global = true, env = "STITCHBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Merge every page listed in the manifest into a fresh document.
    Stitch {
        /// Manifest file (YAML, TOML or JSON).
        manifest: PathBuf,

        /// Site root holding one directory per page.
        root: PathBuf,

        /// Index page path, or a language code for multi-language sites.
        index_or_lang: String,

        /// Output file.
        dest: PathBuf,

        #[command(flatten)]
        overrides: StitchOverrides,
    },

    /// Merge every page listed in the manifest into a template.
    Fill {
        /// Manifest file (YAML, TOML or JSON).
        manifest: PathBuf,

        /// Site root holding one directory per page.
        root: PathBuf,

        /// Index page path.
        index: PathBuf,

        /// Template whose content container receives the pages.
        template: PathBuf,

        /// Output file.
        dest: PathBuf,

        #[command(flatten)]
        overrides: StitchOverrides,
    },

    /// Report manifest keys without a page and pages missing from the manifest.
    Check {
        /// Manifest file (YAML, TOML or JSON).
        manifest: PathBuf,

        /// Site root holding one directory per page.
        root: PathBuf,

        /// Language subdirectory to check.
        #[arg(long)]
        lang: Option<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags overriding config file values for a single run.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct StitchOverrides {
    /// TOC mode: merge-time-populated or client-populated.
    #[arg(long)]
    pub toc_mode: Option<TocMode>,

    /// Accept pages without exactly one title and keep dangling links.
    #[arg(long)]
    pub lenient: bool,
}

impl StitchOverrides {
    fn apply(&self, opts: &mut StitchOptions) {
        if let Some(mode) = self.toc_mode {
            opts.toc_mode = mode;
        }
        if self.lenient {
            opts.require_single_title = false;
            opts.strict_links = false;
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Third positional argument of `stitch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IndexOrLanguage {
    Index(PathBuf),
    Language(String),
}

impl IndexOrLanguage {
    /// A value that looks like a path (contains `/` or `.`) or names an
    /// existing file is an index page; anything else is a language code.
    pub(crate) fn parse(raw: &str) -> Self {
        if raw.contains(['/', '.']) || Path::new(raw).is_file() {
            Self::Index(PathBuf::from(raw))
        } else {
            Self::Language(raw.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "stitchbook=info",
        1 => "stitchbook=debug",
        _ => "stitchbook=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Stitch {
            manifest,
            root,
            index_or_lang,
            dest,
            overrides,
        } => {
            let (index, language) = match IndexOrLanguage::parse(&index_or_lang) {
                IndexOrLanguage::Index(path) => (Some(path), None),
                IndexOrLanguage::Language(lang) => (None, Some(lang)),
            };
            cmd_stitch(
                config_path.as_deref(),
                &manifest,
                root,
                index,
                None,
                dest,
                language,
                &overrides,
            )
        }
        Command::Fill {
            manifest,
            root,
            index,
            template,
            dest,
            overrides,
        } => cmd_stitch(
            config_path.as_deref(),
            &manifest,
            root,
            Some(index),
            Some(template),
            dest,
            None,
            &overrides,
        ),
        Command::Check {
            manifest,
            root,
            lang,
            json,
        } => cmd_check(config_path.as_deref(), &manifest, &root, lang.as_deref(), json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn cmd_stitch(
    config_path: Option<&Path>,
    manifest: &Path,
    root_dir: PathBuf,
    index: Option<PathBuf>,
    template: Option<PathBuf>,
    dest: PathBuf,
    language: Option<String>,
    overrides: &StitchOverrides,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut opts = StitchOptions::from(&config);
    overrides.apply(&mut opts);

    let manifest = load_manifest(manifest)?;

    info!(
        title = manifest.title(),
        root = %root_dir.display(),
        dest = %dest.display(),
        template = template.is_some(),
        "stitching documents"
    );

    let request = StitchRequest {
        manifest,
        root_dir,
        index,
        template,
        dest,
        language,
    };

    // Set up progress reporting
    let reporter = CliProgress::new();

    let report = stitch(&request, &opts, &reporter).inspect_err(|_| reporter.abandon())?;

    // Print summary
    println!();
    println!("  Document stitched successfully!");
    println!("  Output:    {}", report.dest.display());
    println!("  Documents: {}", report.documents);
    println!("  Sections:  {}", report.toc.entries.len());
    println!("  Links:     {}", report.links_rewritten);
    println!("  Size:      {} bytes", report.bytes);
    println!("  SHA-256:   {}", report.sha256);
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_check(
    config_path: Option<&Path>,
    manifest: &Path,
    root: &Path,
    lang: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let manifest = load_manifest(manifest)?;
    let report = check_manifest(&manifest, root, lang, &config.stitch.index_filename)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.is_clean() {
        println!("manifest and pages agree");
        return Ok(());
    }
    print_section("in manifest but no file", &report.missing_files);
    print_section("file but not in manifest", &report.unlisted_files);
    Ok(())
}

fn print_section(title: &str, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    println!("{title}");
    for key in keys {
        println!("  {key}");
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn abandon(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_merged(&self, key: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Merging [{current}/{total}] {key}"));
    }

    fn done(&self, _report: &StitchReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_argument_path_or_language() {
        assert_eq!(
            IndexOrLanguage::parse("site/index.html"),
            IndexOrLanguage::Index(PathBuf::from("site/index.html"))
        );
        assert_eq!(
            IndexOrLanguage::parse("index.html"),
            IndexOrLanguage::Index(PathBuf::from("index.html"))
        );
        assert_eq!(
            IndexOrLanguage::parse("en"),
            IndexOrLanguage::Language("en".into())
        );
    }

    #[test]
    fn parses_stitch_with_overrides() {
        let cli = Cli::try_parse_from([
            "stitchbook",
            "-vv",
            "stitch",
            "manifest.yml",
            "site",
            "en",
            "all.html",
            "--toc-mode",
            "client",
            "--lenient",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);

        let Command::Stitch { index_or_lang, overrides, .. } = cli.command else {
            panic!("expected stitch");
        };
        assert_eq!(index_or_lang, "en");

        let mut opts = StitchOptions::default();
        overrides.apply(&mut opts);
        assert_eq!(opts.toc_mode, TocMode::ClientPopulated);
        assert!(!opts.require_single_title);
        assert!(!opts.strict_links);
    }

    #[test]
    fn fill_requires_template_and_dest() {
        assert!(Cli::try_parse_from(["stitchbook", "fill", "m.yml", "site", "index.html"]).is_err());
        assert!(
            Cli::try_parse_from([
                "stitchbook",
                "fill",
                "m.yml",
                "site",
                "index.html",
                "template.html",
                "all.html"
            ])
            .is_ok()
        );
    }
}
