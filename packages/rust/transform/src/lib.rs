//! Per-document transforms applied before a page is merged.
//!
//! A [`Transformer`] holds the compiled selectors and patterns for one run
//! and applies, in order: heading normalization, cross-document link
//! rewriting, special-link enhancement and section cleaning. The cleaner
//! always runs last so removed nodes never reach the merged output.

mod cleaner;
mod enhance;
mod headings;
mod links;
mod source;

use std::path::Path;

use scraper::Selector;
use tracing::{debug, instrument};

use stitchbook_dom::compile_selector;
use stitchbook_shared::{DocKey, Result, StitchError, StitchOptions};

pub use cleaner::{DATA_DOC_ATTR, SectionCleaner};
pub use enhance::{CITATION_HREF, EnhanceReport, EnhanceSettings, GLOSSARY_PREFIX};
pub use headings::HeadingReport;
pub use links::{LinkRewriter, LinkTarget, RewrittenLink};
pub use source::SourceDocument;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// What the transforms did to one page.
#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    pub headings: HeadingReport,
    /// Rewritten cross-document links plus generated bibliography links.
    pub links: Vec<RewrittenLink>,
    pub enhance: EnhanceReport,
    /// Editorial nodes removed by the cleaner.
    pub removed: usize,
}

impl TransformReport {
    /// Anchor of the page's top-level section, if it has a title.
    pub fn anchor(&self) -> Option<&str> {
        self.headings.anchor.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Transformer
// ---------------------------------------------------------------------------

/// Compiled transform pipeline for one merge run.
#[derive(Debug, Clone)]
pub struct Transformer {
    content_selectors: Vec<Selector>,
    opts: StitchOptions,
    rewriter: LinkRewriter,
    enhance: EnhanceSettings,
    cleaner: SectionCleaner,
}

impl Transformer {
    /// Compile selectors and link patterns. Invalid selectors or language
    /// codes are configuration errors.
    pub fn new(opts: &StitchOptions, language: Option<&str>) -> Result<Self> {
        if opts.content_selectors.is_empty() {
            return Err(StitchError::config("selectors.content must not be empty"));
        }
        let content_selectors = opts
            .content_selectors
            .iter()
            .map(|s| compile_config_selector(s))
            .collect::<Result<Vec<_>>>()?;

        let cleaner = SectionCleaner::new(
            compile_config_selector(&opts.disclaimer_selector)?,
            compile_config_selector(&opts.headings_selector)?,
            opts.chapter_class.clone(),
        );

        Ok(Self {
            content_selectors,
            rewriter: LinkRewriter::new(opts.section_prefix.clone(), language)?,
            enhance: EnhanceSettings {
                citations: opts.citations,
                glossary_class: opts.glossary_class.clone(),
                table_classes: opts.table_classes.clone(),
            },
            cleaner,
            opts: opts.clone(),
        })
    }

    /// Read a page from disk and locate its content container.
    pub fn load(&self, key: DocKey, path: &Path) -> Result<SourceDocument> {
        SourceDocument::load(key, path, &self.content_selectors)
    }

    /// Parse page markup already in memory.
    pub fn parse(&self, key: DocKey, path: &Path, markup: &str) -> Result<SourceDocument> {
        SourceDocument::parse(key, path, markup, &self.content_selectors)
    }

    /// Apply every transform to the page, in order.
    #[instrument(skip_all, fields(key = %src.key(), path = %src.path().display()))]
    pub fn apply(&self, src: &mut SourceDocument) -> Result<TransformReport> {
        let headings = headings::normalize_headings(src, &self.opts)?;
        let mut links = links::rewrite_links(src, &self.rewriter)?;
        let enhance = enhance::enhance(src, &self.enhance, &mut links)?;
        let removed = self.cleaner.clean(src)?;

        debug!(
            anchored = headings.anchor.is_some(),
            links = links.len(),
            removed,
            "document transformed"
        );

        Ok(TransformReport {
            headings,
            links,
            enhance,
            removed,
        })
    }
}

fn compile_config_selector(selector: &str) -> Result<Selector> {
    compile_selector(selector).map_err(|e| StitchError::config(e.to_string()))
}
