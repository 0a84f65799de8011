//! Cross-document link rewriting.
//!
//! Pages link to each other with parent-relative hrefs (`../setup/`,
//! `../setup/#s:install`) or, on multi-language sites, with language-rooted
//! absolute hrefs (`/en/setup/`). Once every page lives in one document those
//! hrefs must become in-page fragments.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use tracing::{debug, trace};

use stitchbook_shared::{DocKey, Result, StitchError};

use crate::SourceDocument;

/// `../<segment>/` with an optional `#fragment`.
static PARENT_RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.\./([^/#?]+)/(#.*)?$").expect("parent-relative regex")
});

static HREF_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));

/// Where an href points, once all pages are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Not a cross-document link; left alone.
    NoMatch,
    /// Names a fragment of another page; becomes that bare fragment (`#…`).
    Anchored(String),
    /// Names another page as a whole; becomes that page's section anchor.
    Section(String),
}

/// A link whose href was changed (or generated) while merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenLink {
    /// Page the link lives in.
    pub key: DocKey,
    /// Href before rewriting.
    pub original: String,
    /// In-page href after rewriting.
    pub href: String,
}

impl RewrittenLink {
    /// Fragment id the link must land on.
    pub fn target_id(&self) -> &str {
        self.href.trim_start_matches('#')
    }
}

/// Classifies and rewrites hrefs for one merge run.
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    section_prefix: String,
    language_re: Option<Regex>,
}

impl LinkRewriter {
    /// Create a rewriter. With a language code, `/<lang>/<segment>/` hrefs
    /// are treated as cross-document links too.
    pub fn new(section_prefix: impl Into<String>, language: Option<&str>) -> Result<Self> {
        let language_re = match language {
            Some(lang) => {
                if lang.is_empty() || lang.contains(['/', '#', '?']) {
                    return Err(StitchError::config(format!("invalid language code '{lang}'")));
                }
                let pattern = format!(r"^/{}/([^/#?]+)/(#.*)?$", regex::escape(lang));
                Some(Regex::new(&pattern).map_err(|e| {
                    StitchError::config(format!("invalid language pattern for '{lang}': {e}"))
                })?)
            }
            None => None,
        };

        Ok(Self {
            section_prefix: section_prefix.into(),
            language_re,
        })
    }

    /// Classify an href. The first matching case wins.
    pub fn classify(&self, href: &str) -> LinkTarget {
        let caps = PARENT_RELATIVE_RE
            .captures(href)
            .or_else(|| self.language_re.as_ref().and_then(|re| re.captures(href)));

        let Some(caps) = caps else {
            return LinkTarget::NoMatch;
        };

        let segment = &caps[1];
        if segment == "." || segment == ".." {
            return LinkTarget::NoMatch;
        }

        match caps.get(2).map(|m| m.as_str()) {
            Some(fragment) if fragment.len() > 1 => LinkTarget::Anchored(fragment.to_string()),
            _ => LinkTarget::Section(segment.to_string()),
        }
    }

    /// In-page href for a classified target, or `None` to leave it alone.
    pub fn resolve(&self, target: &LinkTarget) -> Option<String> {
        match target {
            LinkTarget::NoMatch => None,
            LinkTarget::Anchored(fragment) => Some(fragment.clone()),
            LinkTarget::Section(key) => Some(format!("#{}{key}", self.section_prefix)),
        }
    }

    /// Classify and resolve in one step.
    pub fn rewrite(&self, href: &str) -> Option<String> {
        self.resolve(&self.classify(href))
    }
}

/// Rewrite every cross-document href inside the page's content container.
pub(crate) fn rewrite_links(
    src: &mut SourceDocument,
    rewriter: &LinkRewriter,
) -> Result<Vec<RewrittenLink>> {
    let container = src.container();
    let key = src.key().clone();

    let pending: Vec<_> = {
        let doc = src.document();
        doc.select_within(container, &HREF_SEL)
            .into_iter()
            .filter_map(|id| {
                let original = doc.attr(id, "href")?.to_string();
                let href = rewriter.rewrite(&original)?;
                Some((id, original, href))
            })
            .collect()
    };

    let doc = src.document_mut();
    let mut rewritten = Vec::with_capacity(pending.len());
    for (id, original, href) in pending {
        doc.set_attr(id, "href", Some(&href))?;
        trace!(%key, %original, %href, "link rewritten");
        rewritten.push(RewrittenLink {
            key: key.clone(),
            original,
            href,
        });
    }

    debug!(%key, count = rewritten.len(), "links rewritten");
    Ok(rewritten)
}
