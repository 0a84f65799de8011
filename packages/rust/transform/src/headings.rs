//! Heading normalization.
//!
//! Shifts every heading of a page one level down so the page can be embedded
//! as a subsection: `h1` → `h2` (gains the per-document anchor), `h2` → `h3`
//! (keeps its id), `h3` → `h4` (loses its generated id).

use std::sync::LazyLock;

use ego_tree::NodeId;
use scraper::Selector;
use tracing::{debug, warn};

use stitchbook_shared::{Result, StitchError, StitchOptions};

use crate::SourceDocument;

static H1_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("h1 selector"));
static H2_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").expect("h2 selector"));
static H3_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").expect("h3 selector"));
static ID_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[id]").expect("id selector"));

/// What the normalizer did to one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadingReport {
    /// Anchor assigned to the page title, if the page has one.
    pub anchor: Option<String>,
    /// Number of headings shifted.
    pub shifted: usize,
}

/// Shift the headings inside the page's content container.
///
/// With `require_single_title` the page must hold exactly one `h1`. Without
/// it, a page with no `h1` contributes no anchor, and only the first of
/// several `h1`s receives the anchor.
pub(crate) fn normalize_headings(
    src: &mut SourceDocument,
    opts: &StitchOptions,
) -> Result<HeadingReport> {
    let key = src.key().to_string();
    let container = src.container();
    let anchor = opts.section_anchor(&key);
    let require_single_title = opts.require_single_title;

    // Collect by original level first so nothing is shifted twice.
    let doc = src.document();
    let titles = doc.select_within(container, &H1_SEL);
    let sections = doc.select_within(container, &H2_SEL);
    let subsections = doc.select_within(container, &H3_SEL);

    match titles.len() {
        1 => {}
        0 if require_single_title => {
            return Err(StitchError::structure(&key, "page has no <h1> title"));
        }
        0 => warn!(%key, "page has no <h1>; it will not appear in the table of contents"),
        n if require_single_title => {
            return Err(StitchError::structure(
                &key,
                format!("expected exactly one <h1>, found {n}"),
            ));
        }
        n => warn!(%key, count = n, "page has several <h1>; only the first is anchored"),
    }

    let doc = src.document_mut();

    for id in &subsections {
        shift(doc, *id, "h4", IdRule::Drop)?;
    }
    for id in &sections {
        shift(doc, *id, "h3", IdRule::Keep)?;
    }
    for (i, id) in titles.iter().enumerate() {
        let rule = if i == 0 {
            IdRule::Set(&anchor)
        } else {
            IdRule::Keep
        };
        shift(doc, *id, "h2", rule)?;
    }

    let title = titles.first().copied();
    if let Some(title) = title {
        ensure_unique_anchor(src, title, &anchor)?;
    }

    let shifted = titles.len() + sections.len() + subsections.len();
    debug!(%key, shifted, anchored = title.is_some(), "headings normalized");

    Ok(HeadingReport {
        anchor: title.map(|_| anchor),
        shifted,
    })
}

enum IdRule<'a> {
    Keep,
    Drop,
    Set(&'a str),
}

fn shift(doc: &mut stitchbook_dom::Document, id: NodeId, tag: &str, rule: IdRule<'_>) -> Result<()> {
    let mut attrs: Vec<(String, String)> = doc
        .element(id)
        .map(|el| {
            el.value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    match rule {
        IdRule::Keep => {}
        IdRule::Drop => attrs.retain(|(k, _)| k != "id"),
        IdRule::Set(anchor) => {
            attrs.retain(|(k, _)| k != "id");
            attrs.insert(0, ("id".to_string(), anchor.to_string()));
        }
    }

    doc.rebuild_element(id, tag, &attrs)
}

/// No node other than the title may carry the synthesized anchor.
fn ensure_unique_anchor(src: &SourceDocument, title: NodeId, anchor: &str) -> Result<()> {
    let doc = src.document();
    let clash = doc
        .select_within(src.container(), &ID_SEL)
        .into_iter()
        .any(|id| id != title && doc.attr(id, "id") == Some(anchor));

    if clash {
        return Err(StitchError::structure(
            src.key().as_str(),
            format!("id '{anchor}' is already used inside the page"),
        ));
    }
    Ok(())
}
