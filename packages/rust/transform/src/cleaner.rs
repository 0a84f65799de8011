//! Removes editorial-only markup and relabels the content container.

use scraper::Selector;
use tracing::debug;

use stitchbook_shared::Result;

use crate::SourceDocument;

/// Attribute naming the document a relabeled container came from.
pub const DATA_DOC_ATTR: &str = "data-doc";

/// Section cleaner for one merge run.
#[derive(Debug, Clone)]
pub struct SectionCleaner {
    disclaimer: Selector,
    placeholder: Selector,
    chapter_class: String,
}

impl SectionCleaner {
    pub fn new(disclaimer: Selector, placeholder: Selector, chapter_class: impl Into<String>) -> Self {
        Self {
            disclaimer,
            placeholder,
            chapter_class: chapter_class.into(),
        }
    }

    /// Strip disclaimers and heading placeholders from the container, then
    /// relabel it. Returns the number of nodes removed.
    ///
    /// Running it twice on the same page removes nothing the second time
    /// and leaves the tree unchanged.
    pub fn clean(&self, src: &mut SourceDocument) -> Result<usize> {
        let container = src.container();
        let key = src.key().to_string();

        let mut doomed = src.document().select_within(container, &self.disclaimer);
        for id in src.document().select_within(container, &self.placeholder) {
            if !doomed.contains(&id) {
                doomed.push(id);
            }
        }

        let doc = src.document_mut();
        for id in &doomed {
            doc.remove(*id);
        }

        let tag = match doc.tag_name(container) {
            Some("body") | None => "section".to_string(),
            Some(tag) => tag.to_string(),
        };
        let mut attrs: Vec<(String, String)> = doc
            .element(container)
            .map(|el| {
                el.value()
                    .attrs()
                    .filter(|(k, _)| *k != "class" && *k != DATA_DOC_ATTR)
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        attrs.push(("class".to_string(), self.chapter_class.clone()));
        attrs.push((DATA_DOC_ATTR.to_string(), key.clone()));
        doc.rebuild_element(container, &tag, &attrs)?;

        debug!(%key, removed = doomed.len(), "section cleaned");
        Ok(doomed.len())
    }
}
