//! A source page loaded for one merge step.

use std::path::{Path, PathBuf};

use ego_tree::NodeId;
use scraper::Selector;
use tracing::debug;

use stitchbook_dom::Document;
use stitchbook_shared::{DocKey, Result, StitchError};

/// One parsed source page plus the content container that will be merged.
#[derive(Debug)]
pub struct SourceDocument {
    key: DocKey,
    path: PathBuf,
    doc: Document,
    container: NodeId,
}

impl SourceDocument {
    /// Parse page markup and locate its content container, trying
    /// `content_selectors` in order.
    pub fn parse(
        key: DocKey,
        path: impl Into<PathBuf>,
        markup: &str,
        content_selectors: &[Selector],
    ) -> Result<Self> {
        let doc = Document::parse(markup);
        let container = doc.first_matching(content_selectors).ok_or_else(|| {
            StitchError::structure(key.as_str(), "no content container found in page")
        })?;

        Ok(Self {
            key,
            path: path.into(),
            doc,
            container,
        })
    }

    /// Read and parse a page from disk.
    pub fn load(key: DocKey, path: &Path, content_selectors: &[Selector]) -> Result<Self> {
        let markup = std::fs::read_to_string(path)
            .map_err(|e| StitchError::source_load(key.as_str(), path, e))?;
        debug!(key = %key, path = %path.display(), bytes = markup.len(), "source loaded");
        Self::parse(key, path, &markup, content_selectors)
    }

    pub fn key(&self) -> &DocKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The content container relocated into the destination.
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Consume the page, handing its tree and container to the caller.
    pub fn into_parts(self) -> (DocKey, Document, NodeId) {
        (self.key, self.doc, self.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchbook_dom::compile_selector;

    fn selectors() -> Vec<Selector> {
        ["div.main", "body"]
            .iter()
            .map(|s| compile_selector(s).unwrap())
            .collect()
    }

    #[test]
    fn parse_finds_preferred_container() {
        let page = r#"<body><nav>x</nav><div class="main"><h1>T</h1></div></body>"#;
        let src = SourceDocument::parse(DocKey::parse("t").unwrap(), "t/index.html", page, &selectors())
            .unwrap();
        assert_eq!(src.document().attr(src.container(), "class"), Some("main"));
    }

    #[test]
    fn parse_falls_back_to_body() {
        let page = "<body><h1>T</h1></body>";
        let src = SourceDocument::parse(DocKey::parse("t").unwrap(), "t/index.html", page, &selectors())
            .unwrap();
        assert_eq!(src.document().tag_name(src.container()), Some("body"));
    }

    #[test]
    fn parse_without_container_is_structure_error() {
        let only_main = vec![compile_selector("div.main").unwrap()];
        let err = SourceDocument::parse(DocKey::parse("t").unwrap(), "t/index.html", "<p>x</p>", &only_main)
            .unwrap_err();
        assert!(matches!(err, StitchError::Structure { .. }));
    }

    #[test]
    fn load_missing_file_is_source_load_error() {
        let path = std::env::temp_dir()
            .join(format!("sb-missing-{}", uuid::Uuid::now_v7()))
            .join("index.html");
        let err = SourceDocument::load(DocKey::parse("gone").unwrap(), &path, &selectors()).unwrap_err();
        assert!(matches!(err, StitchError::SourceLoad { ref key, .. } if key == "gone"));
    }
}
