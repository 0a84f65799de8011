//! Destination document assembler.
//!
//! Owns the single output tree, relocates transformed pages into its main
//! container, renders it (optionally as a front-matter page for a static-site
//! layout) and writes it to disk atomically.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ego_tree::NodeId;
use scraper::Selector;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use stitchbook_dom::{Document, compile_selector, escape_text};
use stitchbook_shared::{FrontMatter, Result, StitchError, StitchOptions};
use stitchbook_transform::SourceDocument;

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("head > title").expect("title selector"));
static FRESH_MAIN_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.main").expect("main selector"));

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// The merged output document.
#[derive(Debug)]
pub struct Destination {
    doc: Document,
    main: NodeId,
    placeholder: Selector,
    absorbed: usize,
}

impl Destination {
    /// A minimal HTML5 page whose main container is an empty `div.main`.
    pub fn fresh(title: &str, opts: &StitchOptions) -> Result<Self> {
        let markup = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<div class=\"main\"></div>\n</body>\n</html>\n",
            escape_text(title)
        );
        let doc = Document::parse(&markup);
        let main = doc
            .select_first(&FRESH_MAIN_SEL)
            .ok_or_else(|| StitchError::parse("fresh destination lacks its main container"))?;

        debug!(title, "fresh destination created");
        Ok(Self {
            doc,
            main,
            placeholder: placeholder_selector(opts)?,
            absorbed: 0,
        })
    }

    /// Use template markup as the destination. Its content container is
    /// emptied and its `<title>`, if any, set to `title`.
    pub fn from_template(markup: &str, title: &str, opts: &StitchOptions) -> Result<Self> {
        let container = compile_selector(&opts.template_content_selector)
            .map_err(|e| StitchError::config(e.to_string()))?;

        let mut doc = Document::parse(markup);
        let main = doc.select_first(&container).ok_or_else(|| {
            StitchError::parse(format!(
                "template has no element matching '{}'",
                opts.template_content_selector
            ))
        })?;
        doc.clear_children(main);

        if let Some(title_el) = doc.select_first(&TITLE_SEL) {
            doc.clear_children(title_el);
            doc.append_html(title_el, &escape_text(title));
        }

        debug!(title, "template destination prepared");
        Ok(Self {
            doc,
            main,
            placeholder: placeholder_selector(opts)?,
            absorbed: 0,
        })
    }

    /// Read a template file and prepare it as the destination.
    pub fn load_template(path: &Path, title: &str, opts: &StitchOptions) -> Result<Self> {
        let markup = std::fs::read_to_string(path).map_err(|e| StitchError::io(path, e))?;
        Self::from_template(&markup, title, opts)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// The main content container receiving relocated pages.
    pub fn main(&self) -> NodeId {
        self.main
    }

    /// Number of pages absorbed so far.
    pub fn absorbed(&self) -> usize {
        self.absorbed
    }

    /// Relocate a transformed page's content container to the end of the
    /// main container. The source page is consumed.
    pub fn absorb(&mut self, src: SourceDocument) -> Result<NodeId> {
        let (key, doc, container) = src.into_parts();
        let id = self.doc.adopt(self.main, &doc, container).ok_or_else(|| {
            StitchError::parse(format!("cannot relocate content of '{key}'"))
        })?;
        self.absorbed += 1;
        debug!(%key, position = self.absorbed, "document absorbed");
        Ok(id)
    }

    /// Remove every headings placeholder except `keep` (the generated TOC).
    pub fn remove_orphaned_placeholders(&mut self, keep: Option<NodeId>) -> usize {
        let orphans: Vec<NodeId> = self
            .doc
            .select_ids(&self.placeholder)
            .into_iter()
            .filter(|id| Some(*id) != keep)
            .collect();

        for id in &orphans {
            self.doc.remove(*id);
        }
        if !orphans.is_empty() {
            debug!(removed = orphans.len(), "orphaned placeholders removed");
        }
        orphans.len()
    }

    /// Serialize the destination.
    ///
    /// With front matter only the main container is emitted, headed by the
    /// `---` block; the layout supplies the rest of the page.
    pub fn render(&self, front_matter: Option<&FrontMatter>) -> String {
        match front_matter {
            Some(fm) => {
                let mut out = String::from("---\n");
                for (name, value) in [
                    ("permalink", &fm.permalink),
                    ("layout", &fm.layout),
                    ("root", &fm.root),
                ] {
                    if let Some(value) = value {
                        out.push_str(&format!("{name}: \"{}\"\n", escape_yaml_string(value)));
                    }
                }
                out.push_str("---\n");
                out.push_str(&self.doc.outer_html(self.main));
                out.push('\n');
                out
            }
            None => self.doc.to_html(),
        }
    }
}

/// Escape a value for a double-quoted YAML scalar.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn placeholder_selector(opts: &StitchOptions) -> Result<Selector> {
    compile_selector(&opts.headings_selector).map_err(|e| StitchError::config(e.to_string()))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Metadata for the written output file.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Write `content` to `path` atomically: a temp file beside the target is
/// written first, then renamed over it.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_atomic(path: &Path, content: &str) -> Result<WrittenFile> {
    let file_name = path
        .file_name()
        .ok_or_else(|| StitchError::config(format!("destination {path:?} is not a file path")))?
        .to_string_lossy()
        .into_owned();

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| StitchError::io(&dir, e))?;

    let temp = dir.join(format!(".{file_name}.tmp"));

    // Write to temp file first, then rename; a failure at either step
    // leaves no temp file behind
    let written = std::fs::write(&temp, content)
        .map_err(|e| StitchError::io(&temp, e))
        .and_then(|()| std::fs::rename(&temp, path).map_err(|e| StitchError::io(path, e)));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    debug!(size = content.len(), "wrote output");

    Ok(WrittenFile {
        path: path.to_path_buf(),
        sha256: hash,
        size_bytes: content.len(),
    })
}
