//! Mutable HTML document layer over `scraper`.
//!
//! [`Document`] owns a parsed `scraper::Html` tree and exposes the handful of
//! operations the stitcher needs: scoped selection by CSS selector, element
//! synthesis and attribute edits, node removal, markup insertion, copying a
//! subtree out of another document, and serialization.
//!
//! Nodes are addressed by `ego_tree::NodeId`. Removed nodes are detached from
//! the tree and never reached by selection or serialization again.

mod edit;

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

use stitchbook_shared::{Result, StitchError};

pub use edit::{escape_attr, escape_text};

/// A parsed HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
}

/// Compile a CSS selector, reporting syntax errors as parse errors.
pub fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| StitchError::parse(format!("invalid selector '{selector}': {e:?}")))
}

impl Document {
    /// Parse a full HTML document.
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// Borrow the underlying `scraper` tree.
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// The `<html>` element.
    pub fn root_element(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// Element for a node id, if it is an element of this document.
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    /// All attached elements matching `selector`, in document order.
    pub fn select_ids(&self, selector: &Selector) -> Vec<NodeId> {
        self.root_element().select(selector).map(|el| el.id()).collect()
    }

    /// First attached element matching `selector`.
    pub fn select_first(&self, selector: &Selector) -> Option<NodeId> {
        self.root_element().select(selector).next().map(|el| el.id())
    }

    /// First element matching any of `selectors`, trying them in order.
    pub fn first_matching(&self, selectors: &[Selector]) -> Option<NodeId> {
        selectors.iter().find_map(|sel| self.select_first(sel))
    }

    /// Descendants of `scope` (excluding `scope` itself) matching `selector`.
    pub fn select_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        match self.element(scope) {
            Some(el) => el.select(selector).map(|e| e.id()).collect(),
            None => Vec::new(),
        }
    }

    /// Tag name of an element node.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.html
            .tree
            .get(id)
            .and_then(|n| n.value().as_element())
            .map(|el| el.name())
    }

    /// Attribute value of an element node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.html
            .tree
            .get(id)
            .and_then(|n| n.value().as_element())
            .and_then(|el| el.attr(name))
    }

    /// Concatenated text content of a node.
    pub fn text(&self, id: NodeId) -> String {
        self.element(id)
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default()
    }

    /// Serialized children of an element.
    pub fn inner_html(&self, id: NodeId) -> String {
        self.element(id).map(|el| el.inner_html()).unwrap_or_default()
    }

    /// Serialized element including its own tags.
    pub fn outer_html(&self, id: NodeId) -> String {
        self.element(id).map(|el| el.html()).unwrap_or_default()
    }

    /// Every `id` attribute value present in the attached tree.
    pub fn anchor_ids(&self) -> HashSet<String> {
        self.root_element()
            .descendants()
            .filter_map(|n| n.value().as_element())
            .filter_map(|el| el.attr("id"))
            .map(String::from)
            .collect()
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.html.html()
    }
}
