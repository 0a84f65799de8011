//! Tree mutations for [`Document`].
//!
//! `scraper` elements cache their id and class lists, so attributes are never
//! patched in place: an edited element is synthesized afresh by parsing its
//! start tag and swapped into the node, which keeps the node's children.
//! New content is parsed as a fragment and copied node by node into the tree.

use ego_tree::{NodeId, NodeRef};
use scraper::node::Element;
use scraper::{Html, Node, Selector};
use tracing::trace;

use stitchbook_shared::{Result, StitchError};

use crate::Document;

/// Escape text for use inside element content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for use inside a double-quoted attribute value.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Tag names are supplied by callers and must be plain identifiers.
fn is_valid_tag(name: &str) -> bool {
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}

/// Attribute names mostly come from parsed pages, so anything the tokenizer
/// reads back as a single name is accepted (`@click`, `data-x.y`, ...).
fn is_valid_attr_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '='))
}

/// Build a standalone element with the given tag and attributes.
fn synthesize_element(tag: &str, attrs: &[(String, String)]) -> Result<Element> {
    if !is_valid_tag(tag) {
        return Err(StitchError::parse(format!("invalid tag name '{tag}'")));
    }

    let mut open = format!("<{tag}");
    for (name, value) in attrs {
        if !is_valid_attr_name(name) {
            return Err(StitchError::parse(format!("invalid attribute name '{name}'")));
        }
        open.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
    }
    open.push('>');

    let markup = if tag.eq_ignore_ascii_case("body") {
        format!("<!DOCTYPE html><html><head></head>{open}</body></html>")
    } else {
        format!("<!DOCTYPE html><html><head></head><body>{open}</{tag}></body></html>")
    };

    let parsed = Html::parse_document(&markup);
    let selector = Selector::parse(tag)
        .map_err(|e| StitchError::parse(format!("invalid tag name '{tag}': {e:?}")))?;

    parsed
        .root_element()
        .select(&selector)
        .next()
        .map(|el| el.value().clone())
        .ok_or_else(|| StitchError::parse(format!("cannot synthesize <{tag}> element")))
}

impl Document {
    fn element_parts(&self, id: NodeId) -> Result<(String, Vec<(String, String)>)> {
        let el = self
            .element(id)
            .ok_or_else(|| StitchError::parse("node is not an element of this document"))?;
        let name = el.value().name().to_string();
        let attrs = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Ok((name, attrs))
    }

    /// Replace an element's tag and attribute set, keeping its children.
    pub fn rebuild_element(
        &mut self,
        id: NodeId,
        tag: &str,
        attrs: &[(String, String)],
    ) -> Result<()> {
        let element = synthesize_element(tag, attrs)?;
        let mut node = self
            .html
            .tree
            .get_mut(id)
            .ok_or_else(|| StitchError::parse("node is not part of this document"))?;
        *node.value() = Node::Element(element);
        trace!(tag, "element rebuilt");
        Ok(())
    }

    /// Change an element's tag, keeping attributes and children.
    pub fn rename(&mut self, id: NodeId, tag: &str) -> Result<()> {
        let (_, attrs) = self.element_parts(id)?;
        self.rebuild_element(id, tag, &attrs)
    }

    /// Set (`Some`) or remove (`None`) a single attribute.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: Option<&str>) -> Result<()> {
        let (tag, mut attrs) = self.element_parts(id)?;
        attrs.retain(|(k, _)| k != name);
        if let Some(value) = value {
            attrs.push((name.to_string(), value.to_string()));
        }
        self.rebuild_element(id, &tag, &attrs)
    }

    /// Add classes not already present on an element.
    pub fn add_classes(&mut self, id: NodeId, classes: &[String]) -> Result<()> {
        let mut current: Vec<String> = self
            .attr(id, "class")
            .map(|c| c.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        let before = current.len();
        for class in classes {
            if !current.iter().any(|c| c == class) {
                current.push(class.clone());
            }
        }
        if current.len() == before {
            return Ok(());
        }

        self.set_attr(id, "class", Some(&current.join(" ")))
    }

    /// Detach a node (and its subtree) from the document.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(id) {
            node.detach();
        }
    }

    /// Detach every child of a node.
    pub fn clear_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match self.html.tree.get(id) {
            Some(node) => node.children().map(|c| c.id()).collect(),
            None => return,
        };
        for child in children {
            self.remove(child);
        }
    }

    /// Parse `markup` as a fragment and append its nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, markup: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(markup);
        let mut ids = Vec::new();
        for child in fragment.root_element().children() {
            if let Some(id) = self.copy_into(parent, child) {
                ids.push(id);
            }
        }
        ids
    }

    /// Parse `markup` as a fragment and insert its nodes right after `anchor`.
    pub fn insert_html_after(&mut self, anchor: NodeId, markup: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(markup);
        let mut after = anchor;
        let mut ids = Vec::new();

        for child in fragment.root_element().children() {
            let Some(mut node) = self.html.tree.get_mut(after) else {
                break;
            };
            let new_id = node.insert_after(child.value().clone()).id();
            for grandchild in child.children() {
                self.copy_into(new_id, grandchild);
            }
            ids.push(new_id);
            after = new_id;
        }
        ids
    }

    /// Replace a node with the nodes parsed from `markup`.
    pub fn replace_with_html(&mut self, id: NodeId, markup: &str) -> Vec<NodeId> {
        let ids = self.insert_html_after(id, markup);
        self.remove(id);
        ids
    }

    /// Copy the subtree rooted at `node` of `source` under `parent`.
    ///
    /// Returns the id of the copy's root in this document.
    pub fn adopt(&mut self, parent: NodeId, source: &Document, node: NodeId) -> Option<NodeId> {
        let src = source.html.tree.get(node)?;
        self.copy_into(parent, src)
    }

    fn copy_into(&mut self, parent: NodeId, src: NodeRef<'_, Node>) -> Option<NodeId> {
        let mut target = self.html.tree.get_mut(parent)?;
        let new_id = target.append(src.value().clone()).id();
        for child in src.children() {
            self.copy_into(new_id, child);
        }
        Some(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_selector;

    fn first(doc: &Document, sel: &str) -> NodeId {
        doc.select_first(&compile_selector(sel).unwrap())
            .unwrap_or_else(|| panic!("no match for {sel}"))
    }

    #[test]
    fn rename_keeps_children_and_attributes() {
        let mut doc =
            Document::parse(r#"<body><h1 class="title">Hello <em>there</em></h1></body>"#);
        let h1 = first(&doc, "h1");
        doc.rename(h1, "h2").unwrap();

        assert!(doc.select_first(&compile_selector("h1").unwrap()).is_none());
        let h2 = first(&doc, "h2");
        assert_eq!(h2, h1);
        assert_eq!(doc.attr(h2, "class"), Some("title"));
        assert_eq!(doc.inner_html(h2), "Hello <em>there</em>");
    }

    #[test]
    fn set_attr_replaces_and_removes() {
        let mut doc = Document::parse(r#"<body><a href="../x/" title="t">x</a></body>"#);
        let a = first(&doc, "a");

        doc.set_attr(a, "href", Some("#section-x")).unwrap();
        assert_eq!(doc.attr(a, "href"), Some("#section-x"));
        assert_eq!(doc.attr(a, "title"), Some("t"));

        doc.set_attr(a, "title", None).unwrap();
        assert_eq!(doc.attr(a, "title"), None);
    }

    #[test]
    fn set_attr_escapes_values() {
        let mut doc = Document::parse("<body><p>x</p></body>");
        let p = first(&doc, "p");
        doc.set_attr(p, "data-note", Some("a \"quoted\" & <b>")).unwrap();
        assert_eq!(doc.attr(p, "data-note"), Some("a \"quoted\" & <b>"));
    }

    #[test]
    fn rebuilt_element_is_visible_to_class_selectors() {
        let mut doc = Document::parse(r#"<body><div class="main">x</div></body>"#);
        let div = first(&doc, "div.main");
        doc.set_attr(div, "class", Some("chapter")).unwrap();

        assert!(doc.select_first(&compile_selector("div.main").unwrap()).is_none());
        assert_eq!(first(&doc, "div.chapter"), div);
    }

    #[test]
    fn body_can_be_rebuilt_as_section() {
        let mut doc = Document::parse("<body><p>x</p></body>");
        let body = first(&doc, "body");
        doc.rebuild_element(body, "section", &[("class".into(), "chapter".into())])
            .unwrap();
        assert_eq!(doc.tag_name(body), Some("section"));
        assert_eq!(doc.inner_html(body), "<p>x</p>");
    }

    #[test]
    fn unusual_parsed_attribute_names_survive_rebuild() {
        let mut doc = Document::parse(
            r#"<body><h1 data-pagefind.meta="title" @click="open()" :class="x">Intro</h1></body>"#,
        );
        let h1 = first(&doc, "h1");
        doc.rename(h1, "h2").unwrap();
        doc.set_attr(h1, "id", Some("section-intro")).unwrap();

        assert_eq!(doc.tag_name(h1), Some("h2"));
        assert_eq!(doc.attr(h1, "data-pagefind.meta"), Some("title"));
        assert_eq!(doc.attr(h1, "@click"), Some("open()"));
        assert_eq!(doc.attr(h1, ":class"), Some("x"));
        assert_eq!(doc.attr(h1, "id"), Some("section-intro"));
    }

    #[test]
    fn attribute_names_that_break_the_start_tag_are_rejected() {
        let mut doc = Document::parse("<body><p>x</p></body>");
        let p = first(&doc, "p");
        for bad in ["", "a b", "a=b", "a>b", "a\"b", "a/b"] {
            let err = doc.set_attr(p, bad, Some("v")).unwrap_err();
            assert!(matches!(err, StitchError::Parse { .. }), "{bad:?} accepted");
        }
        assert!(doc.rename(p, "p q").is_err());
    }

    #[test]
    fn add_classes_skips_existing() {
        let mut doc = Document::parse(r#"<body><table class="table"></table></body>"#);
        let table = first(&doc, "table");
        doc.add_classes(table, &["table".into(), "table-striped".into()])
            .unwrap();
        assert_eq!(doc.attr(table, "class"), Some("table table-striped"));
    }

    #[test]
    fn removed_nodes_are_not_selected_or_serialized() {
        let mut doc =
            Document::parse(r#"<body><div class="disclaimer">draft</div><p>keep</p></body>"#);
        let note = first(&doc, "div.disclaimer");
        doc.remove(note);

        let body = first(&doc, "body");
        assert_eq!(doc.inner_html(body), "<p>keep</p>");
        assert!(doc.select_first(&compile_selector("div.disclaimer").unwrap()).is_none());
        assert!(!doc.to_html().contains("draft"));
        assert!(doc.to_html().contains("keep"));
    }

    #[test]
    fn insert_html_after_preserves_order() {
        let mut doc = Document::parse("<body><h1>T</h1><p>after</p></body>");
        let h1 = first(&doc, "h1");
        let ids = doc.insert_html_after(h1, "<div class=\"toc\"></div><hr>");
        assert_eq!(ids.len(), 2);

        let body = first(&doc, "body");
        let inner = doc.inner_html(body);
        let toc_at = inner.find("class=\"toc\"").unwrap();
        let hr_at = inner.find("<hr>").unwrap();
        let p_at = inner.find("<p>after</p>").unwrap();
        assert!(toc_at < hr_at && hr_at < p_at);
    }

    #[test]
    fn append_html_and_clear_children() {
        let mut doc = Document::parse(r#"<body><div class="main"><p>old</p></div></body>"#);
        let main = first(&doc, "div.main");
        doc.clear_children(main);
        doc.append_html(main, "<ul><li><a href=\"#a\">A</a></li></ul>");
        assert_eq!(doc.inner_html(main), "<ul><li><a href=\"#a\">A</a></li></ul>");
    }

    #[test]
    fn replace_with_html_swaps_node() {
        let mut doc = Document::parse(r##"<body><p><a href="#b:">X1,Y2</a></p></body>"##);
        let a = first(&doc, "a");
        doc.replace_with_html(a, "<span class=\"citation\">[X1]</span>");
        let p = first(&doc, "p");
        assert_eq!(doc.inner_html(p), "<span class=\"citation\">[X1]</span>");
    }

    #[test]
    fn adopt_copies_subtree_between_documents() {
        let source = Document::parse(
            r#"<body><div class="chapter"><h2 id="section-a">A</h2><p>text</p></div></body>"#,
        );
        let mut dest = Document::parse(r#"<body><div class="main"></div></body>"#);

        let chapter = first(&source, "div.chapter");
        let main = first(&dest, "div.main");
        let copied = dest.adopt(main, &source, chapter).unwrap();

        assert_eq!(dest.attr(copied, "class"), Some("chapter"));
        assert_eq!(
            dest.inner_html(main),
            r#"<div class="chapter"><h2 id="section-a">A</h2><p>text</p></div>"#
        );
        assert!(dest.anchor_ids().contains("section-a"));
    }

    #[test]
    fn escape_helpers() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attr("say \"hi\""), "say &quot;hi&quot;");
    }
}
