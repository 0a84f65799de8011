//! Table-of-contents builder.
//!
//! Derives the TOC from the top-level headings of the merged document: the
//! first one becomes the merged title (`h1`) and a TOC container is inserted
//! right after it.

use std::sync::LazyLock;

use ego_tree::NodeId;
use scraper::Selector;
use tracing::{debug, instrument};

use stitchbook_dom::{escape_attr, escape_text};
use stitchbook_shared::{Result, Toc, TocEntry, TocMode};

use crate::assembler::Destination;

static H2_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").expect("h2 selector"));
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("a selector"));

/// The TOC plus the container it was written into.
#[derive(Debug, Clone, Default)]
pub struct BuiltToc {
    pub toc: Toc,
    /// `None` when the merged document has no top-level headings.
    pub container: Option<NodeId>,
}

/// Build the table of contents for the destination.
///
/// Collects every `h2` in the main container in document order. With none,
/// nothing is inserted and every headings placeholder is removed. Otherwise
/// the first is promoted to `h1` and an empty TOC container is inserted after
/// it, populated now or left for a view-time script depending on `mode`. The
/// promoted title is not listed, matching what the view-time script sees.
#[instrument(skip_all, fields(mode = %mode))]
pub fn build_toc(dest: &mut Destination, mode: TocMode, toc_classes: &[String]) -> Result<BuiltToc> {
    let main = dest.main();
    let headings = dest.document().select_within(main, &H2_SEL);

    let Some(&title) = headings.first() else {
        dest.remove_orphaned_placeholders(None);
        debug!("no top-level headings; table of contents omitted");
        return Ok(BuiltToc::default());
    };

    let mut entries = Vec::with_capacity(headings.len());
    let mut items = Vec::with_capacity(headings.len());
    {
        let doc = dest.document();
        for &id in &headings[1..] {
            let Some(anchor) = doc.attr(id, "id") else {
                debug!(title = %doc.text(id).trim(), "heading without id left out of contents");
                continue;
            };
            let text = doc.text(id).trim().to_string();
            let label = if doc.select_within(id, &LINK_SEL).is_empty() {
                doc.inner_html(id)
            } else {
                escape_text(&text)
            };
            items.push(format!(
                r##"<li><a href="#{}">{label}</a></li>"##,
                escape_attr(anchor)
            ));
            entries.push(TocEntry {
                title: text,
                anchor: anchor.to_string(),
            });
        }
    }

    let doc = dest.document_mut();
    doc.rename(title, "h1")?;

    let container_markup = format!(
        r#"<div class="{}"></div>"#,
        escape_attr(&toc_classes.join(" "))
    );
    let container = doc.insert_html_after(title, &container_markup).first().copied();

    if let (TocMode::MergeTimePopulated, Some(container)) = (mode, container) {
        let listing = format!(
            "<p><strong>Contents</strong></p><ul>{}</ul>",
            items.join("")
        );
        doc.append_html(container, &listing);
    }

    debug!(entries = entries.len(), "table of contents built");
    Ok(BuiltToc {
        toc: Toc { entries },
        container,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchbook_dom::compile_selector;
    use stitchbook_shared::{DocKey, StitchOptions};
    use stitchbook_transform::SourceDocument;

    fn classes() -> Vec<String> {
        vec!["list-block".into(), "headings".into()]
    }

    fn destination(chapters: &[(&str, &str)]) -> Destination {
        let mut dest = Destination::fresh("Course", &StitchOptions::default()).unwrap();
        for (key, body) in chapters {
            let page = format!(r#"<html><body><div class="chapter">{body}</div></body></html>"#);
            let src = SourceDocument::parse(
                DocKey::parse(key).unwrap(),
                format!("{key}/index.html"),
                &page,
                &[compile_selector("div.chapter").unwrap()],
            )
            .unwrap();
            dest.absorb(src).unwrap();
        }
        dest
    }

    #[test]
    fn first_heading_promoted_and_contents_listed() {
        let mut dest = destination(&[
            ("index", r#"<h2 id="section-index">Course</h2><p>welcome</p>"#),
            ("intro", r#"<h2 id="section-intro">Intro</h2><h3 id="s:why">Why</h3>"#),
            ("setup", r#"<h2 id="section-setup">Setup <em>Now</em></h2>"#),
        ]);
        let built = build_toc(&mut dest, TocMode::MergeTimePopulated, &classes()).unwrap();

        let anchors: Vec<_> = built.toc.entries.iter().map(|e| e.anchor.as_str()).collect();
        assert_eq!(anchors, ["section-intro", "section-setup"]);
        assert_eq!(built.toc.entries[1].title, "Setup Now");

        let html = dest.render(None);
        assert!(html.contains(r#"<h1 id="section-index">Course</h1><div class="list-block headings"><p><strong>Contents</strong></p><ul>"#));
        assert!(html.contains(r##"<ul><li><a href="#section-intro">Intro</a></li>"##));
        assert!(!html.contains(r##"<a href="#section-index">"##));
        assert!(html.contains(r##"<li><a href="#section-setup">Setup <em>Now</em></a></li>"##));
        assert_eq!(dest.document().select_ids(&compile_selector("h1").unwrap()).len(), 1);
    }

    #[test]
    fn client_mode_leaves_container_empty() {
        let mut dest = destination(&[
            ("index", r#"<h2 id="section-index">Home</h2>"#),
            ("intro", r#"<h2 id="section-intro">Intro</h2>"#),
        ]);
        let built = build_toc(&mut dest, TocMode::ClientPopulated, &classes()).unwrap();
        assert!(built.container.is_some());
        assert_eq!(built.toc.entries.len(), 1);
        assert!(dest.render(None).contains(r#"<div class="list-block headings"></div>"#));
    }

    #[test]
    fn headings_with_links_use_escaped_text() {
        let mut dest = destination(&[
            ("a", r#"<h2 id="section-a">A</h2>"#),
            ("b", r##"<h2 id="section-b">See <a href="#x">x &lt; y</a></h2>"##),
        ]);
        build_toc(&mut dest, TocMode::MergeTimePopulated, &classes()).unwrap();
        assert!(dest.render(None).contains(r##"<li><a href="#section-b">See x &lt; y</a></li>"##));
    }

    #[test]
    fn single_heading_yields_title_and_empty_listing() {
        let mut dest = destination(&[("intro", r#"<h2 id="section-intro">Intro</h2>"#)]);
        let built = build_toc(&mut dest, TocMode::MergeTimePopulated, &classes()).unwrap();
        assert!(built.toc.is_empty());
        assert!(built.container.is_some());
        assert!(dest.render(None).contains(r#"<h1 id="section-intro">Intro</h1>"#));
    }

    #[test]
    fn no_headings_means_no_toc() {
        let template = r#"<html><body><div class="headings"></div><div class="main"></div></body></html>"#;
        let mut dest = Destination::from_template(template, "T", &StitchOptions::default()).unwrap();
        let built = build_toc(&mut dest, TocMode::MergeTimePopulated, &classes()).unwrap();

        assert!(built.toc.is_empty());
        assert!(built.container.is_none());
        assert!(!dest.render(None).contains("headings"));
    }
}
