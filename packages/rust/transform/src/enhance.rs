//! Special-link fixups: bibliography citations, glossary references and
//! table styling.

use std::sync::LazyLock;

use scraper::Selector;
use tracing::debug;

use stitchbook_dom::{escape_attr, escape_text};
use stitchbook_shared::Result;

use crate::{RewrittenLink, SourceDocument};

/// Href marking a citation anchor whose text lists bibliography keys.
pub const CITATION_HREF: &str = "#b:";

/// Href prefix marking a glossary reference.
pub const GLOSSARY_PREFIX: &str = "#g:";

static CITATION_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(&format!(r#"a[href="{CITATION_HREF}"]"#)).expect("citation selector")
});
static GLOSSARY_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(&format!(r#"a[href^="{GLOSSARY_PREFIX}"]"#)).expect("glossary selector")
});
static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("table selector"));

/// Enhancement settings taken from the run options.
#[derive(Debug, Clone)]
pub struct EnhanceSettings {
    pub citations: bool,
    pub glossary_class: String,
    pub table_classes: Vec<String>,
}

/// Counts of what one enhancement pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceReport {
    pub citations: usize,
    pub glossary_refs: usize,
    pub tables: usize,
}

/// Expand citations, tag glossary references and style tables inside the
/// page's content container. Generated bibliography links are appended to
/// `links` so they are validated with the rewritten ones.
pub(crate) fn enhance(
    src: &mut SourceDocument,
    settings: &EnhanceSettings,
    links: &mut Vec<RewrittenLink>,
) -> Result<EnhanceReport> {
    let mut report = EnhanceReport::default();
    let key = src.key().clone();
    let container = src.container();

    if settings.citations {
        let citations: Vec<_> = {
            let doc = src.document();
            doc.select_within(container, &CITATION_SEL)
                .into_iter()
                .map(|id| (id, doc.text(id)))
                .collect()
        };

        let doc = src.document_mut();
        for (id, text) in citations {
            let refs: Vec<&str> = text.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
            let markup = citation_markup(&refs);
            doc.replace_with_html(id, &markup);

            links.extend(refs.iter().map(|r| RewrittenLink {
                key: key.clone(),
                original: CITATION_HREF.to_string(),
                href: format!("#{r}"),
            }));
            report.citations += 1;
        }
    }

    if !settings.glossary_class.is_empty() {
        let glossary = src.document().select_within(container, &GLOSSARY_SEL);
        let class = [settings.glossary_class.clone()];
        let doc = src.document_mut();
        for id in glossary {
            doc.add_classes(id, &class)?;
            report.glossary_refs += 1;
        }
    }

    if !settings.table_classes.is_empty() {
        let tables = src.document().select_within(container, &TABLE_SEL);
        let doc = src.document_mut();
        for id in tables {
            doc.add_classes(id, &settings.table_classes)?;
            report.tables += 1;
        }
    }

    debug!(
        %key,
        citations = report.citations,
        glossary = report.glossary_refs,
        tables = report.tables,
        "special links enhanced"
    );
    Ok(report)
}

fn citation_markup(refs: &[&str]) -> String {
    let items: Vec<String> = refs
        .iter()
        .map(|r| {
            format!(
                r##"<a class="bibref" href="#{}">{}</a>"##,
                escape_attr(r),
                escape_text(r)
            )
        })
        .collect();
    format!(r#"<span class="citation">[{}]</span>"#, items.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchbook_dom::compile_selector;
    use stitchbook_shared::DocKey;

    fn settings() -> EnhanceSettings {
        EnhanceSettings {
            citations: true,
            glossary_class: "glossref".into(),
            table_classes: vec!["table".into(), "table-striped".into()],
        }
    }

    fn source(body: &str) -> SourceDocument {
        let page = format!(r#"<html><body><div class="main">{body}</div></body></html>"#);
        SourceDocument::parse(
            DocKey::parse("intro").unwrap(),
            "intro/index.html",
            &page,
            &[compile_selector("div.main").unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn citation_expands_to_bibrefs() {
        let mut src = source(r##"<p>As shown <a href="#b:">Smith2020, Jones2019</a>.</p>"##);
        let mut links = Vec::new();
        let report = enhance(&mut src, &settings(), &mut links).unwrap();

        assert_eq!(report.citations, 1);
        let p = src
            .document()
            .select_first(&compile_selector("p").unwrap())
            .unwrap();
        assert_eq!(
            src.document().inner_html(p),
            r##"As shown <span class="citation">[<a class="bibref" href="#Smith2020">Smith2020</a>,<a class="bibref" href="#Jones2019">Jones2019</a>]</span>."##
        );

        let hrefs: Vec<_> = links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, ["#Smith2020", "#Jones2019"]);
        assert!(links.iter().all(|l| l.original == CITATION_HREF));
    }

    #[test]
    fn citations_can_be_disabled() {
        let mut src = source(r##"<p><a href="#b:">Smith2020</a></p>"##);
        let mut links = Vec::new();
        let opts = EnhanceSettings {
            citations: false,
            ..settings()
        };
        enhance(&mut src, &opts, &mut links).unwrap();
        assert!(links.is_empty());
        assert!(src.document().to_html().contains(r##"<a href="#b:">Smith2020</a>"##));
    }

    #[test]
    fn glossary_refs_gain_class() {
        let mut src = source(r##"<p><a class="x" href="#g:api">API</a> <a href="#other">o</a></p>"##);
        let report = enhance(&mut src, &settings(), &mut Vec::new()).unwrap();
        assert_eq!(report.glossary_refs, 1);

        let doc = src.document();
        let gloss = doc.select_first(&compile_selector("a.glossref").unwrap()).unwrap();
        assert_eq!(doc.attr(gloss, "class"), Some("x glossref"));
        assert_eq!(doc.attr(gloss, "href"), Some("#g:api"));
    }

    #[test]
    fn tables_gain_classes() {
        let mut src = source("<table><tr><td>1</td></tr></table>");
        let report = enhance(&mut src, &settings(), &mut Vec::new()).unwrap();
        assert_eq!(report.tables, 1);
        let doc = src.document();
        let table = doc.select_first(&compile_selector("table").unwrap()).unwrap();
        assert_eq!(doc.attr(table, "class"), Some("table table-striped"));
    }

    #[test]
    fn citation_keys_are_escaped() {
        assert_eq!(
            citation_markup(&["A&B"]),
            r##"<span class="citation">[<a class="bibref" href="#A&amp;B">A&amp;B</a>]</span>"##
        );
    }
}
