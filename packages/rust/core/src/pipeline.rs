//! End-to-end `stitch` pipeline: manifest → load → transform → merge → TOC → write.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use scraper::Selector;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use stitchbook_shared::{Category, DocKey, Manifest, Result, StitchError, StitchOptions, Toc};
use stitchbook_transform::{RewrittenLink, Transformer};

use crate::assembler::{self, Destination};
use crate::toc;

static ID_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[id]").expect("id selector"));

/// Inputs for one stitch run.
#[derive(Debug, Clone)]
pub struct StitchRequest {
    /// Ordered document list and merged title.
    pub manifest: Manifest,
    /// Site root holding one directory per document key.
    pub root_dir: PathBuf,
    /// Index page; defaults to `<root>[/<lang>]/<index_filename>`.
    pub index: Option<PathBuf>,
    /// Template to fill instead of a fresh page.
    pub template: Option<PathBuf>,
    /// Output file.
    pub dest: PathBuf,
    /// Language code for multi-language sites.
    pub language: Option<String>,
}

/// A document scheduled for merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDocument {
    pub category: Category,
    pub key: DocKey,
    pub path: PathBuf,
}

/// Result of a stitch run.
#[derive(Debug, Clone, Serialize)]
pub struct StitchReport {
    /// Path of the written output.
    pub dest: PathBuf,
    /// Number of documents merged, index included.
    pub documents: usize,
    /// Table of contents of the merged document.
    pub toc: Toc,
    /// Links rewritten or generated while merging.
    pub links_rewritten: usize,
    /// Size of the written output.
    pub bytes: usize,
    /// SHA-256 of the written output.
    pub sha256: String,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each document is merged.
    fn document_merged(&self, key: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &StitchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_merged(&self, _key: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &StitchReport) {}
}

/// Resolve the source path of every document, index first, then lessons,
/// bibliography and extras in manifest order.
pub fn plan(request: &StitchRequest, opts: &StitchOptions) -> Vec<PlannedDocument> {
    let base = match &request.language {
        Some(lang) => request.root_dir.join(lang),
        None => request.root_dir.clone(),
    };

    let index_path = request
        .index
        .clone()
        .unwrap_or_else(|| base.join(&opts.index_filename));

    let mut planned = Vec::with_capacity(request.manifest.len() + 1);
    planned.push(PlannedDocument {
        category: Category::Index,
        key: DocKey::index(),
        path: index_path,
    });
    planned.extend(request.manifest.entries().iter().map(|entry| PlannedDocument {
        category: entry.category,
        key: entry.key.clone(),
        path: base.join(entry.key.as_str()).join(&opts.index_filename),
    }));
    planned
}

/// Run the full stitch pipeline.
///
/// 1. Plan document order and source paths
/// 2. Load, transform and absorb each document in order
/// 3. Build the table of contents and drop orphaned placeholders
/// 4. Validate rewritten links and section anchors
/// 5. Render and write the destination exactly once
///
/// Any error aborts before the destination is touched.
#[instrument(skip_all, fields(dest = %request.dest.display(), language = request.language.as_deref().unwrap_or("")))]
pub fn stitch(
    request: &StitchRequest,
    opts: &StitchOptions,
    progress: &dyn ProgressReporter,
) -> Result<StitchReport> {
    let start = Instant::now();
    let title = request.manifest.title();

    info!(title, documents = request.manifest.len() + 1, "starting stitch");

    // --- Phase 1: Plan ---
    progress.phase("Planning");
    let transformer = Transformer::new(opts, request.language.as_deref())?;
    let planned = plan(request, opts);

    let mut dest = match &request.template {
        Some(template) => Destination::load_template(template, title, opts)?,
        None => Destination::fresh(title, opts)?,
    };

    // --- Phase 2: Merge ---
    progress.phase("Merging documents");
    let total = planned.len();
    let mut links: Vec<RewrittenLink> = Vec::new();
    let mut anchors: Vec<(DocKey, String)> = Vec::with_capacity(total);

    for (i, doc) in planned.iter().enumerate() {
        let mut src = transformer.load(doc.key.clone(), &doc.path)?;
        let report = transformer.apply(&mut src)?;

        if let Some(anchor) = report.anchor() {
            anchors.push((doc.key.clone(), anchor.to_string()));
        }
        links.extend(report.links);

        dest.absorb(src)?;
        progress.document_merged(doc.key.as_str(), i + 1, total);
    }

    // --- Phase 3: Table of contents ---
    progress.phase("Building table of contents");
    let built = toc::build_toc(&mut dest, opts.toc_mode, &opts.toc_classes)?;
    dest.remove_orphaned_placeholders(built.container);

    // --- Phase 4: Validate ---
    progress.phase("Validating links");
    ensure_unique_anchors(&dest, &anchors)?;
    validate_links(&dest, &links, opts.strict_links)?;

    // --- Phase 5: Write ---
    progress.phase("Writing output");
    let rendered = dest.render(opts.front_matter.as_ref());
    let written = assembler::write_atomic(&request.dest, &rendered)?;

    let report = StitchReport {
        dest: written.path,
        documents: dest.absorbed(),
        toc: built.toc,
        links_rewritten: links.len(),
        bytes: written.size_bytes,
        sha256: written.sha256,
        elapsed: start.elapsed(),
    };

    info!(
        documents = report.documents,
        links = report.links_rewritten,
        bytes = report.bytes,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "stitch complete"
    );

    progress.done(&report);
    Ok(report)
}

/// Each section anchor must identify exactly one element of the merged
/// document.
fn ensure_unique_anchors(dest: &Destination, anchors: &[(DocKey, String)]) -> Result<()> {
    let doc = dest.document();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in doc.select_ids(&ID_SEL) {
        if let Some(value) = doc.attr(id, "id") {
            *counts.entry(value).or_default() += 1;
        }
    }

    for (key, anchor) in anchors {
        let n = counts.get(anchor.as_str()).copied().unwrap_or(0);
        if n != 1 {
            return Err(StitchError::structure(
                key.as_str(),
                format!("section anchor '{anchor}' appears {n} times in the merged document"),
            ));
        }
    }
    Ok(())
}

/// Every rewritten link must land on an anchor of the merged document.
///
/// With `strict` the first dangling link is an error; otherwise each one is
/// logged. Returns the number of dangling links.
fn validate_links(dest: &Destination, links: &[RewrittenLink], strict: bool) -> Result<usize> {
    let anchors = dest.document().anchor_ids();
    let mut dangling = 0;

    for link in links {
        if anchors.contains(link.target_id()) {
            continue;
        }
        if strict {
            return Err(StitchError::DanglingLink {
                key: link.key.to_string(),
                href: link.href.clone(),
            });
        }
        warn!(key = %link.key, original = %link.original, href = %link.href, "dangling link");
        dangling += 1;
    }

    debug!(checked = links.len(), dangling, "links validated");
    Ok(dangling)
}
