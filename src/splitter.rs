//! Splitting a combined PDF into one page run per candidate.
//!
//! Every resume in the combined document starts with a page carrying the
//! institute letterhead. The splitter folds over the pages in order, closing
//! the current run whenever a new letterhead page appears:
//!
//! ```text
//! page:    0      1      2      3      4      5
//! marker:  ✓      ·      ✓      ·      ·      ✓
//! run:     [ 221CS101  ] [ 221EC042        ] [ 221ME007 ]
//! ```
//!
//! This module only decides *which* pages go together. Reading page text and
//! writing the per-run PDFs lives in [`crate::pipeline::pdf`].

use crate::text::normalize_page_text;
use std::path::{Component, Path};
use tracing::{debug, warn};

/// Letterhead printed on the first page of every resume.
pub const DEFAULT_BOUNDARY_MARKER: &str =
    "NATIONAL INSTITUTE OF TECHNOLOGY KARNATAKA, SURATHKAL P.O SRINIVASNAGAR, MANGALORE-575025";

/// Label preceding the registration number on the first page.
const REG_NO_LABEL: &str = "Reg. No. :";

/// Extension of every split document.
pub const OUTPUT_EXTENSION: &str = "pdf";

/// One physical page: its 0-based position in the source and its raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub index: usize,
    pub text: String,
}

impl PageText {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// The pages belonging to one candidate, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePageRun {
    pub identifier: String,
    pub pages: Vec<PageText>,
}

impl CandidatePageRun {
    /// File name of the split document, e.g. `221CS101.pdf`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.identifier, OUTPUT_EXTENSION)
    }

    /// Source page indices, for copying.
    pub fn page_indices(&self) -> Vec<usize> {
        self.pages.iter().map(|p| p.index).collect()
    }
}

/// Options controlling segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Substring that marks the first page of a resume.
    pub boundary_marker: String,

    /// Discard pages that appear before the first marker page. Default: true.
    ///
    /// When false those pages become their own run named `page_<index>`.
    pub drop_leading_pages: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            boundary_marker: DEFAULT_BOUNDARY_MARKER.to_string(),
            drop_leading_pages: true,
        }
    }
}

/// Partition `pages` into candidate runs.
pub fn split_pages(pages: &[PageText], options: &SplitOptions) -> Vec<CandidatePageRun> {
    let mut runs = Vec::new();
    let mut current: Option<CandidatePageRun> = None;

    for page in pages {
        let clean = normalize_page_text(&page.text);

        if clean.contains(options.boundary_marker.as_str()) {
            if let Some(run) = current.take() {
                if !run.pages.is_empty() {
                    runs.push(run);
                }
            }
            let identifier = derive_identifier(&clean, page.index);
            debug!("Page {}: boundary for '{}'", page.index, identifier);
            current = Some(CandidatePageRun {
                identifier,
                pages: vec![page.clone()],
            });
            continue;
        }

        match current.as_mut() {
            Some(run) => run.pages.push(page.clone()),
            None if options.drop_leading_pages => {
                warn!("Page {}: before the first resume marker, dropped", page.index);
            }
            None => {
                current = Some(CandidatePageRun {
                    identifier: fallback_identifier(page.index),
                    pages: vec![page.clone()],
                });
            }
        }
    }

    if let Some(run) = current {
        runs.push(run);
    }

    runs
}

/// Derive the output identifier from a normalised boundary page.
///
/// Uses the first line containing `Reg. No. :`, taking the text after its
/// last colon. Falls back to `page_<index>`.
pub fn derive_identifier(clean_text: &str, page_index: usize) -> String {
    let value = clean_text
        .lines()
        .find(|line| line.contains(REG_NO_LABEL))
        .and_then(|line| line.rsplit(':').next())
        .map(sanitize_identifier)
        .unwrap_or_default();

    if value.is_empty() {
        fallback_identifier(page_index)
    } else {
        value
    }
}

/// Trim and replace path separators so the identifier stays one file name.
///
/// Returns an empty string when the result still is not a single plain path
/// component (`""`, `.`, `..`, a drive prefix); callers treat that as "no
/// identifier" and fall back.
pub fn sanitize_identifier(raw: &str) -> String {
    let cleaned = raw.trim().replace(['/', '\\'], "_");
    if is_valid_identifier(&cleaned) {
        cleaned
    } else {
        String::new()
    }
}

/// Whether `id` names exactly one entry inside its parent directory.
pub fn is_valid_identifier(id: &str) -> bool {
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name.to_str() == Some(id),
        _ => false,
    }
}

fn fallback_identifier(page_index: usize) -> String {
    format!("page_{page_index}")
}

/// Number of split documents `split_pages` is expected to produce, counted
/// independently as exact marker occurrences across all pages.
pub fn expected_document_count(pages: &[PageText], options: &SplitOptions) -> usize {
    let markers: usize = pages
        .iter()
        .map(|p| {
            normalize_page_text(&p.text)
                .matches(options.boundary_marker.as_str())
                .count()
        })
        .sum();

    let leading_run = !options.drop_leading_pages
        && pages
            .first()
            .is_some_and(|p| !normalize_page_text(&p.text).contains(options.boundary_marker.as_str()));

    markers + usize::from(leading_run)
}

/// Count `*.pdf` files directly inside `dir`. A missing directory counts as 0.
pub fn count_output_documents(dir: &Path) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut count = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION))
        {
            count += 1;
        }
    }
    Ok(count)
}

/// Check that the split documents on disk match the markers in the source.
///
/// Returns `(ok, expected, found)`.
pub fn verify_split(
    pages: &[PageText],
    output_dir: &Path,
    options: &SplitOptions,
) -> std::io::Result<(bool, usize, usize)> {
    let expected = expected_document_count(pages, options);
    let found = count_output_documents(output_dir)?;
    Ok((expected == found, expected, found))
}
