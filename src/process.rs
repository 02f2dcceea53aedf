//! Eager entry points: split, extract, score and persist.
//!
//! ```text
//! combined.pdf
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Read     page text via pdfium (spawn_blocking)
//!  ├─ 3. Split    one run per letterhead page → <out>/pdfs/<id>.pdf
//!  ├─ 4. Verify   marker count == *.pdf count, else abort
//!  └─ 5. Per candidate, `concurrency` at a time:
//!        extract (LLM) → sections → score → <out>/parsed_data/<id>/
//! ```
//!
//! Steps 1–4 fail the whole run. In step 5 a candidate failing is recorded in
//! its [`CandidateOutcome`] and the others carry on. Use
//! [`crate::stream::process_stream`] to receive outcomes as they complete.

use crate::config::ParserConfig;
use crate::error::{CandidateError, ResumeParserError};
use crate::model::{CandidateRecord, ExtraCurricularRecord, TokenUsage};
use crate::pipeline::llm::FieldExtractor;
use crate::pipeline::persist::{self, PARSED_DIR, PDF_DIR};
use crate::pipeline::{input, pdf};
use crate::scoring::{compute_score, ScoreBreakdown, ScoringConfig};
use crate::sections::extract_extra_curricular;
use crate::splitter::{
    sanitize_identifier, split_pages, verify_split, PageText, SplitOptions, OUTPUT_EXTENSION,
};
use crate::text::join_pages;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One split document.
#[derive(Debug, Clone, Serialize)]
pub struct SplitDocument {
    pub identifier: String,
    pub path: PathBuf,
    /// 0-based page indices in the source document.
    pub pages: Vec<usize>,
    /// Normalised text of the run, ready for extraction.
    #[serde(skip)]
    pub text: String,
}

/// Result of splitting and verifying a combined PDF.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub source: String,
    pub total_pages: usize,
    pub output_dir: PathBuf,
    pub documents: Vec<SplitDocument>,
}

/// Everything produced for one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedResume {
    pub id: String,
    pub record: CandidateRecord,
    pub extra_curricular: ExtraCurricularRecord,
    pub usage: TokenUsage,
    pub scores: ScoreBreakdown,
    pub output_dir: PathBuf,
}

/// Per-candidate result of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateOutcome {
    pub id: String,
    pub result: Result<ParsedResume, CandidateError>,
}

impl CandidateOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a full batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub split: SplitReport,
    /// Sorted by candidate id.
    pub outcomes: Vec<CandidateOutcome>,
    pub token_usage_file: PathBuf,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Where a candidate's resume text comes from.
#[derive(Debug, Clone)]
pub enum CandidateSource {
    /// Text already in memory (e.g. from the split step).
    Text(String),
    /// A single-resume PDF to read first.
    File(PathBuf),
}

/// One unit of batch work.
#[derive(Debug, Clone)]
pub struct CandidateJob {
    pub id: String,
    pub source: CandidateSource,
}

// ── Split ────────────────────────────────────────────────────────────────────

/// Split a combined PDF into `<output_dir>/pdfs/<id>.pdf` and verify the result.
///
/// # Errors
/// Input errors, pdfium errors, write errors, and
/// [`ResumeParserError::SplitVerification`] when the number of PDFs on disk
/// differs from the number of markers in the source.
pub async fn split_document(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<SplitReport, ResumeParserError> {
    let input_str = input_str.as_ref();
    let pdf_dir = output_dir.as_ref().join(PDF_DIR);
    let pages = read_and_split(input_str, &pdf_dir, config).await?;
    verified_split_report(input_str, &pages, &pdf_dir, &config.split_options())
}

/// Steps 1–3: resolve, read page text, write one PDF per run into `pdf_dir`.
async fn read_and_split(
    input_str: &str,
    pdf_dir: &Path,
    config: &ParserConfig,
) -> Result<Vec<PageText>, ResumeParserError> {
    info!("Splitting {} into {}", input_str, pdf_dir.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // ── Step 2: Read page text ───────────────────────────────────────────
    let pages = pdf::read_pages(resolved.path()).await?;

    // ── Step 3: Split and write ──────────────────────────────────────────
    let runs = split_pages(&pages, &config.split_options());
    pdf::write_runs(resolved.path(), &runs, pdf_dir).await?;
    info!("Split {} pages into {} resumes", pages.len(), runs.len());

    Ok(pages)
}

/// Step 4: check the PDFs in `pdf_dir` against the markers in `pages` and
/// describe the split.
///
/// # Errors
/// [`ResumeParserError::SplitVerification`] on a count mismatch, e.g. a stale
/// PDF from an earlier run or two runs sharing an identifier.
pub fn verified_split_report(
    source: &str,
    pages: &[PageText],
    pdf_dir: &Path,
    options: &SplitOptions,
) -> Result<SplitReport, ResumeParserError> {
    let (ok, expected, found) =
        verify_split(pages, pdf_dir, options).map_err(|e| ResumeParserError::OutputWriteFailed {
            path: pdf_dir.to_path_buf(),
            source: e,
        })?;
    if !ok {
        return Err(ResumeParserError::SplitVerification {
            markers: expected,
            files: found,
            dir: pdf_dir.to_path_buf(),
        });
    }
    debug!("Verified {} split documents", found);

    let documents = split_pages(pages, options)
        .iter()
        .map(|run| SplitDocument {
            identifier: run.identifier.clone(),
            path: pdf_dir.join(run.file_name()),
            pages: run.page_indices(),
            text: join_pages(run.pages.iter().map(|p| p.text.as_str())),
        })
        .collect();

    Ok(SplitReport {
        source: source.to_string(),
        total_pages: pages.len(),
        output_dir: pdf_dir.to_path_buf(),
        documents,
    })
}

/// One text job per split document.
pub fn split_jobs(split: &SplitReport) -> Vec<CandidateJob> {
    split
        .documents
        .iter()
        .map(|d| CandidateJob {
            id: d.identifier.clone(),
            source: CandidateSource::Text(d.text.clone()),
        })
        .collect()
}

// ── Per candidate ────────────────────────────────────────────────────────────

/// Extract, score and persist one candidate from its resume text.
pub async fn process_candidate_text(
    extractor: &FieldExtractor,
    id: &str,
    text: &str,
    parsed_root: &Path,
    scoring: &ScoringConfig,
) -> Result<ParsedResume, CandidateError> {
    let (record, usage) = extractor
        .extract(text)
        .await
        .map_err(|source| CandidateError::Extraction {
            id: id.to_string(),
            source,
        })?;
    finish_candidate(id, text, record, usage, parsed_root, scoring).await
}

/// Read a single-resume PDF, then [`process_candidate_text`].
pub async fn process_candidate_file(
    extractor: &FieldExtractor,
    id: &str,
    pdf_path: &Path,
    parsed_root: &Path,
    scoring: &ScoringConfig,
) -> Result<ParsedResume, CandidateError> {
    let text = pdf::read_resume_text(pdf_path)
        .await
        .map_err(|e| CandidateError::Read {
            id: id.to_string(),
            detail: e.to_string(),
        })?;
    process_candidate_text(extractor, id, &text, parsed_root, scoring).await
}

async fn finish_candidate(
    id: &str,
    text: &str,
    record: CandidateRecord,
    usage: TokenUsage,
    parsed_root: &Path,
    scoring: &ScoringConfig,
) -> Result<ParsedResume, CandidateError> {
    let extra = extract_extra_curricular(text);
    let scores = compute_score(&record, &extra, scoring).map_err(|source| CandidateError::Scoring {
        id: id.to_string(),
        source,
    })?;

    let root = parsed_root.to_path_buf();
    let owned_id = id.to_string();
    let (rec, ext, usg) = (record.clone(), extra.clone(), usage.clone());
    let files = tokio::task::spawn_blocking(move || {
        persist::save_candidate(&root, &owned_id, &rec, &ext, &scores, &usg)
    })
    .await
    .map_err(|e| CandidateError::Persist {
        id: id.to_string(),
        detail: format!("save task panicked: {e}"),
    })?
    .map_err(|e| CandidateError::Persist {
        id: id.to_string(),
        detail: e.to_string(),
    })?;

    Ok(ParsedResume {
        id: id.to_string(),
        record,
        extra_curricular: extra,
        usage,
        scores,
        output_dir: files.dir,
    })
}

/// Run one job and report it to the progress callback.
pub(crate) async fn run_job(
    extractor: &FieldExtractor,
    job: CandidateJob,
    parsed_root: &Path,
    config: &ParserConfig,
) -> CandidateOutcome {
    if let Some(ref cb) = config.progress_callback {
        cb.on_candidate_start(&job.id);
    }

    let result = match job.source {
        CandidateSource::Text(ref text) => {
            process_candidate_text(extractor, &job.id, text, parsed_root, &config.scoring).await
        }
        CandidateSource::File(ref path) => {
            process_candidate_file(extractor, &job.id, path, parsed_root, &config.scoring).await
        }
    };

    match &result {
        Ok(parsed) => {
            info!("{}: score {:.2}", job.id, parsed.scores.total);
            if let Some(ref cb) = config.progress_callback {
                cb.on_candidate_complete(&job.id, parsed.scores.total);
            }
        }
        Err(e) => {
            warn!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_candidate_error(&job.id, &e.to_string());
            }
        }
    }

    CandidateOutcome { id: job.id, result }
}

// ── Batch ────────────────────────────────────────────────────────────────────

/// Process jobs with at most `config.concurrency` in flight. The result is
/// sorted by id; one failure never cancels the others.
pub async fn process_jobs(
    extractor: &FieldExtractor,
    jobs: Vec<CandidateJob>,
    parsed_root: &Path,
    config: &ParserConfig,
) -> Vec<CandidateOutcome> {
    let total = jobs.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut outcomes: Vec<CandidateOutcome> = stream::iter(
        jobs.into_iter()
            .map(|job| run_job(extractor, job, parsed_root, config)),
    )
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    outcomes.sort_by(|a, b| a.id.cmp(&b.id));

    let success = outcomes.iter().filter(|o| o.is_ok()).count();
    info!("Batch complete: {}/{} candidates", success, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, success);
    }
    outcomes
}

/// Write `token_usage.csv` for the successful outcomes.
pub fn write_usage_summary(
    parsed_root: &Path,
    outcomes: &[CandidateOutcome],
) -> Result<PathBuf, ResumeParserError> {
    let usages: Vec<TokenUsage> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|p| p.usage.clone())
        .collect();
    persist::write_token_usage(parsed_root, &usages)
}

/// Split a combined PDF and process every candidate in it.
///
/// The LLM backend is resolved before anything is written, so a missing API
/// key fails fast.
pub async fn process_batch(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<BatchReport, ResumeParserError> {
    let extractor = FieldExtractor::from_config(config)?;
    process_batch_with(&extractor, input_str, output_dir, config).await
}

/// [`process_batch`] with a caller-supplied extractor.
pub async fn process_batch_with(
    extractor: &FieldExtractor,
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<BatchReport, ResumeParserError> {
    let start = Instant::now();
    let input_str = input_str.as_ref();
    let output_dir = output_dir.as_ref();

    let pages = read_and_split(input_str, &output_dir.join(PDF_DIR), config).await?;
    let mut report = process_pages_with(extractor, input_str, &pages, output_dir, config).await?;
    report.duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

/// Verify an already written split of `pages` under `<output_dir>/pdfs/`,
/// then extract, score and save every candidate.
///
/// Nothing is sent to the model when verification fails.
pub async fn process_pages_with(
    extractor: &FieldExtractor,
    source: &str,
    pages: &[PageText],
    output_dir: &Path,
    config: &ParserConfig,
) -> Result<BatchReport, ResumeParserError> {
    let start = Instant::now();
    let parsed_root = output_dir.join(PARSED_DIR);

    let split = verified_split_report(source, pages, &output_dir.join(PDF_DIR), &config.split_options())?;

    // ── Step 5: Extract, score, save ─────────────────────────────────────
    let outcomes = process_jobs(extractor, split_jobs(&split), &parsed_root, config).await;
    let token_usage_file = write_usage_summary(&parsed_root, &outcomes)?;

    Ok(BatchReport {
        split,
        outcomes,
        token_usage_file,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Process every `*.pdf` directly inside `pdf_dir` (e.g. a previous split),
/// keyed by file stem.
pub async fn process_directory(
    pdf_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<Vec<CandidateOutcome>, ResumeParserError> {
    let pdf_dir = pdf_dir.as_ref();
    let parsed_root = output_dir.as_ref().join(PARSED_DIR);
    let extractor = FieldExtractor::from_config(config)?;

    let jobs = list_pdf_jobs(pdf_dir)?;
    info!("{} resumes in {}", jobs.len(), pdf_dir.display());

    let outcomes = process_jobs(&extractor, jobs, &parsed_root, config).await;
    write_usage_summary(&parsed_root, &outcomes)?;
    Ok(outcomes)
}

fn list_pdf_jobs(pdf_dir: &Path) -> Result<Vec<CandidateJob>, ResumeParserError> {
    let entries = std::fs::read_dir(pdf_dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ResumeParserError::FileNotFound {
            path: pdf_dir.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ResumeParserError::PermissionDenied {
            path: pdf_dir.to_path_buf(),
        },
        _ => ResumeParserError::Internal(format!("{}: {e}", pdf_dir.display())),
    })?;

    let mut jobs = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ResumeParserError::Internal(format!("{}: {e}", pdf_dir.display())))?
            .path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION));
        if !path.is_file() || !is_pdf {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            jobs.push(CandidateJob {
                id: stem.to_string_lossy().into_owned(),
                source: CandidateSource::File(path),
            });
        }
    }
    jobs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(jobs)
}

// ── Single resume ────────────────────────────────────────────────────────────

/// Output key for a single resume: the registration number, unless it is
/// empty, "NA" or not a usable file name, then the file stem, then `resume`.
pub fn single_resume_id(reg_no: &str, stem: &str) -> String {
    let reg = sanitize_identifier(reg_no);
    if !reg.is_empty() && !reg.eq_ignore_ascii_case("na") {
        return reg;
    }
    let stem = sanitize_identifier(stem);
    if stem.is_empty() {
        "resume".to_string()
    } else {
        stem
    }
}

/// Parse one single-resume PDF (path or URL) into `<output_dir>/parsed_data/<id>/`.
pub async fn parse_resume(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<ParsedResume, ResumeParserError> {
    let extractor = FieldExtractor::from_config(config)?;
    parse_resume_with(&extractor, input_str, output_dir, config).await
}

/// [`parse_resume`] with a caller-supplied extractor.
pub async fn parse_resume_with(
    extractor: &FieldExtractor,
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<ParsedResume, ResumeParserError> {
    let input_str = input_str.as_ref();
    info!("Parsing resume: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let text = pdf::read_resume_text(resolved.path()).await?;
    let stem = resolved.stem();

    let (record, usage) = extractor
        .extract(&text)
        .await
        .map_err(|source| CandidateError::Extraction {
            id: stem.clone(),
            source,
        })?;

    let id = single_resume_id(&record.metadata.reg_no, &stem);
    let parsed_root = output_dir.as_ref().join(PARSED_DIR);
    Ok(finish_candidate(&id, &text, record, usage, &parsed_root, &config.scoring).await?)
}

/// Synchronous wrapper around [`process_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_batch_sync(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<BatchReport, ResumeParserError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ResumeParserError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(process_batch(input_str, output_dir, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_resume_id_prefers_reg_no() {
        assert_eq!(single_resume_id("221CS101", "resume"), "221CS101");
        assert_eq!(single_resume_id(" NA ", "jane_doe"), "jane_doe");
        assert_eq!(single_resume_id("", "jane_doe"), "jane_doe");
        assert_eq!(single_resume_id("22/CS/01", "x"), "22_CS_01");
        assert_eq!(single_resume_id("..", "jane_doe"), "jane_doe");
        assert_eq!(single_resume_id(".", ".."), "resume");
    }

    #[test]
    fn list_pdf_jobs_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }
        std::fs::create_dir(dir.path().join("c.pdf")).unwrap();

        let jobs = list_pdf_jobs(dir.path()).unwrap();
        let ids: Vec<_> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn list_pdf_jobs_missing_dir() {
        assert!(matches!(
            list_pdf_jobs(Path::new("/no/such/dir")),
            Err(ResumeParserError::FileNotFound { .. })
        ));
    }
}
