//! # resume-parser
//!
//! Split a combined PDF of campus-placement resumes into one PDF per
//! candidate, extract structured fields with an LLM, pull extra-curricular
//! sections out of the raw text, score every candidate out of 100 and save
//! the results as CSV and JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! combined.pdf
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Split    one document per page carrying the institute letterhead
//!  ├─ 3. Verify   documents on disk == letterhead pages in source
//!  ├─ 4. Extract  LLM → metadata, academics, skills, projects (JSON)
//!  ├─ 5. Sections regex scan for positions, achievements, certifications, …
//!  ├─ 6. Score    academic 20 + technical 35 + projects 30 + extra 15
//!  └─ 7. Persist  <out>/parsed_data/<id>/*.csv + llm_response.json
//! ```
//!
//! Steps 1–3 abort the run on failure. From step 4 on, failures are recorded
//! per candidate and the rest of the batch continues.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_parser::{process_batch, ParserConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend from DEEPSEEK_API_KEY, or any edgequake-llm provider env var
//!     let config = ParserConfig::default();
//!     let report = process_batch("combined.pdf", "out", &config).await?;
//!     for outcome in &report.outcomes {
//!         if let Ok(parsed) = &outcome.result {
//!             println!("{}: {:.2}", parsed.id, parsed.scores.total);
//!         }
//!     }
//!     eprintln!("{} ok, {} failed", report.succeeded(), report.failed());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume-parser` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume-parser = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod scoring;
pub mod sections;
pub mod splitter;
pub mod stream;
pub mod text;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Endpoint, ParserConfig, ParserConfigBuilder};
pub use error::{CandidateError, ExtractionError, ResumeParserError, ScoringValueError};
pub use model::{
    AcademicRecord, CandidateRecord, ExtraCurricularRecord, Project, SkillSet, StudentMetadata, TokenUsage,
};
pub use pipeline::llm::{ChatBackend, FieldExtractor};
pub use process::{
    parse_resume, process_batch, process_batch_sync, process_directory, process_pages_with,
    split_document, verified_split_report, BatchReport, CandidateJob, CandidateOutcome,
    CandidateSource, ParsedResume, SplitReport,
};
pub use progress::{NoopProgressCallback, ParseProgressCallback, ProgressCallback};
pub use scoring::{compute_score, ScoreBreakdown, ScoringConfig};
pub use sections::extract_extra_curricular;
pub use splitter::{split_pages, verify_split, CandidatePageRun, PageText, SplitOptions};
pub use stream::{process_stream, stream_jobs, CandidateStream};
