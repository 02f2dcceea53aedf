//! Error types for the resume-parser library.
//!
//! Failures fall into two groups:
//!
//! * [`ResumeParserError`] is **fatal**: the run cannot proceed at all (bad
//!   input file, split verification mismatch, provider not configured).
//!   Returned as `Err(ResumeParserError)` from the top-level entry points.
//!
//! * Per-candidate errors: [`ExtractionError`], [`ScoringValueError`] and the
//!   [`CandidateError`] wrapper. One candidate failing never aborts the batch;
//!   the error is stored in [`crate::process::CandidateOutcome`] and the
//!   remaining candidates carry on.
//!
//! The section extractor has no error type: missing sections are empty lists.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the resume-parser library.
#[derive(Debug, Error)]
pub enum ResumeParserError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt or a page could not be read.
    #[error("PDF '{path}' could not be read: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Split errors ──────────────────────────────────────────────────────
    /// The number of split documents on disk does not match the number of
    /// boundary markers found in the source document.
    #[error(
        "Split verification failed: {markers} resume marker(s) in source but {files} PDF file(s) in '{dir}'\n\
Remove stale files from the output directory or check for duplicate registration numbers."
    )]
    SplitVerification {
        markers: usize,
        files: usize,
        dir: PathBuf,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Previously written parsed data could not be read back.
    #[error("Failed to read parsed data '{path}': {detail}")]
    ParsedDataUnreadable { path: PathBuf, detail: String },

    /// A candidate identifier is not a single plain file name.
    #[error("'{id}' cannot be used as an output name (empty, '.', '..' or contains a path)")]
    InvalidIdentifier { id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Single-resume errors ──────────────────────────────────────────────
    /// The only candidate of a single-resume run failed.
    #[error(transparent)]
    Candidate(#[from] CandidateError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The LLM collaborator failed to produce a valid [`crate::model::CandidateRecord`].
///
/// Recoverable per candidate: the orchestrator logs it and moves on.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// Transport-level failure talking to the backend.
    #[error("LLM backend '{backend}' failed: {detail}")]
    Backend { backend: String, detail: String },

    /// The API answered with a non-success status.
    #[error("LLM API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP 429 from the API.
    #[error("Rate limit exceeded for backend '{backend}'")]
    RateLimited { backend: String },

    /// HTTP 401/403. Retrying will not help.
    #[error("Authentication error from backend '{backend}': {detail}")]
    Auth { backend: String, detail: String },

    /// A single call exceeded `api_timeout_secs`.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The completion had no content at all.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// The response was not a complete, well-typed candidate record.
    #[error("LLM response does not match the candidate schema: {detail}")]
    SchemaViolation { detail: String },
}

impl ExtractionError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractionError::Backend { .. }
            | ExtractionError::RateLimited { .. }
            | ExtractionError::Timeout { .. }
            | ExtractionError::EmptyResponse => true,
            ExtractionError::Api { status, .. } => *status >= 500,
            ExtractionError::Auth { .. } | ExtractionError::SchemaViolation { .. } => false,
        }
    }
}

/// A numeric input to the scoring engine is outside its domain.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ScoringValueError {
    #[error("semester {semester}: {field} is not a finite number")]
    NonFinite { semester: u32, field: String },

    #[error("semester {semester}: {field} = {value} is outside 0–10")]
    OutOfRange {
        semester: u32,
        field: String,
        value: f64,
    },
}

/// Why a single candidate could not be processed.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum CandidateError {
    /// The per-candidate PDF could not be read.
    #[error("{id}: failed to read resume: {detail}")]
    Read { id: String, detail: String },

    #[error("{id}: {source}")]
    Extraction {
        id: String,
        #[source]
        source: ExtractionError,
    },

    #[error("{id}: scoring failed: {source}")]
    Scoring {
        id: String,
        #[source]
        source: ScoringValueError,
    },

    /// Output files could not be written; nothing was left behind.
    #[error("{id}: failed to save parsed data: {detail}")]
    Persist { id: String, detail: String },
}

impl CandidateError {
    /// Identifier of the candidate this error belongs to.
    pub fn id(&self) -> &str {
        match self {
            CandidateError::Read { id, .. }
            | CandidateError::Extraction { id, .. }
            | CandidateError::Scoring { id, .. }
            | CandidateError::Persist { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_verification_display() {
        let e = ResumeParserError::SplitVerification {
            markers: 12,
            files: 11,
            dir: PathBuf::from("out/pdfs"),
        };
        let msg = e.to_string();
        assert!(msg.contains("12 resume marker"), "got: {msg}");
        assert!(msg.contains("11 PDF file"), "got: {msg}");
    }

    #[test]
    fn schema_violation_is_not_retryable() {
        let e = ExtractionError::SchemaViolation {
            detail: "missing field `metadata`".into(),
        };
        assert!(!e.is_retryable());
        assert!(e.to_string().contains("metadata"));
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let e500 = ExtractionError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        let e400 = ExtractionError::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert!(e500.is_retryable());
        assert!(!e400.is_retryable());
        assert!(ExtractionError::Timeout { secs: 30 }.is_retryable());
        assert!(!ExtractionError::Auth {
            backend: "deepseek".into(),
            detail: "invalid key".into()
        }
        .is_retryable());
    }

    #[test]
    fn candidate_error_carries_id() {
        let e = CandidateError::Scoring {
            id: "221CS101".into(),
            source: ScoringValueError::OutOfRange {
                semester: 2,
                field: "cgpa".into(),
                value: 11.0,
            },
        };
        assert_eq!(e.id(), "221CS101");
        assert!(e.to_string().contains("outside 0–10"));
    }
}
