//! Streaming batch API: emit candidate outcomes as they complete.
//!
//! [`crate::process::process_batch`] returns only after every candidate is
//! done. [`process_stream`] performs the split and verification eagerly (both
//! are fatal when they fail) and then yields one [`CandidateOutcome`] per
//! candidate as soon as it finishes. Outcomes arrive in completion order, not
//! id order.
//!
//! The progress callback sees the same events as in batch mode:
//! `on_batch_start` when the stream is created and `on_batch_complete` once it
//! has been drained. A stream dropped early never reports completion.
//!
//! The stream does not write `token_usage.csv`; collect the outcomes and call
//! [`crate::process::write_usage_summary`] when the stream ends.

use crate::config::ParserConfig;
use crate::error::ResumeParserError;
use crate::pipeline::llm::FieldExtractor;
use crate::pipeline::persist::PARSED_DIR;
use crate::process::{run_job, split_document, split_jobs, CandidateJob, CandidateOutcome};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-candidate outcomes.
pub type CandidateStream = Pin<Box<dyn Stream<Item = CandidateOutcome> + Send>>;

/// Split `input_str` into `output_dir` and stream candidate outcomes.
///
/// # Returns
/// - `Ok(CandidateStream)`: split verified, candidates are being processed
/// - `Err(ResumeParserError)`: input, provider, split or verification failure
///
/// # Example
/// ```rust,no_run
/// use resume_parser::{process_stream, ParserConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ParserConfig::default();
/// let mut outcomes = process_stream("combined.pdf", "out", &config).await?;
/// while let Some(outcome) = outcomes.next().await {
///     match outcome.result {
///         Ok(parsed) => println!("{}: {:.2}", parsed.id, parsed.scores.total),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn process_stream(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<CandidateStream, ResumeParserError> {
    let extractor = FieldExtractor::from_config(config)?;
    process_stream_with(extractor, input_str, output_dir, config).await
}

/// [`process_stream`] with a caller-supplied extractor.
pub async fn process_stream_with(
    extractor: FieldExtractor,
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &ParserConfig,
) -> Result<CandidateStream, ResumeParserError> {
    let output_dir = output_dir.as_ref();
    let split = split_document(input_str, output_dir, config).await?;
    info!("Streaming {} candidates", split.documents.len());

    Ok(stream_jobs(
        extractor,
        split_jobs(&split),
        output_dir.join(PARSED_DIR),
        config,
    ))
}

/// Run `jobs` with at most `config.concurrency` in flight, yielding each
/// outcome as it finishes.
pub fn stream_jobs(
    extractor: FieldExtractor,
    jobs: Vec<CandidateJob>,
    parsed_root: PathBuf,
    config: &ParserConfig,
) -> CandidateStream {
    let total = jobs.len();
    let concurrency = config.concurrency;
    let callback = config.progress_callback.clone();
    let config = config.clone();

    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
    }

    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&succeeded);

    let outcomes = stream::iter(jobs.into_iter().map(move |job| {
        let extractor = extractor.clone();
        let cfg = config.clone();
        let root = parsed_root.clone();
        async move { run_job(&extractor, job, &root, &cfg).await }
    }))
    .buffer_unordered(concurrency)
    .inspect(move |outcome| {
        if outcome.is_ok() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    // Fires after the last outcome; yields nothing itself.
    let finished = stream::once(async move {
        let success = succeeded.load(Ordering::SeqCst);
        info!("Stream complete: {}/{} candidates", success, total);
        if let Some(cb) = callback {
            cb.on_batch_complete(total, success);
        }
    })
    .filter_map(|()| async { None::<CandidateOutcome> });

    Box::pin(outcomes.chain(finished))
}
