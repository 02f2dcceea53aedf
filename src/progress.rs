//! Progress-callback trait for per-candidate batch events.
//!
//! Inject an [`Arc<dyn ParseProgressCallback>`] via
//! [`crate::config::ParserConfigBuilder::progress_callback`] to receive events
//! as the batch processes each candidate. Candidates run concurrently, so the
//! methods may be called from several tasks at once.
//!
//! # Example
//!
//! ```rust
//! use resume_parser::{ParseProgressCallback, ParserConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Failures(AtomicUsize);
//!
//! impl ParseProgressCallback for Failures {
//!     fn on_candidate_error(&self, id: &str, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{id}: {error}");
//!     }
//! }
//!
//! let config = ParserConfig::builder()
//!     .progress_callback(Arc::new(Failures(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch orchestrator as candidates are processed.
///
/// All methods have no-op defaults. Shared mutable state in an implementation
/// needs its own synchronisation (`Mutex`, atomics).
pub trait ParseProgressCallback: Send + Sync {
    /// Called once, after splitting, before any extraction starts.
    fn on_batch_start(&self, total_candidates: usize) {
        let _ = total_candidates;
    }

    /// Called just before the LLM request for a candidate is sent.
    fn on_candidate_start(&self, id: &str) {
        let _ = id;
    }

    /// Called when a candidate was extracted, scored and saved.
    fn on_candidate_complete(&self, id: &str, total_score: f64) {
        let _ = (id, total_score);
    }

    /// Called when a candidate failed. The batch carries on.
    fn on_candidate_error(&self, id: &str, error: &str) {
        let _ = (id, error);
    }

    /// Called once after every candidate has been attempted.
    fn on_batch_complete(&self, total_candidates: usize, success_count: usize) {
        let _ = (total_candidates, success_count);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl ParseProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::ParserConfig`].
pub type ProgressCallback = Arc<dyn ParseProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        completed: AtomicUsize,
        failed: Mutex<Vec<String>>,
        summary: Mutex<Option<(usize, usize)>>,
    }

    impl ParseProgressCallback for Recorder {
        fn on_candidate_complete(&self, _id: &str, _total_score: f64) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_candidate_error(&self, id: &str, _error: &str) {
            self.failed.lock().unwrap().push(id.to_string());
        }

        fn on_batch_complete(&self, total: usize, success: usize) {
            *self.summary.lock().unwrap() = Some((total, success));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_candidate_start("221CS101");
        cb.on_candidate_complete("221CS101", 71.4);
        cb.on_candidate_error("221EC042", "timeout");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn recorder_receives_events_through_arc_dyn() {
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();

        cb.on_batch_start(3);
        cb.on_candidate_complete("a", 50.0);
        cb.on_candidate_complete("b", 60.0);
        cb.on_candidate_error("c", "schema violation");
        cb.on_batch_complete(3, 2);

        assert_eq!(recorder.completed.load(Ordering::SeqCst), 2);
        assert_eq!(*recorder.failed.lock().unwrap(), vec!["c".to_string()]);
        assert_eq!(*recorder.summary.lock().unwrap(), Some((3, 2)));
    }
}
