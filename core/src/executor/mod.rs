//! Pass execution over planned chunks.
//!
//! [`SequentialExecutor`] runs every pass of every chunk in its range in
//! order. [`ConcurrentExecutor`] splits the plan into contiguous lane ranges
//! and runs one sequential executor per lane, each on its own descriptor.
//!
//! Both poll for a stop request before every chunk and before every pass.
//! A write already issued is always allowed to finish.

pub mod concurrent;
pub mod sequential;

pub use concurrent::ConcurrentExecutor;
pub use sequential::SequentialExecutor;

use crate::algorithms::{PassSpec, PatternGenerator};
use crate::error::WipeError;
use crate::progress::ProgressAggregator;
use crate::verification::VerificationProbe;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation shared between a job and whoever may cancel it
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for registering with a signal handler
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Why a lane stopped before finishing its range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The job was cancelled
    Cancelled,
    /// A sibling lane failed
    Aborted,
}

/// What an executor polls between operations
#[derive(Debug, Clone, Copy)]
pub struct StopSignal<'a> {
    cancel: &'a CancelToken,
    abort: Option<&'a AtomicBool>,
}

impl<'a> StopSignal<'a> {
    pub fn new(cancel: &'a CancelToken) -> Self {
        Self {
            cancel,
            abort: None,
        }
    }

    pub fn with_abort(cancel: &'a CancelToken, abort: &'a AtomicBool) -> Self {
        Self {
            cancel,
            abort: Some(abort),
        }
    }

    pub fn check(&self) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.abort {
            Some(flag) if flag.load(Ordering::SeqCst) => Some(StopReason::Aborted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneOutcome {
    Completed,
    Failed(WipeError),
    Cancelled,
    /// Stopped at a boundary because another lane failed
    Aborted,
}

impl From<StopReason> for LaneOutcome {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Cancelled => LaneOutcome::Cancelled,
            StopReason::Aborted => LaneOutcome::Aborted,
        }
    }
}

/// Result of running one lane (the sequential executor is a single lane 0)
#[derive(Debug, Clone)]
pub struct LaneReport {
    pub lane: usize,
    /// Indices into the job's chunk plan
    pub chunk_range: Range<usize>,
    pub chunks_completed: usize,
    pub outcome: LaneOutcome,
}

impl LaneReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == LaneOutcome::Completed
    }
}

/// Parameters shared by every lane of one job
pub struct ExecutionContext<'a> {
    pub passes: &'a [PassSpec],
    pub generator: PatternGenerator,
    /// `None` disables verification
    pub probe: Option<VerificationProbe>,
    pub write_block_size: usize,
    pub direct_io: bool,
    pub progress: &'a ProgressAggregator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(token.flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_takes_precedence_over_abort() {
        let token = CancelToken::new();
        let abort = AtomicBool::new(false);
        let signal = StopSignal::with_abort(&token, &abort);
        assert_eq!(signal.check(), None);

        abort.store(true, Ordering::SeqCst);
        assert_eq!(signal.check(), Some(StopReason::Aborted));

        token.cancel();
        assert_eq!(signal.check(), Some(StopReason::Cancelled));
    }
}
