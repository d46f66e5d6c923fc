//! Cooperative cancellation.
//!
//! Every long-running call accepts a [`CancelToken`]. Cancellation is
//! cooperative: the portfolio generator checks the token between lineups and
//! at solver poll points, the contest simulator between scenario batches,
//! and scenario-cache population before sampling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{SlipResult, SlipstreamError};

/// Cheap clonable cancellation flag shared between a request and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Bail out with a [`SlipstreamError::Cancelled`] if cancellation was
    /// requested. `at` names the checkpoint for the error context.
    pub fn check(&self, at: &str) -> SlipResult<()> {
        if self.is_cancelled() {
            Err(SlipstreamError::Cancelled(at.to_string()))
        } else {
            Ok(())
        }
    }
}
