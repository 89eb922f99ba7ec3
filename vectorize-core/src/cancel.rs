//! Cooperative cancellation handle.
//!
//! The pipeline never spawns detached work and never polls an OS signal; a
//! caller that wants to abort a long-running `vectorize()` call flips the
//! flag behind a `CancellationToken` clone from another thread, and every
//! stage checks it between stages and periodically inside long inner loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};

/// A cheap-to-clone, thread-safe cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation. Safe to call from any thread, any number of times.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Returns `Err(CoreError::Cancelled)` if cancellation has been requested,
    /// `Ok(())` otherwise. Call between pipeline stages and every `N` pixels
    /// inside long inner loops.
    pub fn check(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.check().is_err());
    }
}
