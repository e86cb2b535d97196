//! Caller-supplied cancellation and deadline for store calls.
//!
//! # Invariants
//! - Every repository operation checks its context before dispatching to the
//!   store and again before committing a transaction.
//! - A cancelled transactional call is rolled back, never partially committed.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Why a call context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation signal plus optional deadline, cloned into each call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that never expires unless cancelled through its token.
    pub fn background() -> Self {
        Self::default()
    }

    /// Shares cancellation with an existing token, e.g. a server shutdown token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Returns a copy that also expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            token: self.token.clone(),
            deadline: Some(match self.deadline {
                Some(existing) if existing < deadline => existing,
                _ => deadline,
            }),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails when the context was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallContext, Interrupted};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn background_context_is_live_until_cancelled() {
        let ctx = CallContext::background();
        assert_eq!(ctx.check(), Ok(()));

        let child = ctx.clone();
        ctx.cancel();
        assert_eq!(child.check(), Err(Interrupted::Cancelled));
    }

    #[test]
    fn zero_timeout_expires_immediately() {
        let ctx = CallContext::background().with_timeout(Duration::ZERO);
        assert_eq!(ctx.check(), Err(Interrupted::DeadlineExceeded));
    }

    #[test]
    fn nested_timeout_keeps_earliest_deadline() {
        let short = CallContext::background().with_timeout(Duration::from_millis(10));
        let nested = short.with_timeout(Duration::from_secs(60));
        assert_eq!(nested.deadline(), short.deadline());
    }

    #[test]
    fn shared_token_cancels_every_derived_context() {
        let shutdown = CancellationToken::new();
        let ctx = CallContext::with_token(shutdown.clone());
        let timed = ctx.with_timeout(Duration::from_secs(60));
        assert_eq!(timed.check(), Ok(()));
        assert!(ctx.deadline().is_none());

        shutdown.cancel();
        assert_eq!(ctx.check(), Err(Interrupted::Cancelled));
        assert_eq!(timed.check(), Err(Interrupted::Cancelled));
        assert!(timed.token().is_cancelled());
    }
}
