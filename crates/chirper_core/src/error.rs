//! Error taxonomy shared by service and repository layers.
//!
//! Layer errors (`RepoError`, `ServiceError`) keep their own variants and
//! classify themselves through [`ErrorKind`] so callers can map failures to
//! transport status codes without matching on layer internals.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller input rejected before any store call.
    Validation,
    /// A referenced author or tweet is absent during a conditional write.
    PreconditionFailed,
    /// Batch exceeds the fixed physical batch limit.
    CapacityExceeded,
    /// Point lookup found no record.
    NotFound,
    /// Call context was cancelled or its deadline passed.
    Cancelled,
    /// Failure reported by the store itself.
    Store,
}

impl ErrorKind {
    /// Whether retrying the same call unchanged may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Store | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::PreconditionFailed => "precondition_failed",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::NotFound => "not_found",
            Self::Cancelled => "cancelled",
            Self::Store => "store",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorKind;

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(ErrorKind::Store.is_retryable());
        assert!(ErrorKind::Cancelled.is_retryable());
        for kind in [
            ErrorKind::Validation,
            ErrorKind::PreconditionFailed,
            ErrorKind::CapacityExceeded,
            ErrorKind::NotFound,
        ] {
            assert!(!kind.is_retryable(), "{kind} must not be retried");
        }
    }
}
