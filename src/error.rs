//! Terminal error taxonomy for transfer jobs.
//!
//! Every job ends through exactly one terminal event; when that event is a
//! failure, it carries one of these. Cancellation is a failure with a fixed
//! reason so that success, failure, and cancel share one reclamation path.

use thiserror::Error;

/// Reason a transfer job failed. Forwarded to the caller verbatim in the
/// `Failed` notice; never retried by the coordinator (retry, if any, is the
/// worker's business).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The caller canceled the job, or the coordinator released the worker
    /// during shutdown before it finished.
    #[error("Canceled")]
    Canceled,
    /// Opaque failure reported by the transfer worker.
    #[error("{0}")]
    Worker(String),
}

impl TransferError {
    /// True for caller- or shutdown-initiated cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TransferError::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canceled_has_fixed_reason() {
        assert_eq!(TransferError::Canceled.to_string(), "Canceled");
        assert!(TransferError::Canceled.is_canceled());
    }

    #[test]
    fn worker_error_is_forwarded_verbatim() {
        let err = TransferError::Worker("connection reset by peer".into());
        assert_eq!(err.to_string(), "connection reset by peer");
        assert!(!err.is_canceled());
    }
}
