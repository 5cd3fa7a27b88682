//! Task lifecycle states and the broadcast event type.
//!
//! Every download moves through a fixed state machine:
//!
//! ```text
//! Pending ──► Connecting ──► Downloading* ──► Success
//!                                        ├──► Error
//!                                        └──► Cancelled
//! ```
//!
//! `Pending` is skipped when the queue is idle and a task starts
//! immediately. `Downloading` repeats with monotonically non-decreasing
//! byte counts. `Success`, `Error` and `Cancelled` are terminal: no further
//! events are emitted for that task instance, and `Cancelled` is reachable
//! from any non-terminal state.

use thiserror::Error;

use crate::release::ReleaseDescriptor;
use crate::validate::ValidationError;

/// Why a download ended in the `Error` terminal state.
///
/// The `Display` text is the human-readable failure message surfaced to the
/// user (the service also logs it when the terminal event is emitted).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Transport-level failure: connection refused, timeout, local I/O.
    #[error("a network error prevented the download from completing")]
    Network,

    /// The server responded, but not successfully.
    #[error("the server responded with HTTP {status}")]
    Http { status: u16 },

    /// The artifact downloaded fully but failed verification.
    #[error("{0}")]
    Validation(ValidationError),
}

/// Lifecycle state of one download task instance.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// Queued behind another download.
    Pending,

    /// Transfer is being established.
    Connecting,

    /// Bytes are arriving. `total` is unknown when the server omits a
    /// content length.
    Downloading { read: u64, total: Option<u64> },

    /// The artifact was fetched, verified and promoted to the cache.
    Success { release: ReleaseDescriptor },

    /// The download or its verification failed.
    Error { kind: ErrorKind },

    /// The task was cancelled or superseded by a newer enqueue.
    Cancelled,
}

impl TaskState {
    /// Returns true if no further events follow this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::Error { .. } | Self::Cancelled
        )
    }

    /// Short lowercase name for logging and display.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Connecting => "connecting",
            Self::Downloading { .. } => "downloading",
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A state transition for one package, the unit of the broadcast stream.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub package: String,
    pub display_name: String,
    pub state: TaskState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn release() -> ReleaseDescriptor {
        ReleaseDescriptor {
            package: "com.example.app".to_string(),
            display_name: "Example".to_string(),
            version_code: 1,
            version_name: String::new(),
            url: "https://repo.example.org/a.zip".to_string(),
            auth_token: None,
            hash: "00".repeat(32),
            hash_type: String::new(),
            signer: "11".repeat(32),
            permissions: BTreeSet::new(),
            cache_file_name: "a.zip".to_string(),
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Success { release: release() }.is_terminal());
        assert!(TaskState::Error {
            kind: ErrorKind::Network
        }
        .is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }

    #[test]
    fn test_non_terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Connecting.is_terminal());
        assert!(!TaskState::Downloading {
            read: 10,
            total: Some(100)
        }
        .is_terminal());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(TaskState::Pending.name(), "pending");
        assert_eq!(
            TaskState::Downloading {
                read: 0,
                total: None
            }
            .name(),
            "downloading"
        );
        assert_eq!(TaskState::Cancelled.name(), "cancelled");
    }

    #[test]
    fn test_error_kind_display() {
        assert!(ErrorKind::Network.to_string().contains("network error"));
        assert!(ErrorKind::Http { status: 503 }.to_string().contains("503"));
        assert!(ErrorKind::Validation(ValidationError::Integrity)
            .to_string()
            .contains("digest"));
    }
}
