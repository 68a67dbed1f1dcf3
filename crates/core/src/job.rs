//! Background processing job status.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a backend processing job (e.g. "analyze this
/// uploaded video"), associated with one feed.
///
/// Transitions are monotonic: a job never moves backward, and the
/// terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether this status ends the job's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` respects the monotonic
    /// ordering (`pending -> processing -> completed | failed`).
    /// Staying in place is always allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        match self {
            Self::Pending => true,
            Self::Processing => next.is_terminal(),
            Self::Completed | Self::Failed => false,
        }
    }

    /// Status label as reported by the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
