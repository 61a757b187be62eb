use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an intent.
///
/// ```text
/// Created --analyze--> Analyzing --parsed--> ReadyForReview
/// ReadyForReview --confirm--> Executing
/// Executing --success--> Completed
/// Executing --error--> Failed
/// Analyzing --error--> Failed
/// ```
///
/// Cancellation adds `Created | Analyzing | ReadyForReview --cancel--> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentStatus {
    Created,
    Analyzing,
    ReadyForReview,
    Executing,
    Completed,
    Failed,
}

impl IntentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, IntentStatus::Completed | IntentStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: IntentStatus) -> bool {
        use IntentStatus::*;
        matches!(
            (self, next),
            (Created, Analyzing)
                | (Analyzing, ReadyForReview)
                | (ReadyForReview, Executing)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Analyzing, Failed)
        )
    }

    /// Cancellation is honoured only before execution starts.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            IntentStatus::Created | IntentStatus::Analyzing | IntentStatus::ReadyForReview
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntentStatus::Created => "created",
            IntentStatus::Analyzing => "analyzing",
            IntentStatus::ReadyForReview => "ready_for_review",
            IntentStatus::Executing => "executing",
            IntentStatus::Completed => "completed",
            IntentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(IntentStatus::Created),
            "analyzing" => Some(IntentStatus::Analyzing),
            "ready_for_review" => Some(IntentStatus::ReadyForReview),
            "executing" => Some(IntentStatus::Executing),
            "completed" => Some(IntentStatus::Completed),
            "failed" => Some(IntentStatus::Failed),
            _ => None,
        }
    }

    pub const ALL: [IntentStatus; 6] = [
        IntentStatus::Created,
        IntentStatus::Analyzing,
        IntentStatus::ReadyForReview,
        IntentStatus::Executing,
        IntentStatus::Completed,
        IntentStatus::Failed,
    ];
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
