//! Run State - phase of a single reconciliation run

use serde::Serialize;

/// Phase of a reconciliation run.
///
/// ```text
/// Idle -> FetchingSource -> FetchingTarget -> Planning -> Executing -> Done
///              |                  |
///              +----> Failed <----+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPhase {
    Idle,
    FetchingSource,
    FetchingTarget,
    Planning,
    Executing,
    Done,
    /// A fetch failed or the run was cancelled before execution
    Failed,
}

impl RunPhase {
    /// Whether `self -> next` is an edge of the run state machine.
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle, FetchingSource)
                | (FetchingSource, FetchingTarget)
                | (FetchingTarget, Planning)
                | (Planning, Executing)
                | (Planning, Done)
                | (Executing, Done)
                | (FetchingSource, Failed)
                | (FetchingTarget, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingSource => "fetching-source",
            Self::FetchingTarget => "fetching-target",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the phase of one run.
#[derive(Debug, Clone)]
pub struct RunState {
    phase: RunPhase,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Moves to `next`. Returns `false` and stays put on an illegal edge.
    pub fn advance(&mut self, next: RunPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::error!(from = %self.phase, to = %next, "Illegal run phase transition");
            return false;
        }
        self.phase = next;
        true
    }
}
