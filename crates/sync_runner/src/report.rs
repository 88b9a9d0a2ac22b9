//! Run report - aggregated outcome of one reconciliation run

use serde::Serialize;

use crate::reconcile::{Operation, OperationKind};

/// Result of applying a single operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    pub operation: Operation,
    /// `None` on success, the error message otherwise
    pub error: Option<String>,
}

impl OperationOutcome {
    pub fn succeeded(operation: Operation) -> Self {
        Self {
            operation,
            error: None,
        }
    }

    pub fn failed(operation: Operation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// An operation that failed, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationFailure {
    pub operation: Operation,
    pub reason: String,
}

/// Counts of one run plus the failed operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub deleted: usize,
    pub updated: usize,
    pub created: usize,
    /// Updates skipped by change detection
    pub unchanged: usize,
    pub failed: usize,
    pub failures: Vec<OperationFailure>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one outcome to the counts.
    pub fn record(&mut self, outcome: OperationOutcome) {
        match outcome.error {
            Some(reason) => {
                self.failed += 1;
                self.failures.push(OperationFailure {
                    operation: outcome.operation,
                    reason,
                });
            }
            None => match outcome.operation.kind() {
                OperationKind::Delete => self.deleted += 1,
                OperationKind::Update => self.updated += 1,
                OperationKind::Create => self.created += 1,
            },
        }
    }

    /// Number of operations that were attempted.
    pub fn attempted(&self) -> usize {
        self.deleted + self.updated + self.created + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
