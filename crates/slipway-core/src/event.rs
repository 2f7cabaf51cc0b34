//! Source events that can start a release run.

use serde::{Deserialize, Serialize};

/// What kind of source event occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A commit was pushed to a branch.
    Push,
    /// A release was created.
    Release,
}

/// A source event. One is produced per pipeline invocation and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Fully qualified git reference, e.g. `refs/heads/master` or
    /// `refs/tags/v2.0.0`.
    pub reference: String,
}

impl Event {
    pub fn new(kind: EventKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
        }
    }

    /// Whether this event should publish an image.
    ///
    /// Pushes qualify only on the primary branch; created releases always
    /// qualify. Anything else is a no-op for the pipeline.
    pub fn qualifies(&self, primary_branch_ref: &str) -> bool {
        match self.kind {
            EventKind::Push => self.reference == primary_branch_ref,
            EventKind::Release => true,
        }
    }
}
