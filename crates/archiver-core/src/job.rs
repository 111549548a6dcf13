//! Download job: resource descriptor, immutable job context and phase machine.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::fetch_head::Endpoint;
use crate::storage;

/// One downloadable item: where it comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub url: String,
    pub destination: PathBuf,
}

impl ResourceDescriptor {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
        }
    }
}

/// Fresh opaque correlation token: 20 lowercase hex characters.
pub fn new_context_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(20);
    id
}

/// Everything later stages need about a job, fixed once the endpoint is resolved.
/// Passed by reference; nothing in it is recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub context_id: String,
    pub final_url: String,
    pub content_length: u64,
    pub staging_path: PathBuf,
    pub final_path: PathBuf,
}

impl JobContext {
    pub fn new(context_id: String, endpoint: Endpoint, final_path: &Path) -> Self {
        Self {
            context_id,
            final_url: endpoint.final_url,
            content_length: endpoint.content_length,
            staging_path: storage::staging_path(final_path),
            final_path: final_path.to_path_buf(),
        }
    }
}

/// Lifecycle of one job: `planning → resolving → chunking → finalizing → done | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Planning,
    Resolving,
    Chunking,
    Finalizing,
    Done,
    Failed,
}

impl JobPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Planning => "planning",
            JobPhase::Resolving => "resolving",
            JobPhase::Chunking => "chunking",
            JobPhase::Finalizing => "finalizing",
            JobPhase::Done => "done",
            JobPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Done | JobPhase::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: JobPhase) -> bool {
        use JobPhase::*;
        matches!(
            (self, next),
            (Planning, Resolving)
                | (Planning, Done)
                | (Resolving, Chunking)
                | (Chunking, Finalizing)
                | (Finalizing, Done)
                | (Planning, Failed)
                | (Resolving, Failed)
                | (Chunking, Failed)
                | (Finalizing, Failed)
        )
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the phase of one job and logs each transition.
#[derive(Debug)]
pub struct PhaseTracker {
    context_id: String,
    phase: JobPhase,
}

impl PhaseTracker {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            phase: JobPhase::Planning,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Move to `next`. Illegal transitions are ignored and return false.
    pub fn advance(&mut self, next: JobPhase) -> bool {
        if !self.phase.can_advance_to(next) {
            tracing::warn!(
                context_id = %self.context_id,
                from = %self.phase,
                to = %next,
                "ignoring illegal job phase transition"
            );
            return false;
        }
        tracing::debug!(context_id = %self.context_id, from = %self.phase, to = %next, "job phase");
        self.phase = next;
        true
    }
}
