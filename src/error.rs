use thiserror::Error;

/// Orchestration stage at which a bounded wait expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lookup,
    Select,
    Validate,
    Persist,
    UpdateCount,
    Registry,
    Reconcile,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Select => "select",
            Self::Validate => "validate",
            Self::Persist => "persist",
            Self::UpdateCount => "update_count",
            Self::Registry => "registry",
            Self::Reconcile => "reconcile",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no usable volunteer candidates")]
    NoCandidates,

    /// The ranking structure references ids absent from the durable store.
    #[error("ranking structure drift: unknown id(s) [{}]", .0.join(", "))]
    Drift(Vec<String>),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("timed out after {timeout_ms}ms during {stage}")]
    Timeout { stage: Stage, timeout_ms: u64 },

    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),

    #[error("failed to write notification intent: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode notification intent: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
