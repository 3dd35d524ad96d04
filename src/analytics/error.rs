use thiserror::Error;

/// Errors surfaced by the analytics recorder and reporter
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("invalid interaction type '{0}': expected one of view, whatsapp, email, phone")]
    InvalidInteractionType(String),

    #[error("interaction type is required")]
    MissingInteractionType,

    #[error("agent '{0}' not found")]
    AgentNotFound(String),

    #[error("analytics for agent '{agent_id}' changed concurrently {attempts} times in a row")]
    Contention { agent_id: String, attempts: u32 },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Dependency,
}

impl AnalyticsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyticsError::InvalidInteractionType(_) | AnalyticsError::MissingInteractionType => {
                ErrorKind::Validation
            }
            AnalyticsError::AgentNotFound(_) => ErrorKind::NotFound,
            AnalyticsError::Contention { .. } | AnalyticsError::Storage(_) => ErrorKind::Dependency,
        }
    }
}
