use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunegraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Unknown external track id, or an index outside the graph.
    #[error("not found: {0}")]
    NotFound(String),
    /// The catalog and graph disagree about a node the graph handed out.
    #[error("catalog/graph mismatch: {0}")]
    InternalConsistency(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl TunegraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TunegraphError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, TunegraphError>;
