use rover_types::{ObjectRef, TypeError};

/// Errors from graph query and content operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The query service could not be reached or answered with a failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The requested blob is unknown to the graph.
    #[error("blob not found: {0}")]
    NotFound(ObjectRef),

    /// A blob exists but is not of the kind the operation needs.
    #[error("blob {blob} is not a {expected}")]
    WrongKind { blob: ObjectRef, expected: &'static str },

    /// A graph fixture could not be loaded.
    #[error("invalid fixture: {0}")]
    Fixture(String),

    /// A value failed to parse as a graph type.
    #[error("invalid value: {0}")]
    Type(#[from] TypeError),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while reading content or fixtures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
