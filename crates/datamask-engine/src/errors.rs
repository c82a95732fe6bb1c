use thiserror::Error;

/// Errors raised by generators, including option validation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("unknown generator '{0}'")]
    UnknownGenerator(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("generation failed: {0}")]
    Failed(String),
}

/// Errors raised by a record source.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("no row in '{table}' matches identifiers {identifiers}")]
    RowNotFound { table: String, identifiers: String },
    #[error("write rejected: {0}")]
    WriteRejected(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort processing of one entity.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("record is missing identifier column '{0}'")]
    MissingIdentifier(String),
    #[error("property '{field}': {source}")]
    Generation {
        field: String,
        #[source]
        source: GenerationError,
    },
    #[error("override executor '{executor}': {source}")]
    Override {
        executor: String,
        #[source]
        source: GenerationError,
    },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("pattern error: {0}")]
    Pattern(#[from] datamask_core::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
