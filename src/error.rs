use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatrunError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workspace validation failed: {0}")]
    WorkspaceValidation(String),

    #[error("Setup step failed: {0}")]
    Setup(String),

    #[error("Categorizer execution failed: {0}")]
    CategorizerExecution(String),

    #[error("Categorizer exceeded the {0}s wall-clock timeout")]
    CategorizerTimeout(u64),

    #[error("Output validation failed: {0}")]
    OutputValidation(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Run lock is held: {0}")]
    LockHeld(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatrunError>;
