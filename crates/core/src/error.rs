use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelosError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unterminated '${{' placeholder in '{0}'")]
    UnterminatedPlaceholder(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
