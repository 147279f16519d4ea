use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

// Errors that can escape a scenario. Section and report parsing never return
// these; they log and fall back to empty tables instead.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("scenario {scenario} failed: {message}")]
    Scenario { scenario: String, message: String },
}

impl ExtractError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}
