use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("malformed package entry '{0}', expected 'name:path'")]
    MalformedPackage(String),
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
    #[error("`{executable} env` failed: {message}")]
    ZigEnv { executable: String, message: String },
}
