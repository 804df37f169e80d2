use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ProjectError;

pub const MANIFEST_FILE_NAME: &str = "ziglens.toml";

/// Per-project analyzer settings, loaded from `ziglens.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Executable queried with `env` to find the standard library.
    pub zig_executable: Option<String>,
    /// Pointer width in bits; `0` means the host default.
    pub target_ptr_size: u32,
    /// Directories searched by `@cInclude`.
    pub c_include_paths: Vec<PathBuf>,
    /// Package name to root file, absolute or relative to the project root.
    pub packages: IndexMap<String, PathBuf>,
}

impl ProjectConfig {
    pub fn from_path(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_file_content(&content)
    }

    pub fn from_file_content(content: &str) -> Result<Self, ProjectError> {
        let config: Self = toml::from_str(content).map_err(|e| {
            tracing::error!("Failed to parse TOML: {}", e);
            e
        })?;
        Ok(config)
    }

    /// Builds a configuration from the editor's key/value store
    /// (`zigExecutable`, `zigPackages`, `zigTargetPtrSize`). Unknown keys are ignored.
    pub fn from_key_values<'a, I>(entries: I) -> Result<Self, ProjectError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (key, value) in entries {
            match key {
                "zigExecutable" => {
                    let value = value.trim();
                    config.zig_executable = (!value.is_empty()).then(|| value.to_string());
                }
                "zigTargetPtrSize" => {
                    let value = value.trim();
                    config.target_ptr_size = if value.is_empty() {
                        0
                    } else {
                        value.parse().map_err(|_| ProjectError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        })?
                    };
                }
                "zigPackages" => {
                    for line in value.lines().map(str::trim).filter(|l| !l.is_empty()) {
                        let (name, path) = line
                            .split_once(':')
                            .filter(|(name, path)| !name.trim().is_empty() && !path.trim().is_empty())
                            .ok_or_else(|| ProjectError::MalformedPackage(line.to_string()))?;
                        config
                            .packages
                            .insert(name.trim().to_string(), PathBuf::from(path.trim()));
                    }
                }
                _ => {}
            }
        }
        Ok(config)
    }
}
