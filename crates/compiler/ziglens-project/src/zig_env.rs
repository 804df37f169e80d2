use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::ProjectError;

/// Runs `<executable> env` and returns its standard output.
pub(crate) fn run_zig_env(executable: &str) -> Result<String, ProjectError> {
    debug!("Running `{executable} env`");
    let output = Command::new(executable)
        .arg("env")
        .output()
        .map_err(|e| ProjectError::ZigEnv {
            executable: executable.to_string(),
            message: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(ProjectError::ZigEnv {
            executable: executable.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extracts `std_dir` from `zig env` output. Older toolchains print JSON, newer
/// ones print ZON (`.std_dir = "..."`).
pub fn parse_std_dir(output: &str) -> Option<PathBuf> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(output) {
        return value
            .get("std_dir")
            .and_then(|v| v.as_str())
            .map(PathBuf::from);
    }
    let rest = &output[output.find(".std_dir")? + ".std_dir".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start().strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(PathBuf::from(rest[..end].replace("\\\\", "\\")))
}
