use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::{Project, ProjectConfig, ProjectError, MANIFEST_FILE_NAME};

/// Discovers a project from a given path
///
/// Searches upward from `start_path` (a file or a directory) for a `ziglens.toml`
/// and loads it.
///
/// ## Returns
/// * `Ok(Some(Project))` if a manifest is found
/// * `Ok(None)` if no manifest is found
/// * `Err` if the manifest exists but cannot be read or parsed
pub fn discover_project(start_path: &Path) -> Result<Option<Project>, ProjectError> {
    match find_project_manifest(start_path) {
        Some(manifest_path) => {
            debug!("Found project manifest at: {}", manifest_path.display());
            load_project_from_manifest(&manifest_path).map(Some)
        }
        None => {
            trace!(
                "No project manifest found starting from: {}",
                start_path.display()
            );
            Ok(None)
        }
    }
}

fn find_project_manifest(start_path: &Path) -> Option<PathBuf> {
    let start_dir = if start_path.is_file() {
        start_path.parent()?
    } else {
        start_path
    };

    start_dir
        .ancestors()
        .map(|dir| dir.join(MANIFEST_FILE_NAME))
        .find(|candidate| candidate.exists())
}

fn load_project_from_manifest(manifest_path: &Path) -> Result<Project, ProjectError> {
    let config = ProjectConfig::from_path(manifest_path)?;
    let root_directory = manifest_path
        .parent()
        .map(Path::to_owned)
        .unwrap_or_default();
    Ok(Project::new(root_directory, config).with_manifest_path(manifest_path.to_owned()))
}
