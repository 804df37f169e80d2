use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::zig_env::{parse_std_dir, run_zig_env};
use crate::ProjectConfig;

/// Lazily populated lookup tables, guarded by one mutex.
#[derive(Debug, Default)]
struct Tables {
    packages: Option<Arc<IndexMap<String, PathBuf>>>,
    /// `None` until probed; `Some(None)` once probing failed.
    std_dir: Option<Option<PathBuf>>,
}

/// A directory of Zig sources together with its analyzer configuration.
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project
    pub root_directory: PathBuf,
    /// Path to `ziglens.toml`, if the project has one
    pub manifest_path: Option<PathBuf>,
    pub config: ProjectConfig,
    tables: Mutex<Tables>,
}

impl Project {
    pub fn new(root_directory: PathBuf, config: ProjectConfig) -> Self {
        Self {
            root_directory,
            manifest_path: None,
            config,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// A project without a manifest, rooted at `root_directory`.
    pub fn detached(root_directory: PathBuf) -> Self {
        Self::new(root_directory, ProjectConfig::default())
    }

    pub fn with_manifest_path(mut self, manifest_path: PathBuf) -> Self {
        self.manifest_path = Some(manifest_path);
        self
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check if a path belongs to this project
    pub fn contains_path(&self, path: &Path) -> bool {
        path.starts_with(&self.root_directory)
    }

    /// Pointer width in bits used for `usize`/`isize`.
    pub fn target_ptr_size(&self) -> u32 {
        match self.config.target_ptr_size {
            0 => usize::BITS,
            bits => bits,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.root_directory.join(path))
        }
    }

    /// Package name to absolute root file.
    pub fn packages(&self) -> Arc<IndexMap<String, PathBuf>> {
        let mut tables = self.tables();
        tables
            .packages
            .get_or_insert_with(|| {
                Arc::new(
                    self.config
                        .packages
                        .iter()
                        .map(|(name, path)| (name.clone(), self.resolve(path)))
                        .collect(),
                )
            })
            .clone()
    }

    /// Overrides standard library discovery.
    pub fn set_std_dir(&self, std_dir: Option<PathBuf>) {
        self.tables().std_dir = Some(std_dir);
    }

    /// Standard library directory, discovered once through `zig env`.
    pub fn std_lib_path(&self) -> Option<PathBuf> {
        if let Some(cached) = &self.tables().std_dir {
            return cached.clone();
        }
        let executable = self.config.zig_executable.as_deref().unwrap_or("zig");
        let std_dir = match run_zig_env(executable) {
            Ok(output) => {
                let dir = parse_std_dir(&output);
                if dir.is_none() {
                    warn!("`{executable} env` did not report std_dir");
                }
                dir
            }
            Err(e) => {
                warn!("Standard library discovery failed: {e}");
                None
            }
        };
        self.tables().std_dir.get_or_insert(std_dir).clone()
    }

    /// Resolves the argument of `@import(name)` seen in `current_file`.
    pub fn import_path(&self, name: &str, current_file: &Path) -> Option<PathBuf> {
        if name.ends_with(".zig") {
            let dir = current_file.parent().unwrap_or_else(|| Path::new(""));
            return Some(normalize(&dir.join(name)));
        }
        if let Some(path) = self.packages().get(name) {
            return Some(path.clone());
        }
        if name == "std" {
            return self.std_lib_path().map(|dir| dir.join("std.zig"));
        }
        debug!("Unknown package '{name}'");
        None
    }

    /// Resolves the header of `@cInclude(header)`: next to `current_file` first,
    /// then in the configured include paths.
    pub fn c_include_path(&self, header: &str, current_file: &Path) -> Option<PathBuf> {
        let local = current_file.parent().map(|dir| dir.join(header));
        local
            .into_iter()
            .chain(
                self.config
                    .c_include_paths
                    .iter()
                    .map(|dir| self.resolve(dir).join(header)),
            )
            .find(|candidate| candidate.is_file())
            .map(|p| normalize(&p))
    }

    /// Dotted module name of `current_file`, e.g. `mylib.sub.file`. Files outside
    /// every package are named by their stem.
    pub fn qualifier_path(&self, current_file: &Path) -> String {
        let mut roots: Vec<(String, PathBuf)> = self
            .packages()
            .iter()
            .map(|(name, path)| (name.clone(), path.clone()))
            .collect();
        let std_cached = self.tables().std_dir.clone().flatten();
        if let Some(std_dir) = std_cached {
            roots.push(("std".to_string(), std_dir.join("std.zig")));
        }

        let best = roots
            .iter()
            .filter_map(|(name, main)| {
                let dir = main.parent()?;
                current_file.starts_with(dir).then_some((name, main, dir))
            })
            .max_by_key(|(_, _, dir)| dir.components().count());

        match best {
            Some((name, main, _)) if main == current_file => name.clone(),
            Some((name, _, dir)) => {
                let mut parts = vec![name.clone()];
                parts.extend(module_components(current_file.strip_prefix(dir).unwrap_or(current_file)));
                parts.join(".")
            }
            None => current_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// All `.zig` files under the project root, honoring ignore files.
    pub fn source_files(&self) -> Vec<PathBuf> {
        use ignore::WalkBuilder;
        let walker = WalkBuilder::new(&self.root_directory)
            .follow_links(false)
            .build();

        walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("zig"))
            .collect()
    }
}

fn module_components(relative: &Path) -> Vec<String> {
    let mut parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if let Some(last) = parts.last_mut() {
        if let Some(stem) = last.strip_suffix(".zig") {
            *last = stem.to_string();
        }
    }
    parts
}

/// Lexically removes `.` and `..` components.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
