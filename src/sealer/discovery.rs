//! Locating the external sealing executable.
//!
//! The search path is tried first. When discovery is enabled the working
//! directory and its ancestors are searched next, up to the filesystem root
//! or [`MAX_ANCESTOR_DEPTH`] directories, whichever comes first.

use crate::config::MAX_ANCESTOR_DEPTH;
use crate::errors::{Result, SealError};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn candidate_names(name: &str) -> Vec<String> {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() || name.ends_with(suffix) {
        vec![name.to_string()]
    } else {
        vec![name.to_string(), format!("{name}{suffix}")]
    }
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    candidate_names(name)
        .into_iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| is_executable(path))
}

/// Search each directory of a `PATH`-style list for `name`.
pub fn lookup_in_path(name: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let path_var = path_var?;
    std::env::split_paths(path_var)
        // An empty entry means the current directory.
        .map(|dir| if dir.as_os_str().is_empty() { PathBuf::from(".") } else { dir })
        .find_map(|dir| find_in_dir(&dir, name))
}

/// Walk from `start` towards the root looking for `name`.
pub fn find_in_ancestors(start: &Path, name: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = Some(start);
    for _ in 0..max_depth {
        let current = dir?;
        debug!("Looking for {} in {}", name, current.display());
        if let Some(found) = find_in_dir(current, name) {
            return Some(found);
        }
        dir = current.parent();
    }
    None
}

/// Finds an executable by name.
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    name: String,
    discovery: bool,
    search_path: Option<OsString>,
    working_dir: Option<PathBuf>,
}

impl ExecutableLocator {
    /// Locator using the process `PATH` and working directory.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            discovery: false,
            search_path: std::env::var_os("PATH"),
            working_dir: None,
        }
    }

    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discovery = enabled;
        self
    }

    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn locate(&self) -> Result<PathBuf> {
        // A name with a separator is used as given.
        if self.name.contains(std::path::MAIN_SEPARATOR) || self.name.contains('/') {
            let path = PathBuf::from(&self.name);
            return if is_executable(&path) {
                Ok(path)
            } else {
                Err(SealError::SealerNotFound(self.name.clone()))
            };
        }

        if let Some(found) = lookup_in_path(&self.name, self.search_path.as_deref()) {
            debug!("Found {} on PATH at {}", self.name, found.display());
            return Ok(found);
        }

        if !self.discovery {
            return Err(SealError::SealerNotFound(self.name.clone()));
        }

        let start = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| {
                SealError::SealerExecution {
                    message: format!("cannot determine working directory: {e}"),
                    stderr: String::new(),
                }
            })?,
        };

        match find_in_ancestors(&start, &self.name, MAX_ANCESTOR_DEPTH) {
            Some(found) => {
                debug!("Found {} above the working directory at {}", self.name, found.display());
                Ok(found)
            }
            None => Err(SealError::SealerNotFound(self.name.clone())),
        }
    }
}
