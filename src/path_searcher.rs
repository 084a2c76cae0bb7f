use crate::error::ShellError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Resolves command names against the directories of a search path.
#[derive(Debug, Clone, Default)]
pub struct PathSearcher {
    dirs: Vec<PathBuf>,
}

impl PathSearcher {
    /// Split a `PATH`-style value into its ordered directories. Empty
    /// entries are ignored.
    pub fn new(search_paths: &OsStr) -> Self {
        let dirs = std::env::split_paths(search_paths)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolve a command the way a typical shell would.
    ///
    /// - A name containing `/` is returned unchanged.
    /// - Otherwise each directory is searched in order and the first
    ///   existing `dir/name` wins.
    pub fn find_binary(&self, name: &str) -> Result<PathBuf, ShellError> {
        if name.contains('/') {
            return Ok(PathBuf::from(name));
        }
        if name.is_empty() {
            return Err(ShellError::command_not_found(name));
        }
        self.dirs
            .iter()
            .find_map(|dir| find_by_path(&dir.join(name)))
            .ok_or_else(|| ShellError::command_not_found(name))
    }
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    if path.exists() { Some(path.to_owned()) } else { None }
}
