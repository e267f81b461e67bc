//! Include path resolution
//!
//! Maps the logical name in a `["_fileobj", "name"]` expression to a concrete
//! file. The default [`SearchPathResolver`] looks next to the including file
//! first, then in configured include directories, then in the directories
//! listed in `JSONCFG_INCLUDE_PATH`.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable holding extra include directories
pub const INCLUDE_PATH_ENV: &str = "JSONCFG_INCLUDE_PATH";

/// Resolves include names to file paths
pub trait IncludeResolver: Send + Sync {
    /// Resolve `name` as included from `including_file` (if any)
    fn resolve(&self, name: &str, including_file: Option<&Path>) -> Result<PathBuf>;
}

/// Resolver searching the including file's directory and a list of include directories
#[derive(Debug, Clone, Default)]
pub struct SearchPathResolver {
    dirs: Vec<PathBuf>,
    use_env: bool,
}

impl SearchPathResolver {
    /// Create a resolver that also consults `JSONCFG_INCLUDE_PATH`
    pub fn new() -> Self {
        Self {
            dirs: Vec::new(),
            use_env: true,
        }
    }

    /// Add an include directory, searched in insertion order
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    /// Set whether `JSONCFG_INCLUDE_PATH` is consulted
    pub fn with_env(mut self, enabled: bool) -> Self {
        self.use_env = enabled;
        self
    }

    fn candidates(&self, name: &str, including_file: Option<&Path>) -> Vec<PathBuf> {
        let name_path = Path::new(name);
        if name_path.is_absolute() {
            return vec![name_path.to_path_buf()];
        }

        let mut candidates = Vec::new();
        if let Some(dir) = including_file.and_then(Path::parent) {
            candidates.push(dir.join(name_path));
        }
        for dir in &self.dirs {
            candidates.push(dir.join(name_path));
        }
        if self.use_env {
            if let Some(paths) = std::env::var_os(INCLUDE_PATH_ENV) {
                for dir in std::env::split_paths(&paths) {
                    if !dir.as_os_str().is_empty() {
                        candidates.push(dir.join(name_path));
                    }
                }
            }
        }
        candidates
    }
}

impl IncludeResolver for SearchPathResolver {
    fn resolve(&self, name: &str, including_file: Option<&Path>) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(Error::include_not_found(name));
        }
        for candidate in self.candidates(name, including_file) {
            log::trace!("Trying include candidate {}", candidate.display());
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(Error::include_not_found(name))
    }
}

/// Resolver that joins relative names onto the including file's directory
/// without checking that the result exists
///
/// Useful with sources that are not backed by the local filesystem, such as
/// [`MemorySource`](crate::source::MemorySource).
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeResolver;

impl IncludeResolver for RelativeResolver {
    fn resolve(&self, name: &str, including_file: Option<&Path>) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(Error::include_not_found(name));
        }
        let name_path = Path::new(name);
        match including_file.and_then(Path::parent) {
            Some(dir) if !name_path.is_absolute() => Ok(dir.join(name_path)),
            _ => Ok(name_path.to_path_buf()),
        }
    }
}
