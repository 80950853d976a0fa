//! Symbolic directory registry for locator expansion.
//!
//! A document locator may embed a `$NAME$` placeholder pointing at a
//! registered base directory, so config files can reference each other
//! without hard-coding absolute paths. The registry is built once at
//! startup and passed explicitly to the loader; there is no process-global
//! state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConflateError;
use crate::strings;

/// Read-only mapping from symbolic directory names to absolute base paths.
#[derive(Debug, Clone, Default)]
pub struct Directories {
    dirs: HashMap<String, PathBuf>,
}

impl Directories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the conventional project layout under `base`: the base itself
    /// plus its `configs`, `dataset`, `docs`, and `graphics` subdirectories.
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let mut dirs = Self::new();
        dirs.insert("base", base);
        for name in ["configs", "dataset", "docs", "graphics"] {
            dirs.insert(name, base.join(name));
        }
        dirs
    }

    /// Register a directory under a symbolic name. Later registrations of
    /// the same name replace earlier ones.
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.dirs.insert(name.into(), path.into());
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.dirs.get(name).map(PathBuf::as_path)
    }

    /// Expand a `$NAME$` placeholder in `locator` into its registered base
    /// path. Locators without a `$` pass through unchanged. Doubled path
    /// separators introduced by the substitution are collapsed.
    pub fn expand(&self, locator: &str) -> Result<String, ConflateError> {
        if !locator.contains('$') {
            return Ok(locator.to_string());
        }

        let name = strings::extract_between(locator, "$", "$")
            .ok_or_else(|| ConflateError::UnknownDirectory(locator.to_string()))?;
        let dir = self
            .dirs
            .get(name)
            .ok_or_else(|| ConflateError::UnknownDirectory(name.to_string()))?;

        let expanded = locator.replace(&format!("${name}$"), &dir.to_string_lossy());
        Ok(strings::deduplicate(
            &expanded,
            std::path::MAIN_SEPARATOR_STR,
        ))
    }
}
