//! Mutable lookup state behind the read-eval-print loop.

use std::collections::BTreeMap;

use tfstate_backend::{ApiError, EnvironmentDirectory};
use tfstate_model::FlatEntry;

/// Why a lookup produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetError {
    /// No environment has been loaded yet.
    NotLoaded,
    /// The loaded mapping has no entry for the path.
    NotFound,
}

/// One interactive session: the discovered directory plus at most one loaded
/// environment's flattened state.
pub struct LookupSession {
    directory: EnvironmentDirectory,
    loaded: Option<LoadedEnvironment>,
}

struct LoadedEnvironment {
    flat: BTreeMap<String, FlatEntry>,
    keys: Vec<String>,
}

impl LookupSession {
    pub fn new(directory: EnvironmentDirectory) -> Self {
        Self {
            directory,
            loaded: None,
        }
    }

    /// Loads the named environment and swaps in its flattened mapping.
    ///
    /// On failure the previously loaded mapping stays as it was.
    pub fn load(&mut self, name: &str) -> Result<(), ApiError> {
        let document = self.directory.load(name)?;
        let flat = document.flatten();
        let keys = length_sorted_keys(&flat);
        self.loaded = Some(LoadedEnvironment { flat, keys });
        Ok(())
    }

    pub fn get(&self, path: &str) -> Result<&FlatEntry, GetError> {
        let Some(loaded) = &self.loaded else {
            return Err(GetError::NotLoaded);
        };
        loaded.flat.get(path).ok_or(GetError::NotFound)
    }

    /// Every discoverable environment name, sorted.
    pub fn environment_names(&self) -> Vec<String> {
        self.directory.names()
    }

    /// Completion candidates for `get`, shortest paths first.
    pub fn completion_keys(&self) -> &[String] {
        self.loaded.as_ref().map(|l| l.keys.as_slice()).unwrap_or(&[])
    }
}

// Ties on length fall back to lexicographic order so completion output is
// stable run to run.
fn length_sorted_keys(flat: &BTreeMap<String, FlatEntry>) -> Vec<String> {
    let mut keys: Vec<String> = flat.keys().cloned().collect();
    keys.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    keys
}
