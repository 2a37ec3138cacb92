//! Merged directory of environments across backend passes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tfstate_model::StateDocument;

use crate::error::ApiError;
use crate::{BackendVersion, StateBackend};

/// One discovered environment and the backend that can load it.
struct Environment {
    version: BackendVersion,
    backend: Arc<dyn StateBackend>,
}

/// Display-name index of every discovered environment.
///
/// Passes merge in order; a later pass that reuses a name replaces the
/// earlier entry.
#[derive(Default)]
pub struct EnvironmentDirectory {
    environments: BTreeMap<String, Environment>,
}

impl EnvironmentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every backend's discovery pass in order and merges the results.
    ///
    /// The first error aborts the remaining passes.
    pub fn discover(backends: &[Arc<dyn StateBackend>]) -> Result<Self, ApiError> {
        let mut directory = Self::new();
        for backend in backends {
            directory.merge_discovered(backend)?;
        }
        Ok(directory)
    }

    /// Merges one backend's discovery pass. On error the directory keeps
    /// whatever earlier passes contributed.
    pub fn merge_discovered(&mut self, backend: &Arc<dyn StateBackend>) -> Result<(), ApiError> {
        for name in backend.discover()? {
            self.environments.insert(
                name,
                Environment {
                    version: backend.version(),
                    backend: Arc::clone(backend),
                },
            );
        }
        Ok(())
    }

    /// Loads the named environment's state through the backend that
    /// discovered it.
    pub fn load(&self, name: &str) -> Result<StateDocument, ApiError> {
        let Some(environment) = self.environments.get(name) else {
            return Err(ApiError::UnknownEnvironment {
                name: name.to_string(),
            });
        };
        environment.backend.load_state(name)
    }

    /// Display names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    pub fn version_of(&self, name: &str) -> Option<BackendVersion> {
        self.environments.get(name).map(|e| e.version)
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBackend {
        version: BackendVersion,
        names: Vec<String>,
        fail_discovery: bool,
    }

    impl FakeBackend {
        fn shared(version: BackendVersion, names: &[&str]) -> Arc<dyn StateBackend> {
            Arc::new(Self {
                version,
                names: names.iter().map(|s| s.to_string()).collect(),
                fail_discovery: false,
            })
        }

        fn failing(version: BackendVersion) -> Arc<dyn StateBackend> {
            Arc::new(Self {
                version,
                names: Vec::new(),
                fail_discovery: true,
            })
        }
    }

    impl StateBackend for FakeBackend {
        fn version(&self) -> BackendVersion {
            self.version
        }

        fn discover(&self) -> Result<Vec<String>, ApiError> {
            if self.fail_discovery {
                return Err(ApiError::Http {
                    url: "https://atlas.test/api/v2/organizations".to_string(),
                    status: 500,
                    body: String::new(),
                });
            }
            Ok(self.names.clone())
        }

        fn load_state(&self, name: &str) -> Result<StateDocument, ApiError> {
            if !self.names.iter().any(|n| n == name) {
                return Err(ApiError::UnknownEnvironment {
                    name: name.to_string(),
                });
            }
            let serial = match self.version {
                BackendVersion::V1 => 1,
                BackendVersion::V2 => 2,
            };
            let raw = format!(r#"{{"version": 3, "serial": {serial}, "modules": []}}"#);
            Ok(StateDocument::from_slice(raw.as_bytes())?)
        }
    }

    #[test]
    fn later_passes_win_name_collisions() {
        let v1 = FakeBackend::shared(BackendVersion::V1, &["acme/prod", "acme/stage"]);
        let v2 = FakeBackend::shared(BackendVersion::V2, &["acme/prod", "initech/dev"]);
        let directory = EnvironmentDirectory::discover(&[v1, v2]).expect("discover");

        assert_eq!(directory.len(), 3);
        assert_eq!(directory.version_of("acme/prod"), Some(BackendVersion::V2));
        assert_eq!(directory.version_of("acme/stage"), Some(BackendVersion::V1));

        let loaded = directory.load("acme/prod").expect("load");
        assert_eq!(loaded.serial, 2);
    }

    #[test]
    fn names_come_back_sorted() {
        let v1 = FakeBackend::shared(BackendVersion::V1, &["zeta/one", "acme/prod"]);
        let directory = EnvironmentDirectory::discover(&[v1]).expect("discover");
        assert_eq!(directory.names(), vec!["acme/prod", "zeta/one"]);
    }

    #[test]
    fn unknown_names_are_reported_as_such() {
        let v1 = FakeBackend::shared(BackendVersion::V1, &["acme/prod"]);
        let directory = EnvironmentDirectory::discover(&[v1]).expect("discover");

        let err = directory.load("missing/env").expect_err("load should fail");
        assert!(matches!(err, ApiError::UnknownEnvironment { .. }));
        assert_eq!(err.to_string(), "environment not found");
    }

    #[test]
    fn failed_pass_keeps_entries_merged_before_it() {
        let mut directory = EnvironmentDirectory::new();
        let v1 = FakeBackend::shared(BackendVersion::V1, &["acme/prod"]);
        let v2 = FakeBackend::failing(BackendVersion::V2);

        directory.merge_discovered(&v1).expect("first pass");
        directory
            .merge_discovered(&v2)
            .expect_err("second pass should fail");

        assert_eq!(directory.names(), vec!["acme/prod"]);
        assert!(!directory.is_empty());
    }
}
