//! Environment discovery and state retrieval.
//!
//! Two incompatible APIs expose loadable state documents: the legacy
//! per-account state host (version 1) and the organization/workspace service
//! (version 2). Both are modeled behind the [`StateBackend`] capability so
//! the directory can merge their listings into one namespace and remember,
//! per environment, which backend fetches it.

use std::sync::Arc;

use tfstate_model::StateDocument;

mod atlas;
mod config;
mod directory;
mod error;
mod workspace;

pub use atlas::AtlasBackend;
pub use config::{Config, ConfigError};
pub use config::{ATLAS_ADDRESS_ENV, ATLAS_HTTP_TIMEOUT_SECS_ENV, ATLAS_TOKEN_ENV};
pub use directory::EnvironmentDirectory;
pub use error::ApiError;
pub use workspace::WorkspaceBackend;

/// Which API shape an environment must be fetched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendVersion {
    V1,
    V2,
}

/// A source of named environments and their state documents.
pub trait StateBackend {
    fn version(&self) -> BackendVersion;

    /// List every environment display name this backend can see.
    fn discover(&self) -> Result<Vec<String>, ApiError>;

    /// Fetch and decode the current state document for one environment.
    fn load_state(&self, name: &str) -> Result<StateDocument, ApiError>;
}

/// Build the production backend pair in merge order: the legacy pass runs
/// first, so workspace entries win name collisions.
pub fn default_backends(config: &Config) -> Result<Vec<Arc<dyn StateBackend>>, ApiError> {
    Ok(vec![
        Arc::new(AtlasBackend::new(config)?),
        Arc::new(WorkspaceBackend::new(config)?),
    ])
}
