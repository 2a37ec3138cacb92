//! Terraform Enterprise state explorer
//!
//! Interactive lookup shell over remote Terraform state:
//! - Discovers every environment the configured service exposes (legacy and
//!   workspace APIs)
//! - Loads one environment's state on demand and flattens it to dotted paths
//! - Answers `get <path>` lookups with tab completion over known paths

use anyhow::{Context, Result};

use tfstate_backend::{default_backends, Config, EnvironmentDirectory};

mod repl;
mod session;

use session::LookupSession;

fn main() -> Result<()> {
    let config = Config::from_env()?;
    let backends = default_backends(&config).context("failed to initialize state backends")?;
    let directory =
        EnvironmentDirectory::discover(&backends).context("failed to discover environments")?;
    repl::run(LookupSession::new(directory))
}
