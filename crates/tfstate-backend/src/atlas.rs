//! The legacy per-account state host (version 1).
//!
//! Listing is paginated through a `page` query parameter and ends on the
//! first empty page; per-environment state comes back as the raw document
//! JSON.

use serde::Deserialize;

use tfstate_model::StateDocument;

use crate::config::Config;
use crate::error::ApiError;
use crate::{BackendVersion, StateBackend};

const ATLAS_TOKEN_HEADER: &str = "X-Atlas-Token";

pub struct AtlasBackend {
    client: reqwest::blocking::Client,
    address: String,
    token: String,
}

impl AtlasBackend {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            client,
            address: config.address.clone(),
            token: config.token.clone(),
        })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ApiError> {
        let resp = self
            .client
            .get(url)
            .header(ATLAS_TOKEN_HEADER, &self.token)
            .send()
            .map_err(|e| ApiError::Network {
                url: url.to_string(),
                source: e,
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ApiError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let resp = self.get(url)?;
        let bytes = resp.bytes().map_err(|e| ApiError::Network {
            url: url.to_string(),
            source: e,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            source: e,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StateListing {
    #[serde(default)]
    pub(crate) states: Vec<ListedState>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListedState {
    pub(crate) environment: ListedEnvironment,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListedEnvironment {
    #[serde(default)]
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) name: String,
}

/// Walk the paginated listing until a page comes back empty, composing each
/// entry's display name as `username/name`.
pub(crate) fn paginate_states<F>(mut fetch_page: F) -> Result<Vec<String>, ApiError>
where
    F: FnMut(u32) -> Result<StateListing, ApiError>,
{
    let mut names = Vec::new();
    let mut page = 1u32;
    loop {
        let listing = fetch_page(page)?;
        if listing.states.is_empty() {
            break;
        }
        for state in listing.states {
            names.push(format!(
                "{}/{}",
                state.environment.username, state.environment.name
            ));
        }
        page += 1;
    }
    Ok(names)
}

impl StateBackend for AtlasBackend {
    fn version(&self) -> BackendVersion {
        BackendVersion::V1
    }

    fn discover(&self) -> Result<Vec<String>, ApiError> {
        paginate_states(|page| {
            let url = format!("{}/api/v1/terraform/state?page={page}", self.address);
            self.get_json(&url)
        })
    }

    fn load_state(&self, name: &str) -> Result<StateDocument, ApiError> {
        let url = format!("{}/api/v1/terraform/state/{name}", self.address);
        let resp = self.get(&url)?;
        let bytes = resp.bytes().map_err(|e| ApiError::Network {
            url: url.clone(),
            source: e,
        })?;
        Ok(StateDocument::from_slice(&bytes)?)
    }
}
