//! The organization/workspace service (version 2).
//!
//! Discovery walks organizations and then each organization's workspaces.
//! Loading resolves the workspace's state-version list, takes the newest
//! entry, and downloads its hosted payload.

use serde::Deserialize;

use tfstate_model::StateDocument;

use crate::config::Config;
use crate::error::ApiError;
use crate::{BackendVersion, StateBackend};

pub struct WorkspaceBackend {
    client: reqwest::blocking::Client,
    address: String,
    token: String,
}

impl WorkspaceBackend {
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

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
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
        let bytes = resp.bytes().map_err(|e| ApiError::Network {
            url: url.to_string(),
            source: e,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            source: e,
        })
    }

    // Hosted state URLs are pre-signed, so the credential header stays off
    // this request.
    fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let resp = self.client.get(url).send().map_err(|e| ApiError::Network {
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
        let bytes = resp.bytes().map_err(|e| ApiError::Network {
            url: url.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct OrganizationList {
    #[serde(default)]
    data: Vec<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WorkspaceList {
    #[serde(default)]
    data: Vec<Workspace>,
}

#[derive(Debug, Deserialize)]
struct Workspace {
    attributes: WorkspaceAttributes,
}

#[derive(Debug, Deserialize)]
struct WorkspaceAttributes {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct StateVersionList {
    #[serde(default)]
    data: Vec<StateVersion>,
}

#[derive(Debug, Deserialize)]
struct StateVersion {
    attributes: StateVersionAttributes,
}

#[derive(Debug, Deserialize)]
struct StateVersionAttributes {
    #[serde(rename = "hosted-state-download-url")]
    hosted_state_download_url: String,
}

// Display names are `organization/workspace`; the workspace half keeps any
// further slashes.
fn split_environment_name(name: &str) -> Option<(&str, &str)> {
    name.split_once('/')
}

impl StateBackend for WorkspaceBackend {
    fn version(&self) -> BackendVersion {
        BackendVersion::V2
    }

    fn discover(&self) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/api/v2/organizations", self.address);
        let organizations: OrganizationList = self.get_json(&url, &[])?;

        let mut names = Vec::new();
        for organization in organizations.data {
            let url = format!(
                "{}/api/v2/organizations/{}/workspaces",
                self.address, organization.id
            );
            let workspaces: WorkspaceList = self.get_json(&url, &[])?;
            for workspace in workspaces.data {
                names.push(format!("{}/{}", organization.id, workspace.attributes.name));
            }
        }
        Ok(names)
    }

    fn load_state(&self, name: &str) -> Result<StateDocument, ApiError> {
        let Some((organization, workspace)) = split_environment_name(name) else {
            return Err(ApiError::UnknownEnvironment {
                name: name.to_string(),
            });
        };

        let url = format!("{}/api/v2/state-versions", self.address);
        let versions: StateVersionList = self.get_json(
            &url,
            &[
                ("filter[organization][name]", organization),
                ("filter[workspace][name]", workspace),
            ],
        )?;

        // Index 0 is the service's newest-first ordering, taken verbatim.
        let Some(latest) = versions.data.into_iter().next() else {
            return Err(ApiError::NoStateVersions {
                workspace: name.to_string(),
            });
        };

        let raw = self.download(&latest.attributes.hosted_state_download_url)?;
        Ok(StateDocument::from_slice(&raw)?)
    }
}
