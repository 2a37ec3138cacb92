use thiserror::Error;

use tfstate_model::StateDecodeError;

/// Failures surfaced to the prompt. Transport problems, bad responses, and
/// unknown names stay distinct so each gets a specific one-line message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("http error {status} from {url}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    State(#[from] StateDecodeError),

    #[error("environment not found")]
    UnknownEnvironment { name: String },

    #[error("no state versions for workspace {workspace}")]
    NoStateVersions { workspace: String },
}
