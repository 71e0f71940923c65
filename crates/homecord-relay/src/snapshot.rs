//! Snapshot fetching over the platform's media proxy endpoints

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use homecord_core::{EntityId, EntityKind};
use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::debug;

/// Errors from a snapshot fetch attempt
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The proxy answered with a non-success status
    #[error("snapshot for {entity_id} returned status {status}")]
    Status {
        entity_id: String,
        status: StatusCode,
    },

    /// The request failed in transit
    #[error("snapshot request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The fetch exceeded the configured timeout
    #[error("snapshot for {entity_id} timed out after {timeout:?}")]
    Timeout {
        entity_id: String,
        timeout: Duration,
    },

    /// The entity kind has no snapshot endpoint
    #[error("{entity_id} has no snapshot endpoint")]
    NoEndpoint { entity_id: String },
}

/// Fetches snapshot bytes from the platform's camera and image proxies
///
/// Stateless apart from the HTTP client; a fetch is a single bounded
/// attempt and concurrent calls are fine.
pub struct SnapshotFetcher {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl SnapshotFetcher {
    /// Create a fetcher for the platform at `base_url`
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SnapshotError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    /// Fetch the raw snapshot bytes for a camera or image entity
    pub async fn fetch(&self, entity_id: &EntityId) -> Result<Vec<u8>, SnapshotError> {
        let proxy = match entity_id.kind() {
            EntityKind::Camera => "camera_proxy",
            EntityKind::Image => "image_proxy",
            _ => {
                return Err(SnapshotError::NoEndpoint {
                    entity_id: entity_id.to_string(),
                })
            }
        };
        let url = format!("{}/api/{}/{}", self.base_url, proxy, entity_id);

        debug!(entity_id = %entity_id, url = %url, "Fetching snapshot");

        let mut request = self.client.get(&url);
        if let Some(ref token) = self.token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify(entity_id, e))?;

        if response.status() != StatusCode::OK {
            return Err(SnapshotError::Status {
                entity_id: entity_id.to_string(),
                status: response.status(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.classify(entity_id, e))?;
        Ok(bytes.to_vec())
    }

    fn classify(&self, entity_id: &EntityId, error: reqwest::Error) -> SnapshotError {
        if error.is_timeout() {
            SnapshotError::Timeout {
                entity_id: entity_id.to_string(),
                timeout: self.timeout,
            }
        } else {
            SnapshotError::Transport(error)
        }
    }
}

/// Encode snapshot bytes for transport inside a JSON payload
pub fn encode_snapshot(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
