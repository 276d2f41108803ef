use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::{ModelDescriptor, ModelsResponse};
use crate::utils::auth::add_auth_headers;
use crate::utils::url::{construct_api_url, MODELS_PATH};

/// Source of raw model descriptors.
///
/// Implementations never fail: any problem is logged and reported as an
/// empty listing, which the catalog treats as "keep what you have".
#[async_trait]
pub trait ModelDirectory: Send + Sync {
    async fn fetch_models(&self, credential: Option<&str>) -> Vec<ModelDescriptor>;
}

/// The public `GET /models` listing.
#[derive(Clone, Debug)]
pub struct HttpModelDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl HttpModelDirectory {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }
}

#[async_trait]
impl ModelDirectory for HttpModelDirectory {
    async fn fetch_models(&self, credential: Option<&str>) -> Vec<ModelDescriptor> {
        let models_url = construct_api_url(&self.base_url, MODELS_PATH);
        let request = add_auth_headers(
            self.http
                .get(models_url)
                .header("Content-Type", "application/json"),
            credential,
        );

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Error fetching model directory");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Failed to fetch models");
            return Vec::new();
        }

        match response.json::<ModelsResponse>().await {
            Ok(listing) => parse_descriptors(listing),
            Err(err) => {
                warn!(error = %err, "Model directory response did not parse");
                Vec::new()
            }
        }
    }
}

/// Validate directory entries one by one, skipping those missing required
/// fields.
pub fn parse_descriptors(listing: ModelsResponse) -> Vec<ModelDescriptor> {
    let total = listing.data.len();
    let descriptors: Vec<ModelDescriptor> = listing
        .data
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<ModelDescriptor>(raw) {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                debug!(error = %err, "Skipping malformed model descriptor");
                None
            }
        })
        .collect();

    if descriptors.len() < total {
        debug!(
            kept = descriptors.len(),
            skipped = total - descriptors.len(),
            "Parsed model directory"
        );
    }
    descriptors
}
