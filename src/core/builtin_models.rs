//! Built-in fallback catalog
//!
//! The free and premium lists in `builtin_models.toml` are embedded at build
//! time and seed the catalog before the first successful refresh.

use serde::Deserialize;
use tracing::warn;

use crate::core::catalog::{sort_models, Catalog, CatalogPolicy, ModelInfo};

#[derive(Debug, Deserialize)]
struct BuiltinModel {
    id: String,
    name: String,
    provider: String,
    context_length: u64,
    #[serde(default)]
    supports_images: bool,
}

#[derive(Debug, Deserialize)]
struct BuiltinModelsConfig {
    #[serde(default)]
    free: Vec<BuiltinModel>,
    #[serde(default)]
    premium: Vec<BuiltinModel>,
}

impl BuiltinModel {
    fn into_model_info(self, is_free: bool) -> ModelInfo {
        ModelInfo {
            id: self.id,
            name: self.name,
            provider: self.provider,
            context_length: self.context_length,
            supports_images: self.supports_images,
            is_free,
            pricing: None,
        }
    }
}

const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

/// Load the embedded fallback catalog, sorted with `policy`.
pub fn load_builtin_catalog(policy: &CatalogPolicy) -> Catalog {
    let config: BuiltinModelsConfig = match toml::from_str(CONFIG_CONTENT) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Embedded builtin_models.toml did not parse");
            return Catalog::default();
        }
    };

    let mut free: Vec<ModelInfo> = config
        .free
        .into_iter()
        .map(|m| m.into_model_info(true))
        .collect();
    let mut premium: Vec<ModelInfo> = config
        .premium
        .into_iter()
        .map(|m| m.into_model_info(false))
        .collect();
    sort_models(&mut free, policy);
    sort_models(&mut premium, policy);

    Catalog { free, premium }
}
