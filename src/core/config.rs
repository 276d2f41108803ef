use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::catalog::CatalogPolicy;
use crate::core::request::RequestBuilder;
use crate::utils::url::{resolve_base_url, BASE_URL_ENV};

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// API root, e.g. `https://openrouter.ai/api/v1`
    pub base_url: Option<String>,
    /// Model used when the stored preferences name none
    pub default_model: Option<String>,
    /// Extra `max_tokens` caps keyed by model id
    #[serde(default)]
    pub token_caps: HashMap<String, u32>,
    /// Overrides for catalog ranking and filtering
    pub catalog: Option<CatalogPolicy>,
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn get_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let proj_dirs = ProjectDirs::from("org", "routechat", "routechat")
            .ok_or("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Endpoint base: `OPENROUTER_BASE_URL`, then the config file, then the
    /// public default.
    pub fn base_url(&self) -> String {
        resolve_base_url(std::env::var(BASE_URL_ENV).ok(), self.base_url.as_deref())
    }

    pub fn catalog_policy(&self) -> CatalogPolicy {
        self.catalog.clone().unwrap_or_default()
    }

    pub fn request_builder(&self) -> RequestBuilder {
        RequestBuilder::default().with_token_caps(
            self.token_caps
                .iter()
                .map(|(model, cap)| (model.clone(), *cap)),
        )
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (default)"),
        }
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset)"),
        }
        if self.token_caps.is_empty() {
            println!("  token-caps: (built-in only)");
        } else {
            println!("  token-caps:");
            let mut caps: Vec<_> = self.token_caps.iter().collect();
            caps.sort();
            for (model, cap) in caps {
                println!("    {model}: {cap}");
            }
        }
        if self.catalog.is_some() {
            println!("  catalog: custom policy");
        }
    }
}
