//! Model listing functionality
//!
//! Refreshes the catalog from the model directory and prints it.

use std::error::Error;

use crate::api::models::HttpModelDirectory;
use crate::core::catalog::{Catalog, CatalogStore, ModelInfo, RefreshOutcome};
use crate::core::config::Config;
use crate::core::store::HistoryStore;
use crate::utils::auth::{resolve_credential, API_KEY_ENV};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFilter {
    All,
    Free,
    Premium,
}

pub async fn list_models(filter: ModelFilter, refresh_only: bool) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let store = HistoryStore::open_default()?;
    let prefs = store.preferences();
    let credential = resolve_credential(&prefs.api_key, std::env::var(API_KEY_ENV).ok());

    let catalog_store = CatalogStore::with_builtin(config.catalog_policy());
    let directory = HttpModelDirectory::new(reqwest::Client::new(), config.base_url());
    let outcome = catalog_store
        .refresh(&directory, credential.as_deref())
        .await;

    match outcome {
        RefreshOutcome::Replaced { free, premium } => {
            println!("🔄 Catalog refreshed: {free} free, {premium} premium models");
        }
        RefreshOutcome::Retained => {
            println!("⚠️  Could not fetch the model directory; showing the built-in catalog");
        }
    }
    if refresh_only {
        return Ok(());
    }

    let catalog = catalog_store.snapshot();
    println!();
    print!("{}", render_catalog(&catalog, filter, &prefs.selected_model));
    Ok(())
}

pub fn render_catalog(catalog: &Catalog, filter: ModelFilter, selected: &str) -> String {
    let mut out = String::new();
    if filter != ModelFilter::Premium {
        render_section(&mut out, "🆓 Free models", &catalog.free, selected);
    }
    if filter != ModelFilter::Free {
        if !out.is_empty() {
            out.push('\n');
        }
        render_section(&mut out, "💎 Premium models", &catalog.premium, selected);
    }
    out
}

fn render_section(out: &mut String, title: &str, models: &[ModelInfo], selected: &str) {
    out.push_str(&format!("{title} ({})\n", models.len()));
    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    if models.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    for model in models {
        let marker = if model.id == selected { "▶" } else { "•" };
        out.push_str(&format!("  {marker} {}\n", model.id));
        out.push_str(&format!("    Name: {} ({})\n", model.name, model.provider));
        let mut details = format!("    Context: {} tokens", model.context_length);
        if model.supports_images {
            details.push_str(", images");
        }
        if let Some(pricing) = &model.pricing {
            if !model.is_free {
                details.push_str(&format!(
                    ", ${}/${} per token",
                    pricing.prompt, pricing.completion
                ));
            }
        }
        out.push_str(&details);
        out.push('\n');
    }
}
