//! `set`, `unset` and `config` commands.

use std::error::Error;

use crate::core::config::Config;
use crate::core::store::{HistoryStore, Preferences};
use crate::utils::auth::mask_credential;

fn policy_label(policy: Option<crate::api::DataPolicy>) -> &'static str {
    policy.map_or("(model default)", |p| p.as_str())
}

pub fn describe_preferences(prefs: &Preferences) -> String {
    let api_key = if prefs.api_key.is_empty() {
        "(unset)".to_string()
    } else {
        mask_credential(&prefs.api_key)
    };
    [
        format!("  api-key: {api_key}"),
        format!("  model: {}", prefs.selected_model),
        format!("  temperature: {}", prefs.temperature),
        format!("  top-p: {}", prefs.top_p),
        format!("  data-collection: {}", policy_label(prefs.data_collection)),
        format!("  training-data: {}", policy_label(prefs.training_data)),
        format!("  output-publishing: {}", policy_label(prefs.output_publishing)),
    ]
    .join("\n")
}

pub fn run_set(key: &str, value: &[String]) -> Result<(), Box<dyn Error>> {
    let mut store = HistoryStore::open_default()?;
    let mut prefs = store.preferences();
    let value = value.join(" ");

    if let Err(err) = prefs.apply_setting(key, &value) {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    store.set_preferences(&prefs)?;
    store.save()?;

    if key == "api-key" {
        println!("✅ Set api-key to: {}", mask_credential(&prefs.api_key));
    } else {
        println!("✅ Set {key} to: {}", value.trim());
    }
    Ok(())
}

pub fn run_unset(key: &str) -> Result<(), Box<dyn Error>> {
    let mut store = HistoryStore::open_default()?;
    let mut prefs = store.preferences();

    if let Err(err) = prefs.clear_setting(key) {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    store.set_preferences(&prefs)?;
    store.save()?;
    println!("✅ Unset {key}");
    Ok(())
}

pub fn show_config() -> Result<(), Box<dyn Error>> {
    let store = HistoryStore::open_default()?;
    println!("Preferences ({}):", store.path().display());
    println!("{}", describe_preferences(&store.preferences()));
    println!();
    Config::load()?.print_all();
    Ok(())
}
