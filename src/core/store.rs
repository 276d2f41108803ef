//! Local history and preference store.
//!
//! Everything lives in one flat key/value snapshot serialized as a JSON
//! object. Messages and preferences are just well-known keys in it.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::api::DataPolicy;
use crate::core::catalog::DEFAULT_IMAGE_MODEL;
use crate::core::message::{Message, NewMessage};
use crate::core::request::{DEFAULT_TEMPERATURE, DEFAULT_TOP_P};

pub const MESSAGES_KEY: &str = "messages";
pub const PREFERENCES_KEY: &str = "preferences";
const STORE_FILE: &str = "chat-storage.json";

/// Settings the user can change. Policy flags left as `None` follow the
/// free/premium default of the selected model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub api_key: String,
    pub selected_model: String,
    /// Set once the user (or an image switch) picks `selected_model`; until
    /// then the config file's `default_model` takes precedence.
    pub model_chosen: bool,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_collection: Option<DataPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_data: Option<DataPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_publishing: Option<DataPolicy>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            selected_model: DEFAULT_IMAGE_MODEL.to_string(),
            model_chosen: false,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            data_collection: None,
            training_data: None,
            output_publishing: None,
        }
    }
}

pub const SETTING_KEYS: &[&str] = &[
    "api-key",
    "model",
    "temperature",
    "top-p",
    "data-collection",
    "training-data",
    "output-publishing",
];

fn parse_unit(key: &str, value: &str) -> Result<f32, String> {
    let parsed: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("{key} must be a number between 0 and 1"))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("{key} must be between 0 and 1"));
    }
    Ok(parsed)
}

impl Preferences {
    pub fn choose_model(&mut self, model: impl Into<String>) {
        self.selected_model = model.into();
        self.model_chosen = true;
    }

    /// Apply a `set <key> <value>` command.
    pub fn apply_setting(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "api-key" => self.api_key = value.trim().to_string(),
            "model" => {
                let model = value.trim();
                if model.is_empty() {
                    return Err("model must not be empty".to_string());
                }
                self.choose_model(model);
            }
            "temperature" => self.temperature = parse_unit(key, value)?,
            "top-p" => self.top_p = parse_unit(key, value)?,
            "data-collection" => self.data_collection = Some(DataPolicy::try_from(value)?),
            "training-data" => self.training_data = Some(DataPolicy::try_from(value)?),
            "output-publishing" => self.output_publishing = Some(DataPolicy::try_from(value)?),
            _ => {
                return Err(format!(
                    "unknown setting '{key}'. Known settings: {}",
                    SETTING_KEYS.join(", ")
                ))
            }
        }
        Ok(())
    }

    /// Apply an `unset <key>` command, restoring the default.
    pub fn clear_setting(&mut self, key: &str) -> Result<(), String> {
        let defaults = Preferences::default();
        match key {
            "api-key" => self.api_key = defaults.api_key,
            "model" => {
                self.selected_model = defaults.selected_model;
                self.model_chosen = false;
            }
            "temperature" => self.temperature = defaults.temperature,
            "top-p" => self.top_p = defaults.top_p,
            "data-collection" => self.data_collection = None,
            "training-data" => self.training_data = None,
            "output-publishing" => self.output_publishing = None,
            _ => return Err(format!("unknown setting '{key}'")),
        }
        Ok(())
    }
}

pub struct HistoryStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl HistoryStore {
    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self, Box<dyn Error>> {
        let proj_dirs = ProjectDirs::from("org", "routechat", "routechat")
            .ok_or("Failed to determine data directory")?;
        Self::open(proj_dirs.data_dir().join(STORE_FILE))
    }

    /// Open the snapshot at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened history store");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!(key, error = %err, "Stored value has an unexpected shape");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        self.entries
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.get(MESSAGES_KEY).unwrap_or_default()
    }

    /// Stamp and append a message, returning the stored copy.
    pub fn append_message(&mut self, message: NewMessage) -> Result<Message, serde_json::Error> {
        let stored = message.into_message();
        self.push_message(stored.clone())?;
        Ok(stored)
    }

    /// Append an already stamped message.
    pub fn push_message(&mut self, message: Message) -> Result<(), serde_json::Error> {
        let mut messages = self.messages();
        messages.push(message);
        self.set(MESSAGES_KEY, &messages)
    }

    pub fn clear_messages(&mut self) {
        self.entries
            .insert(MESSAGES_KEY.to_string(), Value::Array(Vec::new()));
    }

    pub fn preferences(&self) -> Preferences {
        self.get(PREFERENCES_KEY).unwrap_or_default()
    }

    pub fn set_preferences(&mut self, preferences: &Preferences) -> Result<(), serde_json::Error> {
        self.set(PREFERENCES_KEY, preferences)
    }

    /// Write the snapshot through a temp file in the same directory, so the
    /// previous file is only replaced by a complete one.
    pub fn save(&self) -> Result<(), Box<dyn Error>> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut temp_file = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut temp_file, &self.entries)?;
        temp_file.write_all(b"\n")?;
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path)?;
        Ok(())
    }
}
