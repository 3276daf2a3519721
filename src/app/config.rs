use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::app::error::AppError;
use crate::app::models::{Command, Parameter};

pub const KEY_ANDROID_HOME: &str = "androidHome";
pub const KEY_ADB_PATH: &str = "adbPath";
pub const KEY_EMULATOR_PATH: &str = "emulatorPath";
pub const KEY_AVD_MANAGER_PATH: &str = "avdManagerPath";
pub const KEY_XCRUN_PATH: &str = "xcrunPath";
pub const KEY_CUSTOM_COMMANDS: &str = "customCommands";
pub const KEY_PARAMETERS: &str = "parameters";
pub const KEY_PREFERRED_TERMINAL: &str = "preferredTerminal";
pub const KEY_ONBOARDING_FINISHED: &str = "onboardingFinished";

pub const DEFAULT_TERMINAL: &str = "Terminal";

/// Key/value settings capability shared by every component.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    /// `None` removes the key.
    fn set(&self, key: &str, value: Option<String>);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: Option<String>) {
        if let Ok(mut guard) = self.values.lock() {
            match value {
                Some(value) => guard.insert(key.to_string(), value),
                None => guard.remove(key),
            };
        }
    }
}

/// Flat JSON object on disk, written through on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    backup_path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open_default() -> Result<Self, AppError> {
        Self::open(config_path())
    }

    pub fn open(path: PathBuf) -> Result<Self, AppError> {
        let values = load_values_from_path(&path)?;
        let backup_path = backup_path_for(&path);
        Ok(Self {
            path,
            backup_path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: Option<String>) {
        let Ok(mut guard) = self.values.lock() else {
            return;
        };
        match value {
            Some(value) => guard.insert(key.to_string(), value),
            None => guard.remove(key),
        };
        // The file is written under the lock so the last writer on disk is
        // also the last writer in memory.
        if let Err(err) = save_values_to_path(&guard, &self.path, &self.backup_path) {
            warn!(error = %err, path = %self.path.display(), "failed to persist settings");
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("DEVICEBAR_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".devicebar_config.json")
}

fn backup_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|| "devicebar_config".to_string());
    path.with_file_name(format!("{stem}.backup.json"))
}

fn load_values_from_path(path: &Path) -> Result<BTreeMap<String, String>, AppError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), ""))?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), ""))?;
    let Some(object) = value.as_object() else {
        return Err(AppError::system("Config root must be a JSON object", ""));
    };
    let mut values = BTreeMap::new();
    for (key, item) in object {
        match item {
            serde_json::Value::String(text) => {
                values.insert(key.clone(), text.clone());
            }
            serde_json::Value::Null => {}
            other => {
                values.insert(key.clone(), other.to_string());
            }
        }
    }
    Ok(values)
}

fn save_values_to_path(
    values: &BTreeMap<String, String>,
    path: &Path,
    backup_path: &Path,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(values)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

fn load_list<T: DeserializeOwned>(
    store: &dyn ConfigStore,
    key: &str,
    trace_id: &str,
) -> Result<Vec<T>, AppError> {
    let Some(raw) = store.get(key) else {
        return Ok(Vec::new());
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse {key}: {err}"), trace_id))
}

fn save_list<T: Serialize>(
    store: &dyn ConfigStore,
    key: &str,
    items: &[T],
    trace_id: &str,
) -> Result<(), AppError> {
    let payload = serde_json::to_string(items)
        .map_err(|err| AppError::system(format!("Failed to serialize {key}: {err}"), trace_id))?;
    store.set(key, Some(payload));
    Ok(())
}

pub fn load_commands(store: &dyn ConfigStore, trace_id: &str) -> Result<Vec<Command>, AppError> {
    let commands: Vec<Command> = load_list(store, KEY_CUSTOM_COMMANDS, trace_id)?;
    Ok(commands
        .into_iter()
        .filter(|command| !command.command.trim().is_empty())
        .collect())
}

pub fn save_commands(
    store: &dyn ConfigStore,
    commands: &[Command],
    trace_id: &str,
) -> Result<(), AppError> {
    save_list(store, KEY_CUSTOM_COMMANDS, commands, trace_id)
}

pub fn load_parameters(store: &dyn ConfigStore, trace_id: &str) -> Result<Vec<Parameter>, AppError> {
    let parameters: Vec<Parameter> = load_list(store, KEY_PARAMETERS, trace_id)?;
    Ok(parameters
        .into_iter()
        .filter(|parameter| !parameter.command.trim().is_empty())
        .collect())
}

pub fn save_parameters(
    store: &dyn ConfigStore,
    parameters: &[Parameter],
    trace_id: &str,
) -> Result<(), AppError> {
    save_list(store, KEY_PARAMETERS, parameters, trace_id)
}

pub fn preferred_terminal(store: &dyn ConfigStore) -> String {
    store
        .get(KEY_PREFERRED_TERMINAL)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_TERMINAL.to_string())
}

pub fn onboarding_finished(store: &dyn ConfigStore) -> bool {
    matches!(store.get(KEY_ONBOARDING_FINISHED).as_deref(), Some("true"))
}

pub fn set_onboarding_finished(store: &dyn ConfigStore, finished: bool) {
    store.set(KEY_ONBOARDING_FINISHED, Some(finished.to_string()));
}
