//! 持久化设置存储
//!
//! Key/value storage shared by the scheduler and the unit tests. Everything
//! that has to survive between sessions (enable flags, log file name, run
//! options) goes through the [`SettingsStore`] trait, so the store is always
//! the authoritative copy.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Log file name relative to the application directory.
pub const LOG_FILE_NAME_KEY: &str = "MainDialog/logFileName";
/// Stop a run after the first failed unit test.
pub const BREAK_ON_ERROR_KEY: &str = "MainDialog/breakOnError";
/// Truncate the log file when a run starts.
pub const CLEAR_LOG_ON_START_KEY: &str = "MainDialog/clearLogOnStart";

/// Shared handle to the settings store used across the crate.
pub type SharedSettings = Rc<dyn SettingsStore>;

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SettingValue {
    /// Loose boolean conversion: numbers are true when non-zero, text is true
    /// unless it is empty, `"0"` or `"false"`.
    pub fn to_bool(&self) -> bool {
        match self {
            SettingValue::Bool(b) => *b,
            SettingValue::Int(i) => *i != 0,
            SettingValue::Text(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
            }
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Int(i) => i.to_string(),
            SettingValue::Text(s) => s.clone(),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

/// 设置存储特质
///
/// Methods take `&self`: implementations are shared through [`SharedSettings`]
/// and handle mutation internally.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore {
    /// 读取键值
    fn value(&self, key: &str) -> Option<SettingValue>;

    /// 写入键值
    fn set_value(&self, key: &str, value: SettingValue) -> Result<()>;
}

/// Reads `key` as a boolean, `false` when missing.
pub fn bool_value(store: &dyn SettingsStore, key: &str) -> bool {
    store.value(key).map(|v| v.to_bool()).unwrap_or(false)
}

/// Reads `key` as text, `None` when missing.
pub fn string_value(store: &dyn SettingsStore, key: &str) -> Option<String> {
    store.value(key).map(|v| v.to_text())
}

/// In-memory store, used when no settings file is wanted and in tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RefCell<BTreeMap<String, SettingValue>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn value(&self, key: &str) -> Option<SettingValue> {
        self.values.borrow().get(key).cloned()
    }

    fn set_value(&self, key: &str, value: SettingValue) -> Result<()> {
        self.values.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

/// TOML file backed store.
///
/// The file is a flat table of quoted keys, e.g.
///
/// ```toml
/// "0/enable" = true
/// "MainDialog/logFileName" = "serial.log"
/// ```
///
/// Nothing is kept in memory: every read parses the file and every write is a
/// read-modify-write of it, so several processes sharing one file see each
/// other's changes.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    /// Opens the store at `path`. A missing file counts as empty; the file is
    /// created on the first write. An unreadable or corrupt file is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Self {
            path: path.as_ref().to_path_buf(),
        };
        settings.load()?;
        Ok(settings)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, SettingValue>> {
        if !self.path.exists() {
            debug!("Settings file {} does not exist yet", self.path.display());
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Unable to read settings file: {}", self.path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Unable to parse settings file: {}", self.path.display()))
    }

    fn store(&self, values: &BTreeMap<String, SettingValue>) -> Result<()> {
        let content = toml::to_string(values).context("Unable to serialize settings")?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Unable to create settings directory: {}", parent.display())
                })?;
            }
        }
        fs::write(&self.path, content)
            .with_context(|| format!("Unable to write settings file: {}", self.path.display()))
    }
}

impl SettingsStore for FileSettings {
    fn value(&self, key: &str) -> Option<SettingValue> {
        match self.load() {
            Ok(mut values) => values.remove(key),
            Err(e) => {
                warn!("Reading {key} failed: {e:#}");
                None
            }
        }
    }

    fn set_value(&self, key: &str, value: SettingValue) -> Result<()> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value);
        self.store(&values)
    }
}
