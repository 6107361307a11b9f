//! Saved configurations, kept in a single JSON file

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::Configuration;
use crate::error::TransporterResult;
use crate::types::RunOutcome;

pub const DEFAULT_CONFIG_NAME: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedConfig {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_archived_file_url: Option<String>,
    pub config: Configuration,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    configs: Vec<SavedConfig>,
}

/// File-backed list of saved configurations
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> TransporterResult<ConfigFile> {
        if !self.path.exists() {
            return Ok(ConfigFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(ConfigFile::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, file: &ConfigFile) -> TransporterResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    /// All saved configurations, most recently updated first
    pub fn list(&self) -> TransporterResult<Vec<SavedConfig>> {
        let mut configs = self.read()?.configs;
        configs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(configs)
    }

    pub fn get(&self, id: &str) -> TransporterResult<Option<SavedConfig>> {
        Ok(self.read()?.configs.into_iter().find(|c| c.id == id))
    }

    /// Insert or update. A config whose id is already saved keeps its
    /// stored name; otherwise it gets a fresh `cfg_` id.
    pub fn save(
        &self,
        mut config: Configuration,
        name: Option<&str>,
    ) -> TransporterResult<SavedConfig> {
        let mut file = self.read()?;
        let now = Utc::now();

        let existing = config
            .id()
            .and_then(|id| file.configs.iter().position(|c| c.id == id));

        let saved = match existing {
            Some(index) => {
                let previous = &file.configs[index];
                config.set_name(Some(previous.name.clone()));
                let saved = SavedConfig {
                    id: previous.id.clone(),
                    name: previous.name.clone(),
                    updated_at: now,
                    last_run: previous.last_run,
                    last_archived_file_url: previous.last_archived_file_url.clone(),
                    config,
                };
                file.configs[index] = saved.clone();
                saved
            }
            None => {
                let id = config
                    .id()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("cfg_{}", Uuid::new_v4()));
                let name = name
                    .or(config.name())
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(DEFAULT_CONFIG_NAME)
                    .to_string();
                config.set_id(Some(id.clone()));
                config.set_name(Some(name.clone()));
                let saved = SavedConfig {
                    id,
                    name,
                    updated_at: now,
                    last_run: None,
                    last_archived_file_url: None,
                    config,
                };
                file.configs.push(saved.clone());
                saved
            }
        };

        self.write(&file)?;
        Ok(saved)
    }

    /// Returns false when no config has this id
    pub fn delete(&self, id: &str) -> TransporterResult<bool> {
        let mut file = self.read()?;
        let before = file.configs.len();
        file.configs.retain(|c| c.id != id);
        if file.configs.len() == before {
            return Ok(false);
        }
        self.write(&file)?;
        Ok(true)
    }

    /// Stamp `lastRun`; successful archives also record their file URL
    pub fn record_run(&self, id: &str, outcome: &RunOutcome) -> TransporterResult<bool> {
        let mut file = self.read()?;
        let Some(entry) = file.configs.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        entry.last_run = Some(Utc::now());
        if let (Configuration::Archive(_), true, Some(url)) =
            (&entry.config, outcome.is_success(), &outcome.file_url)
        {
            entry.last_archived_file_url = Some(url.clone());
        }
        self.write(&file)?;
        Ok(true)
    }
}
