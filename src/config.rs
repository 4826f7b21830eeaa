// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Curator configuration

use crate::error::{CuratorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Named platform/configuration profile
///
/// The profile's settings hash is folded into every asset's settings hash,
/// so switching profiles changes every transitive dependency hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetProfile {
    pub name: String,
    #[serde(default)]
    pub settings_hash: u64,
}

impl AssetProfile {
    pub fn new(name: impl Into<String>, settings_hash: u64) -> Self {
        Self {
            name: name.into(),
            settings_hash,
        }
    }
}

impl Default for AssetProfile {
    fn default() -> Self {
        Self::new("Default", 0)
    }
}

/// Configuration for a [`Curator`](crate::Curator)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    /// Root folders that contain asset documents and their inputs
    pub data_directories: Vec<PathBuf>,
    /// Known profiles; the first one is used if `active_profile` is empty
    pub profiles: Vec<AssetProfile>,
    pub active_profile: String,
    /// Dependency strings with these extensions name nothing on disk and are skipped
    pub virtual_extensions: Vec<String>,
    /// Folder name (below a data directory) holding transform outputs
    pub asset_cache_folder: String,
    /// Number of background update workers
    pub update_threads: usize,
    /// Where `save_caches` / `load_caches` persist file and document info
    pub cache_file: Option<PathBuf>,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            data_directories: Vec::new(),
            profiles: vec![AssetProfile::default()],
            active_profile: String::new(),
            virtual_extensions: vec![".color".to_string()],
            asset_cache_folder: "AssetCache".to_string(),
            update_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            cache_file: None,
        }
    }
}

impl CuratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CuratorConfig = serde_json::from_str(json)
            .map_err(|e| CuratorError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CuratorError::Serialization(e.to_string()))
    }

    pub fn with_data_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_directories.push(dir.into());
        self
    }

    pub fn with_profile(mut self, profile: AssetProfile) -> Self {
        self.profiles.retain(|p| p.name != profile.name);
        self.profiles.push(profile);
        self
    }

    pub fn with_active_profile(mut self, name: impl Into<String>) -> Self {
        self.active_profile = name.into();
        self
    }

    pub fn with_update_threads(mut self, threads: usize) -> Self {
        self.update_threads = threads.max(1);
        self
    }

    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    /// Check that the active profile exists
    pub fn validate(&self) -> Result<()> {
        if self.profiles.is_empty() {
            return Err(CuratorError::Config("at least one profile is required".into()));
        }
        if !self.active_profile.is_empty() && self.profile(&self.active_profile).is_none() {
            return Err(CuratorError::Config(format!(
                "active profile '{}' is not defined",
                self.active_profile
            )));
        }
        if self.asset_cache_folder.is_empty() {
            return Err(CuratorError::Config("asset_cache_folder must not be empty".into()));
        }
        Ok(())
    }

    pub fn profile(&self, name: &str) -> Option<&AssetProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Profile named by `active_profile`, or the first one
    pub fn initial_profile(&self) -> AssetProfile {
        self.profile(&self.active_profile)
            .or_else(|| self.profiles.first())
            .cloned()
            .unwrap_or_default()
    }

    /// True for dependency strings that do not name a file
    pub fn is_virtual(&self, dependency: &str) -> bool {
        let lower = dependency.to_ascii_lowercase();
        self.virtual_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
    }
}
