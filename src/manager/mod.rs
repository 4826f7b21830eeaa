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

//! Asset type managers
//!
//! A manager knows how to read the header of one family of asset documents,
//! where their outputs and thumbnails live, and how to transform them.
//! Managers are looked up by file extension.

mod json;

pub use json::JsonAssetManager;

use crate::asset_header::AssetFileHeader;
use crate::config::AssetProfile;
use crate::document::{DocumentInfo, SubAssetData};
use crate::error::{CuratorError, Result};
use crate::guid::AssetGuid;
use crate::paths::extension_of;
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Folder (next to the asset) that the default output paths live in
pub const DEFAULT_CACHE_FOLDER: &str = "AssetCache";

/// Everything a manager needs to produce one output file
pub struct TransformContext<'a> {
    pub asset_path: &'a Path,
    pub document: &'a DocumentInfo,
    pub output_tag: &'a str,
    pub output_path: PathBuf,
    pub profile: &'a AssetProfile,
    /// Header the output must start with
    pub header: AssetFileHeader,
}

/// Everything a manager needs to render a thumbnail
pub struct ThumbnailContext<'a> {
    pub asset_path: &'a Path,
    pub document: &'a DocumentInfo,
    pub thumbnail_path: PathBuf,
    pub profile: &'a AssetProfile,
}

/// Per-type asset behavior
pub trait AssetTypeManager: Send + Sync {
    /// Asset type name, e.g. "Mesh"
    fn type_name(&self) -> &str;

    /// File extensions (without dot) this manager owns
    fn extensions(&self) -> &[&str];

    /// Bumped whenever the output format changes; part of every output header
    fn document_version(&self) -> u16 {
        1
    }

    /// Parse the document header from the file's bytes
    fn read_document_info(&self, path: &Path, bytes: &[u8]) -> Result<DocumentInfo>;

    /// Sub-assets (besides the main one) the document provides
    fn fill_out_sub_asset_list(&self, info: &DocumentInfo) -> Vec<SubAssetData> {
        info.sub_assets.clone()
    }

    /// Output file for `output_tag` ("" is the main output)
    fn absolute_output_file_name(
        &self,
        asset_path: &Path,
        output_tag: &str,
        profile: &AssetProfile,
    ) -> PathBuf {
        let dir = asset_path.parent().unwrap_or_else(|| Path::new(""));
        let stem = asset_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = if output_tag.is_empty() {
            format!("{stem}.bin")
        } else {
            format!("{stem}_{output_tag}.bin")
        };
        dir.join(DEFAULT_CACHE_FOLDER).join(&profile.name).join(name)
    }

    /// Write the output described by `ctx`
    fn transform_asset(&self, ctx: &TransformContext<'_>) -> Result<()>;

    fn supports_thumbnail(&self, _info: &DocumentInfo) -> bool {
        false
    }

    fn resource_thumbnail_path(&self, asset_path: &Path) -> PathBuf {
        let dir = asset_path.parent().unwrap_or_else(|| Path::new(""));
        let stem = asset_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        dir.join(DEFAULT_CACHE_FOLDER)
            .join("Thumbnails")
            .join(format!("{stem}.jpg"))
    }

    /// Encoded thumbnail image; the curator appends the trailing record
    fn create_thumbnail(&self, ctx: &ThumbnailContext<'_>) -> Result<Vec<u8>> {
        Err(CuratorError::ThumbnailUnsupported(ctx.document.guid))
    }

    /// Rewrite the document on disk so it declares `new_guid`
    fn patch_document_guid(&self, path: &Path, new_guid: AssetGuid) -> Result<()>;

    /// Hash of the profile settings relevant to this type
    fn profile_hash(&self, profile: &AssetProfile) -> u64 {
        profile.settings_hash
    }
}

/// Manager lookup by file extension
#[derive(Default, Clone)]
pub struct ManagerRegistry {
    by_extension: AHashMap<String, Arc<dyn AssetTypeManager>>,
    managers: Vec<Arc<dyn AssetTypeManager>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manager for all of its extensions
    pub fn register<M: AssetTypeManager + 'static>(&mut self, manager: M) {
        self.register_arc(Arc::new(manager));
    }

    pub fn register_arc(&mut self, manager: Arc<dyn AssetTypeManager>) {
        for ext in manager.extensions() {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if let Some(previous) = self.by_extension.insert(ext.clone(), manager.clone()) {
                tracing::warn!(
                    "Extension '{ext}' moved from manager '{}' to '{}'",
                    previous.type_name(),
                    manager.type_name()
                );
            }
        }
        self.managers.push(manager);
    }

    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn AssetTypeManager>> {
        self.by_extension
            .get(&extension.trim_start_matches('.').to_ascii_lowercase())
            .cloned()
    }

    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn AssetTypeManager>> {
        extension_of(path).and_then(|ext| self.by_extension.get(&ext).cloned())
    }

    /// True when some manager owns the file's extension
    pub fn is_asset_file(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.by_extension.contains_key(&ext))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AssetTypeManager>> {
        self.managers.iter()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
