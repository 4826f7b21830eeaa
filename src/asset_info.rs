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

//! Per-asset records kept by the curator

use crate::document::DocumentInfo;
use crate::guid::AssetGuid;
use crate::manager::AssetTypeManager;
use crate::registry::AssetKey;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Where an asset stands relative to the last main-thread tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExistenceState {
    #[default]
    FileAdded,
    FileModified,
    FileRemoved,
    FileUnchanged,
}

/// Transform state of an asset for the active profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransformState {
    #[default]
    Unknown,
    UpToDate,
    NeedsTransform,
    NeedsThumbnail,
    TransformError,
    MissingTransformDependency,
    MissingPackageDependency,
    MissingThumbnailDependency,
    CircularDependency,
}

impl TransformState {
    pub const ALL: [TransformState; 9] = [
        TransformState::Unknown,
        TransformState::UpToDate,
        TransformState::NeedsTransform,
        TransformState::NeedsThumbnail,
        TransformState::TransformError,
        TransformState::MissingTransformDependency,
        TransformState::MissingPackageDependency,
        TransformState::MissingThumbnailDependency,
        TransformState::CircularDependency,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// States whose dependency hash could not be computed
    pub fn is_hash_failure(self) -> bool {
        matches!(
            self,
            TransformState::MissingTransformDependency
                | TransformState::MissingPackageDependency
                | TransformState::MissingThumbnailDependency
                | TransformState::CircularDependency
        )
    }
}

/// Everything the curator knows about one asset document
#[derive(Clone)]
pub struct AssetInfo {
    pub(crate) absolute_path: PathBuf,
    pub(crate) data_dir_relative_path: PathBuf,
    pub(crate) document_info: DocumentInfo,
    pub(crate) manager: Arc<dyn AssetTypeManager>,
    /// Declared sub-assets; the main sub-asset is not part of this set
    pub(crate) sub_assets: BTreeSet<AssetGuid>,
    pub(crate) existence_state: ExistenceState,
    pub(crate) transform_state: TransformState,
    pub(crate) asset_hash: Option<u64>,
    pub(crate) thumb_hash: Option<u64>,
    pub(crate) missing_dependencies: BTreeSet<String>,
    pub(crate) missing_references: BTreeSet<String>,
    /// Message of the last failed transform; survives recomputation
    pub(crate) transform_error: Option<String>,
    /// Bumped on every invalidation
    pub(crate) last_state_update: u32,
}

impl AssetInfo {
    pub fn new(
        absolute_path: PathBuf,
        data_dir_relative_path: PathBuf,
        document_info: DocumentInfo,
        manager: Arc<dyn AssetTypeManager>,
    ) -> Self {
        Self {
            absolute_path,
            data_dir_relative_path,
            document_info,
            manager,
            sub_assets: BTreeSet::new(),
            existence_state: ExistenceState::FileAdded,
            transform_state: TransformState::Unknown,
            asset_hash: None,
            thumb_hash: None,
            missing_dependencies: BTreeSet::new(),
            missing_references: BTreeSet::new(),
            transform_error: None,
            last_state_update: 0,
        }
    }

    /// Take over path, document and manager from a freshly read record.
    ///
    /// Identity (sub-asset set, existence state, generation) stays; computed
    /// state is reset because it belonged to the old content.
    pub(crate) fn replace_content(&mut self, fresh: AssetInfo) {
        self.absolute_path = fresh.absolute_path;
        self.data_dir_relative_path = fresh.data_dir_relative_path;
        self.document_info = fresh.document_info;
        self.manager = fresh.manager;
        self.transform_state = TransformState::Unknown;
        self.asset_hash = None;
        self.thumb_hash = None;
        self.missing_dependencies.clear();
        self.missing_references.clear();
        self.transform_error = None;
    }

    pub fn guid(&self) -> AssetGuid {
        self.document_info.guid
    }

    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn data_dir_relative_path(&self) -> &Path {
        &self.data_dir_relative_path
    }

    pub fn document_info(&self) -> &DocumentInfo {
        &self.document_info
    }

    pub fn manager(&self) -> &Arc<dyn AssetTypeManager> {
        &self.manager
    }

    pub fn sub_assets(&self) -> &BTreeSet<AssetGuid> {
        &self.sub_assets
    }

    pub fn existence_state(&self) -> ExistenceState {
        self.existence_state
    }

    pub fn transform_state(&self) -> TransformState {
        self.transform_state
    }

    /// Last computed transform-dependency hash
    pub fn asset_hash(&self) -> Option<u64> {
        self.asset_hash
    }

    /// Last computed reference (thumbnail) hash
    pub fn thumb_hash(&self) -> Option<u64> {
        self.thumb_hash
    }

    pub fn missing_dependencies(&self) -> &BTreeSet<String> {
        &self.missing_dependencies
    }

    pub fn missing_references(&self) -> &BTreeSet<String> {
        &self.missing_references
    }

    pub fn transform_error(&self) -> Option<&str> {
        self.transform_error.as_deref()
    }

    pub fn generation(&self) -> u32 {
        self.last_state_update
    }
}

impl std::fmt::Debug for AssetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetInfo")
            .field("guid", &self.guid())
            .field("path", &self.absolute_path)
            .field("type", &self.manager.type_name())
            .field("existence_state", &self.existence_state)
            .field("transform_state", &self.transform_state)
            .finish()
    }
}

/// Addressable unit inside an asset; the main sub-asset shares the asset's GUID
#[derive(Debug, Clone)]
pub struct SubAssetInfo {
    pub(crate) guid: AssetGuid,
    pub(crate) name: String,
    pub(crate) sub_asset_type: String,
    pub(crate) owning_asset: AssetKey,
    pub(crate) existence_state: ExistenceState,
    pub(crate) last_access: Option<SystemTime>,
}

impl SubAssetInfo {
    pub fn guid(&self) -> AssetGuid {
        self.guid
    }

    /// Empty for the main sub-asset
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sub_asset_type(&self) -> &str {
        &self.sub_asset_type
    }

    pub fn owning_asset(&self) -> AssetKey {
        self.owning_asset
    }

    pub fn existence_state(&self) -> ExistenceState {
        self.existence_state
    }

    pub fn is_main(&self) -> bool {
        self.name.is_empty()
    }

    pub fn last_access(&self) -> Option<SystemTime> {
        self.last_access
    }
}
