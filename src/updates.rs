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

//! Keeping asset records in sync with the documents on disk

use crate::asset_info::{AssetInfo, ExistenceState};
use crate::curator::{Curator, CuratorData};
use crate::error::{CuratorError, Result};
use crate::file_status::{modification_time, FileStatus, FileStatusKind};
use crate::guid::AssetGuid;
use crate::manager::AssetTypeManager;
use crate::paths::{find_data_directory, is_inside_folder, normalize_path};
use crate::registry::AssetKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[cfg(feature = "profiling")]
use tracing::debug_span;

const GUID_PATCH_ATTEMPTS: u32 = 5;

enum UpdateOutcome {
    Done,
    /// Another live document already owns the GUID
    PatchGuid { other: PathBuf },
}

impl Curator {
    /// Make sure the record for the asset document at `path` reflects the
    /// file's current content. Returns the asset's GUID.
    ///
    /// Unchanged files are a no-op without any file I/O. Moves (same GUID,
    /// old file gone) keep the asset's identity. When two live documents
    /// declare the same GUID, the later one is rewritten with a derived GUID
    /// once.
    pub fn ensure_updated(&self, path: &Path) -> Result<AssetGuid> {
        self.ensure_updated_impl(&normalize_path(path), true)
    }

    fn ensure_updated_impl(&self, path: &Path, allow_guid_patch: bool) -> Result<AssetGuid> {
        #[cfg(feature = "profiling")]
        let _span = debug_span!("ensure_updated", path = %path.display()).entered();

        let Some(modified) = modification_time(path) else {
            return Err(CuratorError::FileNotFound {
                path: path.to_path_buf(),
            });
        };

        {
            let data = self.data.lock();
            if let Some(status) = data.files.get(path) {
                if status.document_timestamp == Some(modified) {
                    if let Some(guid) = status.asset_guid.filter(|g| data.registry.contains(*g)) {
                        return Ok(guid);
                    }
                }
            }
        }

        let (status, fresh) = match self.read_asset_document_info(path, modified) {
            Ok(read) => read,
            Err(err) => {
                tracing::error!("Failed to update asset '{}': {err}", path.display());
                return Err(err);
            }
        };
        let guid = fresh.guid();
        let manager = fresh.manager.clone();

        let outcome = {
            let mut guard = self.data.lock();
            self.apply_document_update(&mut guard, path, status, fresh, allow_guid_patch)?
        };

        match outcome {
            UpdateOutcome::Done => Ok(guid),
            UpdateOutcome::PatchGuid { other } => {
                let seed = AssetGuid::stable_for_string(&path.to_string_lossy());
                let new_guid = guid.combine_with_seed(&seed);
                tracing::warn!(
                    "'{}' and '{}' share GUID {guid}; assigning {new_guid} to '{}'",
                    other.display(),
                    path.display(),
                    path.display()
                );
                self.patch_document_guid(manager.as_ref(), path, new_guid)?;
                self.ensure_updated_impl(path, false)
            }
        }
    }

    fn patch_document_guid(
        &self,
        manager: &dyn AssetTypeManager,
        path: &Path,
        new_guid: AssetGuid,
    ) -> Result<()> {
        let mut last_error = String::new();
        for attempt in 0..GUID_PATCH_ATTEMPTS {
            match manager.patch_document_guid(path, new_guid) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    last_error = err.to_string();
                    std::thread::sleep(Duration::from_millis(50 * u64::from(attempt + 1)));
                }
            }
        }
        tracing::error!("Failed to patch GUID of '{}': {last_error}", path.display());
        Err(CuratorError::GuidPatchFailed {
            path: path.to_path_buf(),
            message: last_error,
        })
    }

    /// Hash and parse a document without holding the lock
    fn read_asset_document_info(&self, path: &Path, modified: SystemTime) -> Result<(FileStatus, AssetInfo)> {
        let manager: Arc<dyn AssetTypeManager> =
            self.managers.for_path(path).ok_or_else(|| CuratorError::NoManager {
                path: path.to_path_buf(),
            })?;

        let cached = {
            let data = self.data.lock();
            data.cached_documents
                .get(path)
                .filter(|cached| cached.timestamp == modified)
                .cloned()
        };

        let (hash, document) = match cached {
            Some(cached) => (cached.hash, cached.document),
            None => {
                let mut bytes = Vec::new();
                let hash = self.hash_file_contents(path, Some(&mut bytes))?;
                (hash, manager.read_document_info(path, &bytes)?)
            }
        };
        if document.guid.is_nil() {
            return Err(CuratorError::Parse {
                path: path.to_path_buf(),
                message: "document does not declare a GUID".into(),
            });
        }

        let status = FileStatus {
            timestamp: Some(modified),
            hash,
            asset_guid: Some(document.guid),
            document_timestamp: Some(modified),
            status: FileStatusKind::Valid,
        };
        let info = AssetInfo::new(
            path.to_path_buf(),
            self.data_dir_relative_path(path),
            document,
            manager,
        );
        Ok((status, info))
    }

    pub(crate) fn data_dir_relative_path(&self, path: &Path) -> PathBuf {
        find_data_directory(&self.config.data_directories, path)
            .and_then(|dir| path.strip_prefix(dir).ok())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf())
    }

    /// Replace an existing record's content and re-track it
    fn replace_asset_content(&self, data: &mut CuratorData, key: AssetKey, fresh: AssetInfo) {
        let old_path = data
            .registry
            .by_key(key)
            .map(|info| info.absolute_path.clone())
            .unwrap_or_default();
        let moved = old_path != fresh.absolute_path;
        self.untrack_dependencies(data, key);
        let replace = |data: &mut CuratorData| {
            if let Some(info) = data.registry.by_key_mut(key) {
                info.replace_content(fresh);
            }
        };
        if moved {
            self.retrack_users(data, &old_path, replace);
        } else {
            replace(data);
        }
        self.track_dependencies(data, key);
        data.registry
            .set_existence_state(key, ExistenceState::FileModified, &mut data.sub_asset_changed);
    }

    fn apply_document_update(
        &self,
        data: &mut CuratorData,
        path: &Path,
        status: FileStatus,
        fresh: AssetInfo,
        allow_guid_patch: bool,
    ) -> Result<UpdateOutcome> {
        let new_guid = fresh.guid();
        let old_guid = data
            .files
            .get(path)
            .and_then(|f| f.asset_guid)
            .filter(|g| data.registry.contains(*g));

        if let Some(old) = old_guid.filter(|old| *old != new_guid) {
            tracing::info!(
                "GUID of '{}' changed from {old} to {new_guid}",
                path.display()
            );
            if let Some(key) = data.registry.key_of(old) {
                self.untrack_dependencies(data, key);
                data.registry
                    .set_existence_state(key, ExistenceState::FileRemoved, &mut data.sub_asset_changed);
                self.remove_transform_state(data, old);
            }
        }

        let key = if old_guid == Some(new_guid) {
            let Some(key) = data.registry.key_of(new_guid) else {
                return Err(CuratorError::UnknownAsset(new_guid));
            };
            self.replace_asset_content(data, key, fresh);
            key
        } else {
            match data.registry.key_of(new_guid) {
                Some(key) => {
                    let existing_path = data
                        .registry
                        .by_key(key)
                        .map(|info| info.absolute_path.clone())
                        .unwrap_or_default();
                    if existing_path != path && existing_path.exists() {
                        data.files.remove(path);
                        if !allow_guid_patch {
                            tracing::error!(
                                "GUID {new_guid} of '{}' still collides with '{}'",
                                path.display(),
                                existing_path.display()
                            );
                            return Err(CuratorError::GuidCollision {
                                path: path.to_path_buf(),
                                other: existing_path,
                            });
                        }
                        return Ok(UpdateOutcome::PatchGuid {
                            other: existing_path,
                        });
                    }
                    if existing_path != path {
                        tracing::info!(
                            "Asset {new_guid} moved from '{}' to '{}'",
                            existing_path.display(),
                            path.display()
                        );
                        data.files.remove(&existing_path);
                    }
                    self.replace_asset_content(data, key, fresh);
                    key
                }
                None => {
                    let key = data.registry.insert(fresh);
                    self.track_dependencies(data, key);
                    data.mark_changed(new_guid);
                    key
                }
            }
        };

        data.files.insert(path.to_path_buf(), status);
        if let Some(info) = data.registry.by_key(key) {
            let declared = info.manager.fill_out_sub_asset_list(&info.document_info);
            data.registry
                .update_sub_assets(key, declared, &mut data.sub_asset_changed);
        }
        self.update_unresolved_tracked_files(data);
        self.invalidate_transform_state(data, new_guid);
        Ok(UpdateOutcome::Done)
    }

    /// React to a file being added, modified or removed below a data directory
    pub fn handle_file_change(&self, path: &Path) -> Result<()> {
        let path = normalize_path(path);
        let modified = modification_time(&path);

        let needs_update = {
            let mut guard = self.data.lock();
            let data = &mut *guard;

            let Some(modified) = modified else {
                self.handle_file_removed(data, &path);
                return Ok(());
            };

            let entry = data.files.entry(&path);
            entry.status = FileStatusKind::Valid;
            let changed = entry.timestamp != Some(modified);
            let asset_guid = entry.asset_guid;
            let document_current = entry.document_timestamp == Some(modified);
            if changed {
                entry.timestamp = None;
                entry.hash = 0;
                for dependent in data.dependencies.dependents_of(&path) {
                    self.invalidate_transform_state(data, dependent);
                }
            }

            let data_dir = find_data_directory(&self.config.data_directories, &path);
            if is_inside_folder(data_dir, &path, &self.config.asset_cache_folder)
                || !self.managers.is_asset_file(&path)
            {
                false
            } else {
                !(document_current && asset_guid.is_some_and(|g| data.registry.contains(g)))
            }
        };

        if needs_update {
            self.ensure_updated(&path)?;
        }
        Ok(())
    }

    pub(crate) fn handle_file_removed(&self, data: &mut CuratorData, path: &Path) {
        let asset_guid = data.files.get_mut(path).and_then(|entry| {
            entry.invalidate_timestamp();
            entry.status = FileStatusKind::FileNotFound;
            entry.asset_guid.take()
        });

        if let Some(guid) = asset_guid {
            if let Some(key) = data.registry.key_of(guid) {
                tracing::debug!("Asset {guid} removed: '{}'", path.display());
                self.untrack_dependencies(data, key);
                data.registry
                    .set_existence_state(key, ExistenceState::FileRemoved, &mut data.sub_asset_changed);
                self.remove_transform_state(data, guid);
            }
        }

        for dependent in data.dependencies.dependents_of(path) {
            self.invalidate_transform_state(data, dependent);
        }
    }
}
