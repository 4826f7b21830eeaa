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

//! Transform state machine and transform pipeline
//!
//! A state is cached on the asset until an invalidation resets it to
//! `Unknown`. Invalidation walks the inverse dependency index breadth-first
//! with a visited set, so cycles terminate. Every invalidation bumps the
//! asset's generation; results computed against an older generation are
//! dropped instead of written back.

use crate::asset_header::{is_output_up_to_date, AssetFileHeader};
use crate::asset_info::TransformState;
use crate::config::AssetProfile;
use crate::curator::{Curator, CuratorData};
use crate::document::DocumentInfo;
use crate::error::{CuratorError, Result};
use crate::guid::AssetGuid;
use crate::hash_engine::HashPass;
use crate::manager::{AssetTypeManager, ThumbnailContext, TransformContext};
use crate::thumbnail::{is_thumbnail_up_to_date, ThumbnailInfo};
use ahash::AHashSet;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "profiling")]
use tracing::debug_span;

/// Transform state plus the hashes it was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetStatus {
    pub state: TransformState,
    pub asset_hash: Option<u64>,
    pub thumb_hash: Option<u64>,
}

/// Number of assets per transform state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub num_assets: usize,
    pub counts: [usize; TransformState::ALL.len()],
}

impl TransformStats {
    pub fn count(&self, state: TransformState) -> usize {
        self.counts[state.index()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformFlags {
    /// Transform even if the outputs are up to date
    pub force: bool,
    pub skip_thumbnail: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    UpToDate,
    Transformed,
    ThumbnailCreated,
    /// Already being transformed further up a dependency chain
    Skipped,
}

#[derive(Debug, Default)]
pub struct TransformSummary {
    pub transformed: usize,
    pub up_to_date: usize,
    pub failed: Vec<(AssetGuid, CuratorError)>,
}

struct AssetSource {
    path: PathBuf,
    document: DocumentInfo,
    manager: Arc<dyn AssetTypeManager>,
}

impl Curator {
    /// Reset `guid` and everything that transitively consumes it to `Unknown`
    pub(crate) fn invalidate_transform_state(&self, data: &mut CuratorData, guid: AssetGuid) {
        self.invalidate_from(data, vec![guid], AHashSet::new());
    }

    fn invalidate_from(
        &self,
        data: &mut CuratorData,
        start: Vec<AssetGuid>,
        mut visited: AHashSet<AssetGuid>,
    ) {
        let mut queue = VecDeque::from(start);
        while let Some(guid) = queue.pop_front() {
            let Some(owner) = data.registry.owner_of(guid) else {
                continue;
            };
            if !visited.insert(owner) {
                continue;
            }
            let Some(info) = data.registry.get_mut(owner) else {
                continue;
            };
            info.last_state_update = info.last_state_update.wrapping_add(1);
            info.transform_state = TransformState::Unknown;
            info.asset_hash = None;
            info.thumb_hash = None;
            let path = info.absolute_path.clone();
            data.mark_dirty(owner);
            for dependent in data.dependencies.dependents_of(&path) {
                if !visited.contains(&dependent) {
                    queue.push_back(dependent);
                }
            }
        }
    }

    /// Force a single asset to be recomputed without touching its consumers
    fn refresh_transform_state(&self, data: &mut CuratorData, guid: AssetGuid) {
        if let Some(info) = data.registry.get_mut(guid) {
            info.last_state_update = info.last_state_update.wrapping_add(1);
            info.transform_state = TransformState::Unknown;
            data.mark_dirty(guid);
        }
    }

    /// Drop all pending work for an asset that is going away
    pub(crate) fn remove_transform_state(&self, data: &mut CuratorData, guid: AssetGuid) {
        data.queued.remove(&guid);
        if let Some(info) = data.registry.get_mut(guid) {
            info.last_state_update = info.last_state_update.wrapping_add(1);
            info.transform_state = TransformState::Unknown;
            info.asset_hash = None;
            info.thumb_hash = None;
        }
    }

    /// Record a computed state
    pub(crate) fn set_transform_state(&self, data: &mut CuratorData, guid: AssetGuid, state: TransformState) {
        let Some(info) = data.registry.get_mut(guid) else {
            return;
        };
        let changed = info.transform_state != state;
        info.transform_state = state;
        let path = info.absolute_path.clone();
        data.queued.remove(&guid);
        if changed {
            data.mark_changed(guid);
        }

        match state {
            TransformState::TransformError if changed => {
                let dependents = data.dependencies.dependents_of(&path);
                self.invalidate_from(data, dependents, AHashSet::from_iter([guid]));
            }
            TransformState::Unknown => self.invalidate_transform_state(data, guid),
            _ => {}
        }
    }

    /// Ask for an asset to be re-evaluated (and retried if it failed)
    pub fn notify_of_asset_change(&self, guid: AssetGuid) {
        let mut guard = self.data.lock();
        let data = &mut *guard;
        if let Some(owner) = data.registry.owner_of(guid) {
            if let Some(info) = data.registry.get_mut(owner) {
                info.transform_error = None;
            }
            self.invalidate_transform_state(data, owner);
        }
    }

    /// Invalidate every asset currently in `state`
    pub fn invalidate_assets_with_transform_state(&self, state: TransformState) {
        let mut guard = self.data.lock();
        let data = &mut *guard;
        let matching: Vec<AssetGuid> = data
            .registry
            .iter()
            .filter(|(_, info)| info.transform_state == state)
            .map(|(_, info)| info.guid())
            .collect();
        for guid in matching {
            if let Some(info) = data.registry.get_mut(guid) {
                info.transform_error = None;
            }
            self.invalidate_transform_state(data, guid);
        }
    }

    pub fn transform_stats(&self) -> TransformStats {
        let data = self.data.lock();
        let mut stats = TransformStats {
            num_assets: data.registry.len(),
            ..Default::default()
        };
        for (_, info) in data.registry.iter() {
            stats.counts[info.transform_state.index()] += 1;
        }
        stats
    }

    fn asset_source(&self, guid: AssetGuid) -> Result<(AssetGuid, AssetSource)> {
        let data = self.data.lock();
        let owner = data
            .registry
            .owner_of(guid)
            .ok_or(CuratorError::UnknownAsset(guid))?;
        let info = data
            .registry
            .get(owner)
            .ok_or(CuratorError::UnknownAsset(guid))?;
        Ok((
            owner,
            AssetSource {
                path: info.absolute_path.clone(),
                document: info.document_info.clone(),
                manager: info.manager.clone(),
            },
        ))
    }

    /// Transform state of an asset for `profile` (the active one if `None`).
    ///
    /// Returns the cached state unless it was invalidated or `force` is set.
    /// Computed states are only stored for the active profile.
    pub fn is_asset_up_to_date(
        &self,
        guid: AssetGuid,
        profile: Option<&AssetProfile>,
        force: bool,
    ) -> Result<AssetStatus> {
        #[cfg(feature = "profiling")]
        let _span = debug_span!("is_asset_up_to_date", %guid).entered();

        let active = self.active_profile();
        let profile = profile.cloned().unwrap_or_else(|| active.clone());
        let is_active = profile == active;

        let path = {
            let data = self.data.lock();
            let owner = data
                .registry
                .owner_of(guid)
                .ok_or(CuratorError::UnknownAsset(guid))?;
            let info = data
                .registry
                .get(owner)
                .ok_or(CuratorError::UnknownAsset(guid))?;
            if !force && is_active && info.transform_state != TransformState::Unknown {
                return Ok(AssetStatus {
                    state: info.transform_state,
                    asset_hash: info.asset_hash,
                    thumb_hash: info.thumb_hash,
                });
            }
            info.absolute_path.clone()
        };

        self.ensure_updated(&path)?;
        let (owner, source) = self.asset_source(guid)?;

        let mut pass = HashPass::new(self, profile.clone());
        let dependencies = pass
            .dependency_outcome(owner)
            .ok_or(CuratorError::UnknownAsset(guid))?;
        let references = pass.reference_outcome(&dependencies);

        let state = match (dependencies.dependency_hash, references.reference_hash) {
            _ if dependencies.circular => TransformState::CircularDependency,
            (None, _) => TransformState::MissingTransformDependency,
            _ if dependencies.transform_error => TransformState::TransformError,
            (Some(_), None) => {
                if source.manager.supports_thumbnail(&source.document) {
                    TransformState::MissingThumbnailDependency
                } else {
                    TransformState::MissingPackageDependency
                }
            }
            (Some(asset_hash), Some(thumb_hash)) => {
                self.output_state(&source, &profile, asset_hash, thumb_hash)
            }
        };

        let status = AssetStatus {
            state,
            asset_hash: dependencies.dependency_hash,
            thumb_hash: references.reference_hash,
        };

        if is_active {
            self.commit_hash_pass(&pass, &dependencies, Some(&references));
            let mut guard = self.data.lock();
            let data = &mut *guard;
            let current = data
                .registry
                .get(owner)
                .is_some_and(|info| info.last_state_update == dependencies.generation);
            if current {
                if let Some(info) = data.registry.get_mut(owner) {
                    info.asset_hash = status.asset_hash;
                    info.thumb_hash = status.thumb_hash;
                }
                self.set_transform_state(data, owner, state);
                if state == TransformState::UpToDate {
                    if let Some(key) = data.registry.key_of(owner) {
                        let declared = source.manager.fill_out_sub_asset_list(&source.document);
                        data.registry
                            .update_sub_assets(key, declared, &mut data.sub_asset_changed);
                    }
                }
            } else {
                tracing::debug!("Discarding stale transform state of {owner}");
            }
        }
        Ok(status)
    }

    fn output_state(
        &self,
        source: &AssetSource,
        profile: &AssetProfile,
        asset_hash: u64,
        thumb_hash: u64,
    ) -> TransformState {
        let version = source.manager.document_version();
        for tag in source.document.output_tags() {
            let output = source
                .manager
                .absolute_output_file_name(&source.path, tag, profile);
            if !is_output_up_to_date(&output, asset_hash, version) {
                return TransformState::NeedsTransform;
            }
        }
        if source.manager.supports_thumbnail(&source.document) {
            let thumbnail = source.manager.resource_thumbnail_path(&source.path);
            if !is_thumbnail_up_to_date(&thumbnail, thumb_hash, version) {
                return TransformState::NeedsThumbnail;
            }
        }
        TransformState::UpToDate
    }

    /// Bring an asset's outputs up to date, transforming its transform
    /// dependencies first.
    pub fn transform_asset(
        &self,
        guid: AssetGuid,
        flags: TransformFlags,
        profile: Option<&AssetProfile>,
    ) -> Result<TransformOutcome> {
        let profile = profile.cloned().unwrap_or_else(|| self.active_profile());
        let mut visiting = AHashSet::new();
        self.transform_recursive(guid, flags, &profile, &mut visiting)
    }

    fn transform_recursive(
        &self,
        guid: AssetGuid,
        flags: TransformFlags,
        profile: &AssetProfile,
        visiting: &mut AHashSet<AssetGuid>,
    ) -> Result<TransformOutcome> {
        let (owner, source) = self.asset_source(guid)?;
        if !visiting.insert(owner) {
            return Ok(TransformOutcome::Skipped);
        }

        let dependency_flags = TransformFlags {
            force: false,
            ..flags
        };
        let known = |dependency: &String| {
            AssetGuid::parse(dependency).filter(|g| self.data.lock().registry.owner_of(*g).is_some())
        };
        for dependency in source.document.transform_dependencies.iter().filter_map(known) {
            self.transform_recursive(dependency, dependency_flags, profile, visiting)?;
        }
        for reference in source.document.pure_references().filter_map(known) {
            if let Err(err) = self.transform_recursive(reference, dependency_flags, profile, visiting) {
                tracing::warn!("Referenced asset {reference} of {owner} failed to transform: {err}");
            }
        }

        let status = self.is_asset_up_to_date(owner, Some(profile), false)?;
        let mut outcome = TransformOutcome::UpToDate;
        match status.state {
            TransformState::NeedsTransform | TransformState::TransformError => {
                self.run_transform(owner, &source, profile, status)?;
                outcome = TransformOutcome::Transformed;
            }
            TransformState::UpToDate | TransformState::NeedsThumbnail if flags.force => {
                self.run_transform(owner, &source, profile, status)?;
                outcome = TransformOutcome::Transformed;
            }
            TransformState::UpToDate | TransformState::NeedsThumbnail => {}
            state => return Err(CuratorError::TransformBlocked { guid: owner, state }),
        }

        let status = self.is_asset_up_to_date(owner, Some(profile), outcome == TransformOutcome::Transformed)?;
        if status.state == TransformState::NeedsThumbnail && !flags.skip_thumbnail {
            self.create_thumbnail_for(owner, &source, profile, status)?;
            if outcome == TransformOutcome::UpToDate {
                outcome = TransformOutcome::ThumbnailCreated;
            }
        }
        Ok(outcome)
    }

    fn run_transform(
        &self,
        owner: AssetGuid,
        source: &AssetSource,
        profile: &AssetProfile,
        status: AssetStatus,
    ) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = debug_span!("transform", guid = %owner).entered();

        let Some(asset_hash) = status.asset_hash else {
            return Err(CuratorError::TransformBlocked {
                guid: owner,
                state: status.state,
            });
        };
        let header = AssetFileHeader::new(asset_hash, source.manager.document_version());

        for tag in source.document.output_tags() {
            let ctx = TransformContext {
                asset_path: &source.path,
                document: &source.document,
                output_tag: tag,
                output_path: source
                    .manager
                    .absolute_output_file_name(&source.path, tag, profile),
                profile,
                header,
            };
            if let Err(err) = source.manager.transform_asset(&ctx) {
                let message = err.to_string();
                tracing::error!("Transform of '{}' failed: {message}", source.path.display());
                let mut guard = self.data.lock();
                let data = &mut *guard;
                if let Some(info) = data.registry.get_mut(owner) {
                    info.transform_error = Some(message.clone());
                }
                self.set_transform_state(data, owner, TransformState::TransformError);
                return Err(CuratorError::TransformFailed {
                    guid: owner,
                    message,
                });
            }
        }

        tracing::debug!("Transformed '{}'", source.path.display());
        let mut guard = self.data.lock();
        let data = &mut *guard;
        let had_error = data
            .registry
            .get_mut(owner)
            .and_then(|info| info.transform_error.take())
            .is_some();
        if had_error {
            self.invalidate_transform_state(data, owner);
        } else {
            self.refresh_transform_state(data, owner);
        }
        Ok(())
    }

    /// Render and store the thumbnail of an asset
    pub fn create_thumbnail(&self, guid: AssetGuid) -> Result<()> {
        let (owner, source) = self.asset_source(guid)?;
        if !source.manager.supports_thumbnail(&source.document) {
            return Err(CuratorError::ThumbnailUnsupported(owner));
        }
        let profile = self.active_profile();
        let status = self.is_asset_up_to_date(owner, Some(&profile), false)?;
        self.create_thumbnail_for(owner, &source, &profile, status)
    }

    fn create_thumbnail_for(
        &self,
        owner: AssetGuid,
        source: &AssetSource,
        profile: &AssetProfile,
        status: AssetStatus,
    ) -> Result<()> {
        let Some(thumb_hash) = status.thumb_hash else {
            return Err(CuratorError::TransformBlocked {
                guid: owner,
                state: status.state,
            });
        };
        let thumbnail_path = source.manager.resource_thumbnail_path(&source.path);
        let ctx = ThumbnailContext {
            asset_path: &source.path,
            document: &source.document,
            thumbnail_path: thumbnail_path.clone(),
            profile,
        };
        let image = source.manager.create_thumbnail(&ctx)?;
        write_thumbnail(&thumbnail_path, &image)?;
        ThumbnailInfo::new(thumb_hash, source.manager.document_version()).append_to_file(&thumbnail_path)?;

        let mut guard = self.data.lock();
        self.refresh_transform_state(&mut guard, owner);
        Ok(())
    }

    /// Transform every known asset
    pub fn transform_all_assets(&self, flags: TransformFlags, profile: Option<&AssetProfile>) -> TransformSummary {
        let mut guids = self.data.lock().registry.guids();
        guids.sort();
        let mut summary = TransformSummary::default();
        for guid in guids {
            match self.transform_asset(guid, flags, profile) {
                Ok(TransformOutcome::UpToDate) | Ok(TransformOutcome::Skipped) => summary.up_to_date += 1,
                Ok(_) => summary.transformed += 1,
                Err(err) => summary.failed.push((guid, err)),
            }
        }
        tracing::info!(
            "Transformed {} assets, {} up to date, {} failed",
            summary.transformed,
            summary.up_to_date,
            summary.failed.len()
        );
        summary
    }
}

fn write_thumbnail(path: &Path, image: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, image)?;
    Ok(())
}
