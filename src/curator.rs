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

//! The asset curator
//!
//! All bookkeeping lives in one [`CuratorData`] behind a single mutex. The
//! lock is only held for short, non-blocking sections; file I/O (stat,
//! hashing, document parsing) always happens with the lock released and the
//! results are committed afterwards.
//!
//! The operations are spread over several modules as `impl Curator` blocks:
//! `updates` (document tracking), `hash_engine`, `transform_state`,
//! `update_task`, `lookup`, `scan` and `cache`.

use crate::asset_info::{AssetInfo, ExistenceState, SubAssetInfo, TransformState};
use crate::config::{AssetProfile, CuratorConfig};
use crate::dependency_index::{DependencyIndex, DependencyResolver};
use crate::document::DocumentInfo;
use crate::error::{CuratorError, Result};
use crate::event::{CuratorEvent, CuratorEventKind, CuratorSubscriber};
use crate::file_status::{FileStatus, FileStatusTable};
use crate::guid::AssetGuid;
use crate::manager::ManagerRegistry;
use crate::paths::resolve_in_data_directories;
use crate::registry::{AssetKey, AssetRegistry, SubAssetKey};
use ahash::{AHashMap, AHashSet};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::time::SystemTime;

/// Document info restored from the persistent cache
#[derive(Debug, Clone)]
pub(crate) struct CachedDocument {
    pub timestamp: SystemTime,
    pub hash: u64,
    pub document: DocumentInfo,
}

/// State guarded by the curator lock
pub(crate) struct CuratorData {
    pub registry: AssetRegistry,
    pub files: FileStatusTable,
    pub dependencies: DependencyIndex,
    pub cached_files: AHashMap<PathBuf, FileStatus>,
    pub cached_documents: AHashMap<PathBuf, CachedDocument>,
    /// Assets waiting for a state recomputation, FIFO
    pub update_queue: VecDeque<AssetGuid>,
    pub queued: AHashSet<AssetGuid>,
    /// Assets a worker is currently updating
    pub updating: AHashSet<AssetGuid>,
    /// Sub-assets to report on the next tick
    pub sub_asset_changed: AHashSet<AssetGuid>,
    pub active_profile: AssetProfile,
    wake: Sender<()>,
}

impl CuratorData {
    /// Queue an asset for recomputation (once)
    pub fn mark_dirty(&mut self, guid: AssetGuid) {
        if self.queued.insert(guid) {
            self.update_queue.push_back(guid);
            let _ = self.wake.try_send(());
        }
    }

    /// Flag an asset and its sub-assets for the next tick
    pub fn mark_changed(&mut self, guid: AssetGuid) {
        if let Some(info) = self.registry.get(guid) {
            self.sub_asset_changed.extend(info.sub_assets.iter().copied());
        }
        self.sub_asset_changed.insert(guid);
    }
}

/// Resolves dependency strings against the registry and data directories
pub(crate) struct Resolver<'a> {
    pub registry: &'a AssetRegistry,
    pub config: &'a CuratorConfig,
}

impl DependencyResolver for Resolver<'_> {
    fn asset_path(&self, guid: AssetGuid) -> Option<PathBuf> {
        let owner = self.registry.owner_of(guid)?;
        self.registry.get(owner).map(|info| info.absolute_path.clone())
    }

    fn file_path(&self, dependency: &str) -> Option<PathBuf> {
        if self.config.is_virtual(dependency) {
            return None;
        }
        resolve_in_data_directories(&self.config.data_directories, dependency)
    }
}

/// Read view of all known assets, holding the curator lock
pub struct LockedAssets<'a>(MappedMutexGuard<'a, AssetRegistry>);

impl Deref for LockedAssets<'_> {
    type Target = AssetRegistry;

    fn deref(&self) -> &AssetRegistry {
        &self.0
    }
}

/// A sub-asset together with the curator lock
pub struct LockedSubAsset<'a> {
    registry: MappedMutexGuard<'a, AssetRegistry>,
    key: SubAssetKey,
}

impl<'a> LockedSubAsset<'a> {
    pub(crate) fn from_guard(guard: MutexGuard<'a, CuratorData>, guid: AssetGuid) -> Option<Self> {
        let registry = MutexGuard::map(guard, |data| &mut data.registry);
        let key = registry.sub_asset_key(guid)?;
        Some(Self { registry, key })
    }

    /// The asset owning this sub-asset
    pub fn asset(&self) -> &AssetInfo {
        self.registry.asset_slot(self.deref().owning_asset)
    }
}

impl Deref for LockedSubAsset<'_> {
    type Target = SubAssetInfo;

    fn deref(&self) -> &SubAssetInfo {
        self.registry.sub_slot(self.key)
    }
}

/// Tracks asset documents below the data directories and keeps their
/// dependency hashes and transform states current.
pub struct Curator {
    pub(crate) config: CuratorConfig,
    pub(crate) managers: ManagerRegistry,
    pub(crate) data: Mutex<CuratorData>,
    subscribers: Mutex<Vec<Box<dyn CuratorSubscriber>>>,
    pub(crate) file_reads: AtomicU64,
    pub(crate) wake_rx: Receiver<()>,
}

impl Curator {
    pub fn new(config: CuratorConfig, managers: ManagerRegistry) -> Result<Self> {
        config.validate()?;
        let (wake, wake_rx) = channel::bounded(1);
        let data = CuratorData {
            registry: AssetRegistry::new(),
            files: FileStatusTable::new(),
            dependencies: DependencyIndex::new(),
            cached_files: AHashMap::new(),
            cached_documents: AHashMap::new(),
            update_queue: VecDeque::new(),
            queued: AHashSet::new(),
            updating: AHashSet::new(),
            sub_asset_changed: AHashSet::new(),
            active_profile: config.initial_profile(),
            wake,
        };
        tracing::debug!(
            "Curator created with {} data directories and {} asset types",
            config.data_directories.len(),
            managers.len()
        );
        Ok(Self {
            config,
            managers,
            data: Mutex::new(data),
            subscribers: Mutex::new(Vec::new()),
            file_reads: AtomicU64::new(0),
            wake_rx,
        })
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    pub fn managers(&self) -> &ManagerRegistry {
        &self.managers
    }

    pub fn active_profile(&self) -> AssetProfile {
        self.data.lock().active_profile.clone()
    }

    pub fn subscribe(&self, subscriber: Box<dyn CuratorSubscriber>) {
        self.subscribers.lock().push(subscriber);
    }

    /// Deliver events; must not be called with the curator lock held
    pub(crate) fn broadcast(&self, events: &[CuratorEvent]) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        for event in events {
            for subscriber in subscribers.iter_mut() {
                if let Err(err) = subscriber.on_event(event) {
                    tracing::warn!("Subscriber '{}' failed: {err}", subscriber.name());
                }
            }
        }
    }

    /// Lock the curator and view all known assets
    pub fn known_assets(&self) -> LockedAssets<'_> {
        LockedAssets(MutexGuard::map(self.data.lock(), |data| &mut data.registry))
    }

    /// Look up an asset or sub-asset by GUID, keeping the curator locked
    pub fn get_sub_asset(&self, guid: AssetGuid) -> Option<LockedSubAsset<'_>> {
        LockedSubAsset::from_guard(self.data.lock(), guid)
    }

    /// Snapshot of an asset record
    pub fn asset_info(&self, guid: AssetGuid) -> Option<AssetInfo> {
        let data = self.data.lock();
        let owner = data.registry.owner_of(guid)?;
        data.registry.get(owner).cloned()
    }

    /// Cached transform state without recomputation
    pub fn transform_state(&self, guid: AssetGuid) -> Option<TransformState> {
        let data = self.data.lock();
        let owner = data.registry.owner_of(guid)?;
        data.registry.get(owner).map(|info| info.transform_state)
    }

    pub(crate) fn output_paths(&self, info: &AssetInfo, profile: &AssetProfile) -> Vec<PathBuf> {
        info.document_info
            .output_tags()
            .map(|tag| {
                info.manager
                    .absolute_output_file_name(&info.absolute_path, tag, profile)
            })
            .collect()
    }

    /// Register an asset's inputs and outputs in the inverse index
    pub(crate) fn track_dependencies(&self, data: &mut CuratorData, key: AssetKey) {
        let Some(info) = data.registry.by_key(key) else {
            return;
        };
        let outputs = self.output_paths(info, &data.active_profile);
        let resolver = Resolver {
            registry: &data.registry,
            config: &self.config,
        };
        data.dependencies
            .track(info.guid(), &info.document_info, &outputs, &resolver);
    }

    pub(crate) fn untrack_dependencies(&self, data: &mut CuratorData, key: AssetKey) {
        let Some(info) = data.registry.by_key(key) else {
            return;
        };
        let outputs = self.output_paths(info, &data.active_profile);
        let resolver = Resolver {
            registry: &data.registry,
            config: &self.config,
        };
        data.dependencies
            .untrack(info.guid(), &info.document_info, &outputs, &resolver);
    }

    /// Apply `change` while the consumers of `path` are untracked, so GUID
    /// dependencies on an asset that moves or disappears follow it.
    pub(crate) fn retrack_users<F>(&self, data: &mut CuratorData, path: &Path, change: F)
    where
        F: FnOnce(&mut CuratorData),
    {
        let users: Vec<AssetKey> = data
            .dependencies
            .dependents_of(path)
            .into_iter()
            .filter_map(|guid| data.registry.key_of(guid))
            .collect();
        for key in &users {
            self.untrack_dependencies(data, *key);
        }
        change(data);
        for key in &users {
            self.track_dependencies(data, *key);
        }
    }

    /// Resolve parked GUID dependencies; consumers that changed are invalidated
    pub(crate) fn update_unresolved_tracked_files(&self, data: &mut CuratorData) {
        let resolver = Resolver {
            registry: &data.registry,
            config: &self.config,
        };
        let resolved = data.dependencies.update_unresolved(&resolver);
        for guid in resolved {
            self.invalidate_transform_state(data, guid);
        }
    }

    /// Flush pending asset changes as events, purge removed assets and
    /// settle existence states. Call regularly from the owning thread.
    pub fn tick(&self) -> Vec<CuratorEvent> {
        let events = {
            let mut guard = self.data.lock();
            let data = &mut *guard;
            let mut changed: Vec<AssetGuid> = data.sub_asset_changed.drain().collect();
            changed.sort();

            let mut events = Vec::with_capacity(changed.len());
            let mut removed = Vec::new();
            for guid in changed {
                let Some(sub) = data.registry.sub_asset(guid) else {
                    continue;
                };
                let kind = match sub.existence_state {
                    ExistenceState::FileAdded => CuratorEventKind::AssetAdded,
                    ExistenceState::FileRemoved => {
                        removed.push(guid);
                        CuratorEventKind::AssetRemoved
                    }
                    ExistenceState::FileModified => CuratorEventKind::AssetModified,
                    ExistenceState::FileUnchanged => CuratorEventKind::AssetUpdated,
                };
                events.push(CuratorEvent::asset(kind, guid, sub.existence_state));
            }

            for guid in removed {
                let asset_removed = data
                    .registry
                    .get(guid)
                    .is_some_and(|info| info.existence_state == ExistenceState::FileRemoved);
                if asset_removed {
                    self.remove_transform_state(data, guid);
                    let path = data
                        .registry
                        .get(guid)
                        .map(|info| info.absolute_path.clone())
                        .unwrap_or_default();
                    self.retrack_users(data, &path, |data| {
                        data.registry.remove(guid);
                    });
                } else if data
                    .registry
                    .sub_asset(guid)
                    .is_some_and(|sub| sub.existence_state == ExistenceState::FileRemoved)
                {
                    data.registry.remove_sub_asset(guid);
                }
            }
            data.registry.settle_existence_states();
            events
        };
        self.broadcast(&events);
        events
    }

    /// Switch the active profile; every asset is re-tracked and invalidated
    pub fn set_active_profile(&self, name: &str) -> Result<()> {
        let profile = self
            .config
            .profile(name)
            .cloned()
            .ok_or_else(|| CuratorError::Config(format!("unknown profile '{name}'")))?;
        {
            let mut guard = self.data.lock();
            let data = &mut *guard;
            if data.active_profile == profile {
                return Ok(());
            }
            let keys: Vec<AssetKey> = data.registry.iter().map(|(key, _)| key).collect();
            for key in &keys {
                self.untrack_dependencies(data, *key);
            }
            data.active_profile = profile;
            for key in &keys {
                self.track_dependencies(data, *key);
            }
            for guid in data.registry.guids() {
                self.invalidate_transform_state(data, guid);
            }
        }
        tracing::info!("Active profile switched to '{name}'");
        self.broadcast(&[CuratorEvent::global(CuratorEventKind::ActiveProfileChanged)]);
        Ok(())
    }
}
