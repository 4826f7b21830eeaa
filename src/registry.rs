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

//! Asset and sub-asset storage
//!
//! Assets and sub-assets live in slot maps; GUID maps point at the stable
//! keys. Sub-assets refer to their owner by [`AssetKey`], so an asset can be
//! moved or re-read without touching its sub-assets.

use crate::asset_info::{AssetInfo, ExistenceState, SubAssetInfo};
use crate::document::SubAssetData;
use crate::guid::AssetGuid;
use ahash::{AHashMap, AHashSet};
use slotmap::{new_key_type, SlotMap};
use std::collections::BTreeSet;

new_key_type! {
    /// Stable handle of an [`AssetInfo`]
    pub struct AssetKey;
    /// Stable handle of a [`SubAssetInfo`]
    pub struct SubAssetKey;
}

#[derive(Default)]
pub struct AssetRegistry {
    assets: SlotMap<AssetKey, AssetInfo>,
    by_guid: AHashMap<AssetGuid, AssetKey>,
    sub_assets: SlotMap<SubAssetKey, SubAssetInfo>,
    sub_by_guid: AHashMap<AssetGuid, SubAssetKey>,
}

/// Existence states only move forward; an asset reported as added stays
/// added until the next tick even if it is modified again.
fn merge_existence(current: ExistenceState, next: ExistenceState) -> ExistenceState {
    if current == ExistenceState::FileAdded && next == ExistenceState::FileModified {
        current
    } else {
        next
    }
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: AssetInfo) -> AssetKey {
        let guid = info.guid();
        let key = self.assets.insert(info);
        self.by_guid.insert(guid, key);
        key
    }

    #[inline]
    pub fn key_of(&self, guid: AssetGuid) -> Option<AssetKey> {
        self.by_guid.get(&guid).copied()
    }

    #[inline]
    pub fn contains(&self, guid: AssetGuid) -> bool {
        self.by_guid.contains_key(&guid)
    }

    pub fn get(&self, guid: AssetGuid) -> Option<&AssetInfo> {
        self.key_of(guid).and_then(|k| self.assets.get(k))
    }

    pub fn get_mut(&mut self, guid: AssetGuid) -> Option<&mut AssetInfo> {
        let key = self.key_of(guid)?;
        self.assets.get_mut(key)
    }

    pub fn by_key(&self, key: AssetKey) -> Option<&AssetInfo> {
        self.assets.get(key)
    }

    pub fn by_key_mut(&mut self, key: AssetKey) -> Option<&mut AssetInfo> {
        self.assets.get_mut(key)
    }

    /// Remove an asset together with its main and declared sub-assets
    pub fn remove(&mut self, guid: AssetGuid) -> Option<AssetInfo> {
        let key = self.by_guid.remove(&guid)?;
        let info = self.assets.remove(key)?;
        for sub in std::iter::once(&guid).chain(&info.sub_assets) {
            if let Some(sub_key) = self.sub_by_guid.get(sub).copied() {
                if self.sub_assets.get(sub_key).map(|s| s.owning_asset) == Some(key) {
                    self.sub_by_guid.remove(sub);
                    self.sub_assets.remove(sub_key);
                }
            }
        }
        Some(info)
    }

    pub fn sub_asset_key(&self, guid: AssetGuid) -> Option<SubAssetKey> {
        self.sub_by_guid.get(&guid).copied()
    }

    pub fn sub_asset(&self, guid: AssetGuid) -> Option<&SubAssetInfo> {
        self.sub_asset_key(guid).and_then(|k| self.sub_assets.get(k))
    }

    pub fn sub_asset_mut(&mut self, guid: AssetGuid) -> Option<&mut SubAssetInfo> {
        let key = self.sub_asset_key(guid)?;
        self.sub_assets.get_mut(key)
    }

    pub fn sub_by_key(&self, key: SubAssetKey) -> Option<&SubAssetInfo> {
        self.sub_assets.get(key)
    }

    /// Owning asset of any asset or sub-asset GUID
    pub fn owner_of(&self, guid: AssetGuid) -> Option<AssetGuid> {
        if self.contains(guid) {
            return Some(guid);
        }
        let sub = self.sub_asset(guid)?;
        self.assets.get(sub.owning_asset).map(AssetInfo::guid)
    }

    /// Remove a single sub-asset (and, for a main sub-asset, nothing else)
    pub fn remove_sub_asset(&mut self, guid: AssetGuid) -> Option<SubAssetInfo> {
        let key = self.sub_by_guid.remove(&guid)?;
        let sub = self.sub_assets.remove(key)?;
        if let Some(owner) = self.assets.get_mut(sub.owning_asset) {
            owner.sub_assets.remove(&guid);
        }
        Some(sub)
    }

    /// Sync the sub-asset table with a freshly read document.
    ///
    /// The main sub-asset (same GUID as the asset) always exists but is not
    /// part of [`AssetInfo::sub_assets`]. Sub-assets that disappeared are
    /// marked removed and purged on the next tick.
    pub fn update_sub_assets(
        &mut self,
        key: AssetKey,
        declared: Vec<SubAssetData>,
        changed: &mut AHashSet<AssetGuid>,
    ) {
        let Some(info) = self.assets.get(key) else {
            return;
        };
        let main_guid = info.guid();
        let main = SubAssetData::new(main_guid, "", info.document_info.asset_type.clone());
        let previous = info.sub_assets.clone();
        let mut current = BTreeSet::new();

        for data in std::iter::once(main).chain(declared) {
            if data.guid != main_guid {
                current.insert(data.guid);
            }
            match self.sub_by_guid.get(&data.guid).copied() {
                Some(sub_key) => {
                    let Some(sub) = self.sub_assets.get_mut(sub_key) else {
                        continue;
                    };
                    let revived = sub.existence_state == ExistenceState::FileRemoved;
                    if sub.name != data.name
                        || sub.sub_asset_type != data.sub_asset_type
                        || sub.owning_asset != key
                        || revived
                    {
                        sub.name = data.name;
                        sub.sub_asset_type = data.sub_asset_type;
                        sub.owning_asset = key;
                        sub.existence_state = if revived {
                            ExistenceState::FileModified
                        } else {
                            merge_existence(sub.existence_state, ExistenceState::FileModified)
                        };
                        changed.insert(data.guid);
                    }
                }
                None => {
                    let sub_key = self.sub_assets.insert(SubAssetInfo {
                        guid: data.guid,
                        name: data.name,
                        sub_asset_type: data.sub_asset_type,
                        owning_asset: key,
                        existence_state: ExistenceState::FileAdded,
                        last_access: None,
                    });
                    self.sub_by_guid.insert(data.guid, sub_key);
                    changed.insert(data.guid);
                }
            }
        }

        let gone: Vec<AssetGuid> = previous.difference(&current).copied().collect();
        for guid in gone {
            if let Some(sub) = self.sub_asset_mut(guid) {
                if sub.owning_asset == key {
                    sub.existence_state = ExistenceState::FileRemoved;
                    changed.insert(guid);
                    current.insert(guid);
                }
            }
        }

        if let Some(info) = self.assets.get_mut(key) {
            info.sub_assets = current;
        }
    }

    /// Set the existence state of an asset and all of its sub-assets
    pub fn set_existence_state(
        &mut self,
        key: AssetKey,
        state: ExistenceState,
        changed: &mut AHashSet<AssetGuid>,
    ) {
        let Some(info) = self.assets.get_mut(key) else {
            return;
        };
        info.existence_state = merge_existence(info.existence_state, state);
        let subs: Vec<AssetGuid> = std::iter::once(info.guid())
            .chain(info.sub_assets.iter().copied())
            .collect();
        for guid in subs {
            if let Some(sub) = self.sub_asset_mut(guid) {
                if sub.owning_asset == key {
                    sub.existence_state = merge_existence(sub.existence_state, state);
                    changed.insert(guid);
                }
            }
        }
    }

    /// Settle added and modified entries to unchanged after they were reported
    pub fn settle_existence_states(&mut self) {
        for info in self.assets.values_mut() {
            if matches!(
                info.existence_state,
                ExistenceState::FileAdded | ExistenceState::FileModified
            ) {
                info.existence_state = ExistenceState::FileUnchanged;
            }
        }
        for sub in self.sub_assets.values_mut() {
            if matches!(
                sub.existence_state,
                ExistenceState::FileAdded | ExistenceState::FileModified
            ) {
                sub.existence_state = ExistenceState::FileUnchanged;
            }
        }
    }

    pub(crate) fn asset_slot(&self, key: AssetKey) -> &AssetInfo {
        &self.assets[key]
    }

    pub(crate) fn sub_slot(&self, key: SubAssetKey) -> &SubAssetInfo {
        &self.sub_assets[key]
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetKey, &AssetInfo)> {
        self.assets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AssetKey, &mut AssetInfo)> {
        self.assets.iter_mut()
    }

    pub fn guids(&self) -> Vec<AssetGuid> {
        self.assets.values().map(AssetInfo::guid).collect()
    }

    pub fn sub_assets(&self) -> impl Iterator<Item = &SubAssetInfo> {
        self.sub_assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
