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

//! Asset and file lookups

use crate::curator::{Curator, LockedSubAsset};
use crate::dependency_index::DependencyIndex;
use crate::error::{CuratorError, Result};
use crate::guid::AssetGuid;
use crate::paths::{find_data_directory, normalize_path};
use crate::registry::AssetRegistry;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Files and assets reachable from a starting point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitiveHull {
    /// Reached through transform dependencies
    pub dependencies: BTreeSet<String>,
    /// Reached through runtime references
    pub references: BTreeSet<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Edge {
    Dependency,
    Reference,
}

impl Curator {
    /// Data directory containing `path`
    pub fn find_data_directory_for_asset(&self, path: &Path) -> Result<PathBuf> {
        let path = normalize_path(path);
        find_data_directory(&self.config.data_directories, &path)
            .map(Path::to_path_buf)
            .ok_or(CuratorError::NotInDataDirectory { path })
    }

    /// Find a sub-asset by GUID string, absolute path, data-directory
    /// relative path or `path|sub-asset name`.
    ///
    /// With `exhaustive`, a relative path that matches no file exactly falls
    /// back to the known asset whose relative path ends with it.
    pub fn find_sub_asset(&self, path_or_guid: &str, exhaustive: bool) -> Option<LockedSubAsset<'_>> {
        if let Some(guid) = AssetGuid::parse(path_or_guid) {
            return self.get_sub_asset(guid);
        }

        let (main, sub_name) = match path_or_guid.split_once('|') {
            Some((main, sub)) => (main, Some(sub)),
            None => (path_or_guid, None),
        };
        let candidates = self.candidate_paths(main);

        let guard = self.data.lock();
        let mut asset = candidates
            .iter()
            .filter_map(|path| guard.files.get(path).and_then(|status| status.asset_guid))
            .find(|guid| guard.registry.contains(*guid));
        if asset.is_none() && exhaustive {
            asset = find_asset_by_suffix(&guard.registry, main);
        }
        let asset = asset?;

        let target = match sub_name {
            Some(name) => guard
                .registry
                .get(asset)?
                .sub_assets
                .iter()
                .copied()
                .find(|guid| {
                    guard
                        .registry
                        .sub_asset(*guid)
                        .is_some_and(|sub| sub.name().eq_ignore_ascii_case(name))
                })?,
            None => asset,
        };
        LockedSubAsset::from_guard(guard, target)
    }

    /// Absolute paths `path` may refer to, most specific first
    fn candidate_paths(&self, path: &str) -> Vec<PathBuf> {
        let path = Path::new(path);
        if path.is_absolute() {
            return vec![normalize_path(path)];
        }
        let dirs = &self.config.data_directories;
        let parent_relative = dirs
            .iter()
            .filter_map(|dir| dir.parent())
            .map(|parent| normalize_path(&parent.join(path)));
        let dir_relative = dirs.iter().map(|dir| normalize_path(&dir.join(path)));
        parent_relative.chain(dir_relative).collect()
    }

    /// Assets that use `guid` as transform dependency or runtime reference
    pub fn find_all_uses(&self, guid: AssetGuid, transitive: bool) -> BTreeSet<AssetGuid> {
        let data = self.data.lock();
        let Some(path) = data
            .registry
            .owner_of(guid)
            .and_then(|owner| data.registry.get(owner))
            .map(|info| info.absolute_path.clone())
        else {
            return BTreeSet::new();
        };
        collect_uses(&data.registry, &data.dependencies, path, transitive)
    }

    /// Assets that use the file at `path`
    pub fn find_all_uses_of_path(&self, path: &Path, transitive: bool) -> BTreeSet<AssetGuid> {
        let data = self.data.lock();
        collect_uses(&data.registry, &data.dependencies, normalize_path(path), transitive)
    }

    /// True if any asset depends on or references the file at `path`
    pub fn is_referenced(&self, path: &Path) -> bool {
        self.data.lock().dependencies.is_referenced(&normalize_path(path))
    }

    /// Everything `asset_or_path` pulls in. Assets are reported by absolute
    /// path, other dependency strings verbatim.
    pub fn generate_transitive_hull(
        &self,
        asset_or_path: &str,
        include_dependencies: bool,
        include_references: bool,
    ) -> TransitiveHull {
        let data = self.data.lock();
        let mut hull = TransitiveHull::default();
        let mut todo = Vec::new();
        if include_dependencies {
            todo.push((asset_or_path.to_string(), Edge::Dependency));
        }
        if include_references {
            todo.push((asset_or_path.to_string(), Edge::Reference));
        }

        while let Some((entry, edge)) = todo.pop() {
            let info = AssetGuid::parse(&entry)
                .and_then(|guid| data.registry.owner_of(guid))
                .and_then(|owner| data.registry.get(owner));
            let name = match info {
                Some(info) => info.absolute_path.to_string_lossy().into_owned(),
                None => entry,
            };
            let inserted = match edge {
                Edge::Dependency => hull.dependencies.insert(name),
                Edge::Reference => hull.references.insert(name),
            };
            let Some(info) = info.filter(|_| inserted) else {
                continue;
            };
            let document = &info.document_info;
            match edge {
                Edge::Dependency => todo.extend(
                    document
                        .transform_dependencies
                        .iter()
                        .map(|dep| (dep.clone(), Edge::Dependency)),
                ),
                Edge::Reference => todo.extend(
                    document
                        .runtime_references
                        .iter()
                        .map(|reference| (reference.clone(), Edge::Reference)),
                ),
            }
        }
        hull
    }

    /// Record that a sub-asset was just used
    pub fn update_asset_last_access_time(&self, guid: AssetGuid) {
        if let Some(sub) = self.data.lock().registry.sub_asset_mut(guid) {
            sub.last_access = Some(SystemTime::now());
        }
    }
}

fn collect_uses(
    registry: &AssetRegistry,
    dependencies: &DependencyIndex,
    path: PathBuf,
    transitive: bool,
) -> BTreeSet<AssetGuid> {
    let mut uses = BTreeSet::new();
    let mut todo = vec![path];
    while let Some(path) = todo.pop() {
        for user in dependencies.dependents_of(&path) {
            if uses.insert(user) && transitive {
                if let Some(info) = registry.get(user) {
                    todo.push(info.absolute_path.clone());
                }
            }
        }
    }
    uses
}

/// Known asset whose relative path equals `query`, else the shortest one
/// ending in `/query`
fn find_asset_by_suffix(registry: &AssetRegistry, query: &str) -> Option<AssetGuid> {
    let query = query.replace('\\', "/").to_ascii_lowercase();
    let query = query.trim_start_matches('/');
    if query.is_empty() {
        return None;
    }
    let with_slash = format!("/{query}");

    let mut best: Option<(usize, AssetGuid)> = None;
    for (_, info) in registry.iter() {
        let relative = info
            .data_dir_relative_path
            .to_string_lossy()
            .replace('\\', "/")
            .to_ascii_lowercase();
        if relative == query {
            return Some(info.guid());
        }
        if relative.ends_with(&with_slash) {
            let depth = info.data_dir_relative_path.components().count();
            if best.map_or(true, |(min, _)| depth < min) {
                best = Some((depth, info.guid()));
            }
        }
    }
    best.map(|(_, guid)| guid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_search_on_empty_registry() {
        let registry = AssetRegistry::new();
        assert_eq!(find_asset_by_suffix(&registry, "a/b.mesh"), None);
        assert_eq!(find_asset_by_suffix(&registry, ""), None);
    }
}
