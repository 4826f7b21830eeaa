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

//! Inverse dependency index
//!
//! Maps every file path to the assets that consume it, either as a
//! transform dependency or as a runtime reference. Asset outputs are indexed
//! as references of their producer so that touching an output invalidates
//! the asset that wrote it. GUID dependencies whose asset is not known yet
//! are parked as unresolved until the asset shows up.

use crate::document::DocumentInfo;
use crate::guid::AssetGuid;
use ahash::AHashMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Translates dependency strings into absolute paths
pub trait DependencyResolver {
    /// Path of the document owning this asset or sub-asset GUID
    fn asset_path(&self, guid: AssetGuid) -> Option<PathBuf>;

    /// Absolute path for a file dependency; `None` for virtual or unresolvable strings
    fn file_path(&self, dependency: &str) -> Option<PathBuf>;
}

enum Resolved {
    Path(PathBuf),
    Unresolved(AssetGuid),
    Skip,
}

fn resolve(resolver: &dyn DependencyResolver, dependency: &str) -> Resolved {
    if dependency.is_empty() {
        return Resolved::Skip;
    }
    if let Some(guid) = AssetGuid::parse(dependency) {
        return match resolver.asset_path(guid) {
            Some(path) => Resolved::Path(path),
            None => Resolved::Unresolved(guid),
        };
    }
    match resolver.file_path(dependency) {
        Some(path) => Resolved::Path(path),
        None => Resolved::Skip,
    }
}

type Users = SmallVec<[AssetGuid; 1]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Dependency,
    Reference,
}

#[derive(Debug, Default)]
pub struct DependencyIndex {
    inverse_dependency: AHashMap<PathBuf, Users>,
    inverse_reference: AHashMap<PathBuf, Users>,
    /// (consumer, missing target)
    unresolved_dependencies: BTreeSet<(AssetGuid, AssetGuid)>,
    unresolved_references: BTreeSet<(AssetGuid, AssetGuid)>,
}

fn add_user(map: &mut AHashMap<PathBuf, Users>, path: PathBuf, guid: AssetGuid) {
    let users = map.entry(path).or_default();
    if !users.contains(&guid) {
        users.push(guid);
    }
}

fn remove_user(map: &mut AHashMap<PathBuf, Users>, path: &Path, guid: AssetGuid) {
    if let Some(users) = map.get_mut(path) {
        users.retain(|g| *g != guid);
        if users.is_empty() {
            map.remove(path);
        }
    }
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_mut(&mut self, edge: Edge) -> &mut AHashMap<PathBuf, Users> {
        match edge {
            Edge::Dependency => &mut self.inverse_dependency,
            Edge::Reference => &mut self.inverse_reference,
        }
    }

    fn unresolved_mut(&mut self, edge: Edge) -> &mut BTreeSet<(AssetGuid, AssetGuid)> {
        match edge {
            Edge::Dependency => &mut self.unresolved_dependencies,
            Edge::Reference => &mut self.unresolved_references,
        }
    }

    fn edges(document: &DocumentInfo) -> impl Iterator<Item = (Edge, &String)> {
        document
            .transform_dependencies
            .iter()
            .map(|d| (Edge::Dependency, d))
            .chain(document.runtime_references.iter().map(|r| (Edge::Reference, r)))
    }

    /// Register all inputs and outputs of an asset
    pub fn track(
        &mut self,
        guid: AssetGuid,
        document: &DocumentInfo,
        outputs: &[PathBuf],
        resolver: &dyn DependencyResolver,
    ) {
        for (edge, dependency) in Self::edges(document) {
            match resolve(resolver, dependency) {
                Resolved::Path(path) => add_user(self.map_mut(edge), path, guid),
                Resolved::Unresolved(target) => {
                    self.unresolved_mut(edge).insert((guid, target));
                }
                Resolved::Skip => {}
            }
        }
        for output in outputs {
            add_user(&mut self.inverse_reference, output.clone(), guid);
        }
    }

    /// Undo [`track`](Self::track); must see the same document and outputs
    pub fn untrack(
        &mut self,
        guid: AssetGuid,
        document: &DocumentInfo,
        outputs: &[PathBuf],
        resolver: &dyn DependencyResolver,
    ) {
        for (edge, dependency) in Self::edges(document) {
            match resolve(resolver, dependency) {
                Resolved::Path(path) => remove_user(self.map_mut(edge), &path, guid),
                Resolved::Unresolved(target) => {
                    self.unresolved_mut(edge).remove(&(guid, target));
                }
                Resolved::Skip => {}
            }
        }
        for output in outputs {
            remove_user(&mut self.inverse_reference, output, guid);
        }
        self.unresolved_dependencies.retain(|(user, _)| *user != guid);
        self.unresolved_references.retain(|(user, _)| *user != guid);
    }

    /// Move parked GUID dependencies whose asset is now known into the index.
    ///
    /// Returns the consumers that gained a resolved dependency.
    pub fn update_unresolved(&mut self, resolver: &dyn DependencyResolver) -> Vec<AssetGuid> {
        let mut resolved_users = Vec::new();
        for edge in [Edge::Dependency, Edge::Reference] {
            let pending: Vec<(AssetGuid, AssetGuid)> = self.unresolved_mut(edge).iter().copied().collect();
            for (user, target) in pending {
                if let Some(path) = resolver.asset_path(target) {
                    self.unresolved_mut(edge).remove(&(user, target));
                    add_user(self.map_mut(edge), path, user);
                    if !resolved_users.contains(&user) {
                        resolved_users.push(user);
                    }
                }
            }
        }
        resolved_users
    }

    /// Assets that use `path` as a transform dependency
    pub fn dependency_users(&self, path: &Path) -> &[AssetGuid] {
        self.inverse_dependency.get(path).map(|u| u.as_slice()).unwrap_or(&[])
    }

    /// Assets that reference `path` at runtime or produced it as output
    pub fn reference_users(&self, path: &Path) -> &[AssetGuid] {
        self.inverse_reference.get(path).map(|u| u.as_slice()).unwrap_or(&[])
    }

    /// All direct consumers of `path`
    pub fn dependents_of(&self, path: &Path) -> Vec<AssetGuid> {
        let mut out: Vec<AssetGuid> = self.dependency_users(path).to_vec();
        for guid in self.reference_users(path) {
            if !out.contains(guid) {
                out.push(*guid);
            }
        }
        out
    }

    pub fn is_referenced(&self, path: &Path) -> bool {
        !self.dependency_users(path).is_empty() || !self.reference_users(path).is_empty()
    }

    pub fn unresolved_dependencies(&self) -> impl Iterator<Item = &(AssetGuid, AssetGuid)> {
        self.unresolved_dependencies.iter()
    }

    pub fn unresolved_references(&self) -> impl Iterator<Item = &(AssetGuid, AssetGuid)> {
        self.unresolved_references.iter()
    }

    pub fn clear(&mut self) {
        self.inverse_dependency.clear();
        self.inverse_reference.clear();
        self.unresolved_dependencies.clear();
        self.unresolved_references.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;

    #[derive(Default)]
    struct MapResolver {
        assets: AHashMap<AssetGuid, PathBuf>,
    }

    impl DependencyResolver for MapResolver {
        fn asset_path(&self, guid: AssetGuid) -> Option<PathBuf> {
            self.assets.get(&guid).cloned()
        }

        fn file_path(&self, dependency: &str) -> Option<PathBuf> {
            (!dependency.ends_with(".color")).then(|| PathBuf::from("/data").join(dependency))
        }
    }

    fn guid(n: u128) -> AssetGuid {
        AssetGuid::from_u128(n)
    }

    #[test]
    fn track_and_untrack_are_symmetric() {
        let resolver = MapResolver::default();
        let doc = DocumentInfo::new(guid(1), "Material")
            .with_dependency("tex.png")
            .with_reference("sky.png")
            .with_reference("red.color");
        let outputs = vec![PathBuf::from("/data/AssetCache/Default/a.bin")];
        let mut index = DependencyIndex::new();

        index.track(guid(1), &doc, &outputs, &resolver);
        assert_eq!(index.dependency_users(Path::new("/data/tex.png")), &[guid(1)]);
        assert_eq!(index.reference_users(Path::new("/data/sky.png")), &[guid(1)]);
        assert!(index.is_referenced(&outputs[0]));
        assert!(!index.is_referenced(Path::new("/data/red.color")));

        index.untrack(guid(1), &doc, &outputs, &resolver);
        assert!(!index.is_referenced(Path::new("/data/tex.png")));
        assert!(!index.is_referenced(&outputs[0]));
    }

    #[test]
    fn unresolved_guids_resolve_later() {
        let mut resolver = MapResolver::default();
        let doc = DocumentInfo::new(guid(1), "Material").with_dependency(guid(2).to_string());
        let mut index = DependencyIndex::new();
        index.track(guid(1), &doc, &[], &resolver);
        assert_eq!(index.unresolved_dependencies().count(), 1);

        resolver.assets.insert(guid(2), PathBuf::from("/data/b.texture"));
        assert_eq!(index.update_unresolved(&resolver), vec![guid(1)]);
        assert_eq!(index.dependency_users(Path::new("/data/b.texture")), &[guid(1)]);
        assert_eq!(index.unresolved_dependencies().count(), 0);
    }

    #[test]
    fn dependents_are_deduplicated() {
        let resolver = MapResolver::default();
        let doc = DocumentInfo::new(guid(1), "Material")
            .with_dependency("tex.png")
            .with_reference("tex.png");
        let mut index = DependencyIndex::new();
        index.track(guid(1), &doc, &[], &resolver);
        assert_eq!(index.dependents_of(Path::new("/data/tex.png")), vec![guid(1)]);
    }
}
