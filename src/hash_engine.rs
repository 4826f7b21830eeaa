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

//! Transitive dependency hashing
//!
//! The dependency hash of an asset folds, in order, its settings hash (plus
//! the profile hash) and the hash of every transform dependency: the content
//! hash for files, the dependency hash for assets. Transform dependencies
//! form a DAG; every asset on a cycle is circular, whichever asset a pass
//! started from.
//!
//! The reference hash covers everything the asset pulls in at runtime. It is
//! built over the closure reachable through both kinds of edges, visited in
//! GUID and path order, so reference cycles are harmless and the result does
//! not depend on where a traversal started.
//!
//! Traversal uses an explicit stack and re-acquires the curator lock for
//! every lookup; file hashing runs without it.

use crate::asset_info::TransformState;
use crate::config::AssetProfile;
use crate::curator::Curator;
use crate::error::HashError;
use crate::guid::AssetGuid;
use crate::hasher::combine_hash;
use crate::paths::resolve_in_data_directories;
use ahash::{AHashMap, AHashSet};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;

#[cfg(feature = "profiling")]
use tracing::debug_span;

/// What a pass needs to know about one asset, copied out under the lock
struct AssetSnapshot {
    guid: AssetGuid,
    generation: u32,
    settings_hash: u64,
    dependencies: Vec<String>,
    references: Vec<String>,
    transform_error: bool,
}

enum Target {
    Skip,
    Asset(AssetGuid),
    UnknownAsset,
    File(PathBuf),
    Unresolvable,
}

/// Dependency-hash result for one asset
#[derive(Debug, Clone)]
pub(crate) struct DependencyOutcome {
    pub guid: AssetGuid,
    pub generation: u32,
    pub dependency_hash: Option<u64>,
    pub missing_dependencies: BTreeSet<String>,
    pub circular: bool,
    /// The asset or something in its transform closure failed to transform
    pub transform_error: bool,
    /// Reused from a still-valid cached state
    pub cached: bool,
}

impl DependencyOutcome {
    fn mark_circular(&mut self) {
        self.circular = true;
        self.dependency_hash = None;
    }

    pub fn to_result(&self) -> Result<u64, HashError> {
        if self.circular {
            return Err(HashError::CircularDependency { guid: self.guid });
        }
        self.dependency_hash.ok_or_else(|| HashError::MissingDependencies {
            dependencies: self.missing_dependencies.clone(),
            references: BTreeSet::new(),
        })
    }
}

/// Reference-hash result for one asset
#[derive(Debug, Clone, Default)]
pub(crate) struct ReferenceOutcome {
    pub reference_hash: Option<u64>,
    pub missing_references: BTreeSet<String>,
}

struct Frame {
    snapshot: AssetSnapshot,
    /// Visit order and lowest visit order reachable (strongly connected components)
    index: usize,
    low: usize,
    next: usize,
    /// Dependency string waiting for a child frame
    pending: Option<String>,
    hash: u64,
    missing: BTreeSet<String>,
    transform_error: bool,
}

impl Frame {
    fn new(snapshot: AssetSnapshot, index: usize) -> Self {
        Self {
            hash: snapshot.settings_hash,
            transform_error: snapshot.transform_error,
            snapshot,
            index,
            low: index,
            next: 0,
            pending: None,
            missing: BTreeSet::new(),
        }
    }

    fn apply(&mut self, dependency: &str, child: &DependencyOutcome) {
        match child.dependency_hash {
            Some(hash) => self.hash = combine_hash(self.hash, hash),
            None => {
                self.missing.insert(dependency.to_string());
            }
        }
        self.transform_error |= child.transform_error;
    }
}

/// One hashing pass; memoizes every asset it visits
pub(crate) struct HashPass<'c> {
    curator: &'c Curator,
    profile: AssetProfile,
    use_cached_states: bool,
    memo: AHashMap<AssetGuid, DependencyOutcome>,
    in_cycle: AHashSet<AssetGuid>,
    next_index: usize,
    /// Visited assets whose component is not closed yet, with their visit order
    open: AHashMap<AssetGuid, usize>,
    component_stack: Vec<AssetGuid>,
    /// Finished assets waiting for their component to close
    provisional: AHashMap<AssetGuid, DependencyOutcome>,
}

impl<'c> HashPass<'c> {
    pub fn new(curator: &'c Curator, profile: AssetProfile) -> Self {
        let use_cached_states = curator.data.lock().active_profile == profile;
        Self {
            curator,
            profile,
            use_cached_states,
            memo: AHashMap::new(),
            in_cycle: AHashSet::new(),
            next_index: 0,
            open: AHashMap::new(),
            component_stack: Vec::new(),
            provisional: AHashMap::new(),
        }
    }

    fn open_frame(&mut self, snapshot: AssetSnapshot) -> Frame {
        let index = self.next_index;
        self.next_index += 1;
        self.open.insert(snapshot.guid, index);
        self.component_stack.push(snapshot.guid);
        Frame::new(snapshot, index)
    }

    fn snapshot(&self, guid: AssetGuid) -> Option<AssetSnapshot> {
        let data = self.curator.data.lock();
        let owner = data.registry.owner_of(guid)?;
        let info = data.registry.get(owner)?;
        let document = &info.document_info;
        Some(AssetSnapshot {
            guid: owner,
            generation: info.last_state_update,
            settings_hash: document
                .settings_hash
                .wrapping_add(info.manager.profile_hash(&self.profile)),
            dependencies: document.transform_dependencies.iter().cloned().collect(),
            references: document.pure_references().cloned().collect(),
            transform_error: info.transform_error.is_some(),
        })
    }

    /// Outcome from a cached state that no invalidation has reset.
    ///
    /// Circular assets are always walked again so that the whole cycle ends
    /// up in one component of this pass.
    fn cached_outcome(&self, guid: AssetGuid) -> Option<DependencyOutcome> {
        if !self.use_cached_states {
            return None;
        }
        let data = self.curator.data.lock();
        let info = data.registry.get(guid)?;
        let state = info.transform_state;
        let dependency_hash = match state {
            TransformState::Unknown | TransformState::CircularDependency => return None,
            TransformState::MissingTransformDependency => None,
            _ => Some(info.asset_hash?),
        };
        Some(DependencyOutcome {
            guid,
            generation: info.last_state_update,
            dependency_hash,
            missing_dependencies: info.missing_dependencies.clone(),
            circular: false,
            transform_error: state == TransformState::TransformError || info.transform_error.is_some(),
            cached: true,
        })
    }

    fn classify(&self, dependency: &str) -> Target {
        if dependency.is_empty() {
            return Target::Skip;
        }
        if let Some(guid) = AssetGuid::parse(dependency) {
            let data = self.curator.data.lock();
            return match data.registry.owner_of(guid) {
                Some(owner) => Target::Asset(owner),
                None => Target::UnknownAsset,
            };
        }
        let config = &self.curator.config;
        if config.is_virtual(dependency) {
            return Target::Skip;
        }
        match resolve_in_data_directories(&config.data_directories, dependency) {
            Some(path) => Target::File(path),
            None => Target::Unresolvable,
        }
    }

    /// Finish a frame. Outcomes are only memoized once the strongly connected
    /// component they belong to is closed; every member of a component with
    /// more than one asset (or a self edge) is circular.
    fn finish(&mut self, frame: Frame) -> DependencyOutcome {
        let guid = frame.snapshot.guid;
        let mut outcome = DependencyOutcome {
            guid,
            generation: frame.snapshot.generation,
            dependency_hash: frame.missing.is_empty().then_some(frame.hash),
            missing_dependencies: frame.missing,
            circular: false,
            transform_error: frame.transform_error,
            cached: false,
        };
        if frame.low != frame.index {
            self.provisional.insert(guid, outcome.clone());
            return outcome;
        }

        let mut members = Vec::new();
        while let Some(member) = self.component_stack.pop() {
            self.open.remove(&member);
            if member == guid {
                break;
            }
            members.push(member);
        }
        let circular = !members.is_empty() || self.in_cycle.contains(&guid);
        if circular {
            tracing::warn!(
                "Circular transform dependency through {guid} ({} assets)",
                members.len() + 1
            );
            self.in_cycle.insert(guid);
            outcome.mark_circular();
        }
        for member in members {
            if let Some(mut pending) = self.provisional.remove(&member) {
                if circular {
                    self.in_cycle.insert(member);
                    pending.mark_circular();
                }
                self.memo.insert(member, pending);
            }
        }
        self.memo.insert(guid, outcome.clone());
        outcome
    }

    /// Dependency hash of `guid` (asset or sub-asset); `None` if unknown
    pub fn dependency_outcome(&mut self, guid: AssetGuid) -> Option<DependencyOutcome> {
        #[cfg(feature = "profiling")]
        let _span = debug_span!("dependency_hash", %guid).entered();

        if let Some(done) = self.memo.get(&guid) {
            return Some(done.clone());
        }
        let root = self.snapshot(guid)?;
        if let Some(done) = self.memo.get(&root.guid) {
            return Some(done.clone());
        }

        let root = self.open_frame(root);
        let mut stack = vec![root];
        while let Some(top) = stack.last() {
            if top.next >= top.snapshot.dependencies.len() {
                let Some(frame) = stack.pop() else {
                    break;
                };
                let low = frame.low;
                let outcome = self.finish(frame);
                match stack.last_mut() {
                    Some(parent) => {
                        parent.low = parent.low.min(low);
                        if let Some(dependency) = parent.pending.take() {
                            parent.apply(&dependency, &outcome);
                        }
                    }
                    None => return Some(outcome),
                }
                continue;
            }

            let top_index = stack.len() - 1;
            let dependency = stack[top_index].snapshot.dependencies[stack[top_index].next].clone();
            stack[top_index].next += 1;

            match self.classify(&dependency) {
                Target::Skip => {}
                Target::UnknownAsset | Target::Unresolvable => {
                    stack[top_index].missing.insert(dependency);
                }
                Target::File(path) => match self.curator.recompute_file_hash(&path) {
                    Ok(hash) => {
                        let frame = &mut stack[top_index];
                        frame.hash = combine_hash(frame.hash, hash);
                    }
                    Err(_) => {
                        stack[top_index].missing.insert(dependency);
                    }
                },
                Target::Asset(target) => {
                    if let Some(index) = self.open.get(&target).copied() {
                        let frame = &mut stack[top_index];
                        if frame.snapshot.guid == target {
                            self.in_cycle.insert(target);
                        }
                        frame.low = frame.low.min(index);
                        frame.missing.insert(dependency);
                    } else if let Some(done) = self.memo.get(&target) {
                        stack[top_index].apply(&dependency, done);
                    } else if let Some(cached) = self.cached_outcome(target) {
                        stack[top_index].apply(&dependency, &cached);
                        self.memo.insert(target, cached);
                    } else {
                        match self.snapshot(target) {
                            Some(snapshot) => {
                                stack[top_index].pending = Some(dependency);
                                let child = self.open_frame(snapshot);
                                stack.push(child);
                            }
                            None => {
                                stack[top_index].missing.insert(dependency);
                            }
                        }
                    }
                }
            }
        }
        None
    }

    /// Reference hash over the full closure of `root`
    pub fn reference_outcome(&mut self, root: &DependencyOutcome) -> ReferenceOutcome {
        #[cfg(feature = "profiling")]
        let _span = debug_span!("reference_hash", guid = %root.guid).entered();

        let mut assets = BTreeSet::new();
        let mut files: BTreeMap<PathBuf, String> = BTreeMap::new();
        let mut missing = BTreeSet::new();
        let mut queue = VecDeque::from([root.guid]);
        assets.insert(root.guid);

        while let Some(guid) = queue.pop_front() {
            let Some(snapshot) = self.snapshot(guid) else {
                continue;
            };
            let edges = snapshot
                .dependencies
                .iter()
                .map(|d| (true, d))
                .chain(snapshot.references.iter().map(|r| (false, r)));
            for (is_transform, dependency) in edges {
                match self.classify(dependency) {
                    Target::Skip => {}
                    Target::Asset(target) => {
                        if assets.insert(target) {
                            queue.push_back(target);
                        }
                    }
                    Target::UnknownAsset | Target::Unresolvable => {
                        if !(guid == root.guid && is_transform) {
                            missing.insert(dependency.clone());
                        }
                    }
                    Target::File(path) => {
                        if !is_transform {
                            files.entry(path).or_insert_with(|| dependency.clone());
                        }
                    }
                }
            }
        }

        let mut hash = root.dependency_hash.unwrap_or_default();
        for guid in assets.iter().filter(|g| **g != root.guid) {
            match self.dependency_outcome(*guid).and_then(|o| o.dependency_hash) {
                Some(h) => hash = combine_hash(hash, h),
                None => {
                    missing.insert(guid.to_string());
                }
            }
        }
        for (path, dependency) in files {
            match self.curator.recompute_file_hash(&path) {
                Ok(h) => hash = combine_hash(hash, h),
                Err(_) => {
                    missing.insert(dependency);
                }
            }
        }

        ReferenceOutcome {
            reference_hash: (root.dependency_hash.is_some() && missing.is_empty()).then_some(hash),
            missing_references: missing,
        }
    }

    /// Outcomes computed (not taken from cache) during this pass
    pub fn computed(&self) -> impl Iterator<Item = &DependencyOutcome> {
        self.memo.values().filter(|o| !o.cached)
    }
}

impl Curator {
    /// Transitive hash of an asset's transform inputs (`include_references ==
    /// false`) or of everything it references (`true`).
    pub fn get_asset_hash(&self, guid: AssetGuid, include_references: bool) -> Result<u64, HashError> {
        let profile = self.active_profile();
        let mut pass = HashPass::new(self, profile);
        let Some(outcome) = pass.dependency_outcome(guid) else {
            return Err(HashError::UnknownAsset(guid));
        };
        let references = include_references.then(|| pass.reference_outcome(&outcome));
        self.commit_hash_pass(&pass, &outcome, references.as_ref());

        let dependency_hash = outcome.to_result()?;
        match references {
            None => Ok(dependency_hash),
            Some(refs) => refs.reference_hash.ok_or(HashError::MissingDependencies {
                dependencies: BTreeSet::new(),
                references: refs.missing_references,
            }),
        }
    }

    /// Shorthand for `get_asset_hash(guid, false)`
    pub fn asset_dependency_hash(&self, guid: AssetGuid) -> Result<u64, HashError> {
        self.get_asset_hash(guid, false)
    }

    /// Shorthand for `get_asset_hash(guid, true)`
    pub fn asset_reference_hash(&self, guid: AssetGuid) -> Result<u64, HashError> {
        self.get_asset_hash(guid, true)
    }

    /// Store what a pass found, skipping assets invalidated in the meantime
    pub(crate) fn commit_hash_pass(
        &self,
        pass: &HashPass<'_>,
        root: &DependencyOutcome,
        references: Option<&ReferenceOutcome>,
    ) {
        let mut guard = self.data.lock();
        let data = &mut *guard;
        for outcome in pass.computed() {
            let failed_state = if outcome.circular {
                Some(TransformState::CircularDependency)
            } else if outcome.dependency_hash.is_none() {
                Some(TransformState::MissingTransformDependency)
            } else {
                None
            };
            let Some(info) = data.registry.get_mut(outcome.guid) else {
                continue;
            };
            if info.last_state_update != outcome.generation {
                continue;
            }
            info.missing_dependencies = outcome.missing_dependencies.clone();
            if let Some(hash) = outcome.dependency_hash {
                info.asset_hash = Some(hash);
            }
            if outcome.guid == root.guid {
                if let Some(refs) = references {
                    info.missing_references = refs.missing_references.clone();
                    info.thumb_hash = refs.reference_hash;
                }
            }
            if let Some(state) = failed_state {
                info.asset_hash = None;
                self.set_transform_state(data, outcome.guid, state);
            }
        }
    }
}
