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

//! Parsed asset document header

use crate::guid::AssetGuid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Header information every asset document provides
///
/// Dependency strings are either GUID strings or file paths (absolute or
/// relative to a data directory). Sets are ordered so hashing walks them in
/// a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub guid: AssetGuid,
    /// Asset type name, also used for the main sub-asset
    pub asset_type: String,
    /// Hash of the document's own settings
    pub settings_hash: u64,
    /// Inputs that affect the transformed output
    pub transform_dependencies: BTreeSet<String>,
    /// Assets needed at runtime or by the thumbnail
    pub runtime_references: BTreeSet<String>,
    /// Additional output tags; the main output has the empty tag
    pub outputs: BTreeSet<String>,
    /// Sub-assets the document declares
    #[serde(default)]
    pub sub_assets: Vec<SubAssetData>,
}

impl DocumentInfo {
    pub fn new(guid: AssetGuid, asset_type: impl Into<String>) -> Self {
        Self {
            guid,
            asset_type: asset_type.into(),
            settings_hash: 0,
            transform_dependencies: BTreeSet::new(),
            runtime_references: BTreeSet::new(),
            outputs: BTreeSet::new(),
            sub_assets: Vec::new(),
        }
    }

    pub fn with_settings_hash(mut self, hash: u64) -> Self {
        self.settings_hash = hash;
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.transform_dependencies.insert(dependency.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.runtime_references.insert(reference.into());
        self
    }

    pub fn with_output(mut self, tag: impl Into<String>) -> Self {
        self.outputs.insert(tag.into());
        self
    }

    pub fn with_sub_asset(mut self, sub_asset: SubAssetData) -> Self {
        self.sub_assets.push(sub_asset);
        self
    }

    /// Output tags including the main (empty) tag
    pub fn output_tags(&self) -> impl Iterator<Item = &str> {
        std::iter::once("").chain(self.outputs.iter().map(String::as_str))
    }

    /// Runtime references that are not also transform dependencies
    pub fn pure_references(&self) -> impl Iterator<Item = &String> {
        self.runtime_references
            .iter()
            .filter(|r| !self.transform_dependencies.contains(*r))
    }
}

/// Sub-asset description produced by an asset type manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAssetData {
    pub guid: AssetGuid,
    pub name: String,
    #[serde(default)]
    pub sub_asset_type: String,
}

impl SubAssetData {
    pub fn new(guid: AssetGuid, name: impl Into<String>, sub_asset_type: impl Into<String>) -> Self {
        Self {
            guid,
            name: name.into(),
            sub_asset_type: sub_asset_type.into(),
        }
    }
}
