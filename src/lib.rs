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

//! Asset Curator - incremental asset tracking for content pipelines
//!
//! Tracks asset documents below a set of data directories, keeps an inverse
//! dependency index, computes transitive dependency and reference hashes and
//! derives a transform state for every asset. All state lives behind a single
//! lock in [`Curator`]; file I/O happens outside of it.

pub mod asset_header;
pub mod asset_info;
pub mod cache;
pub mod config;
pub mod curator;
pub mod dependency_index;
pub mod document;
pub mod error;
pub mod event;
pub mod file_status;
pub mod guid;
mod hash_engine;
pub mod hasher;
#[cfg(feature = "profiling")]
pub mod logging;
pub mod lookup;
pub mod manager;
pub mod paths;
pub mod prelude;
pub mod registry;
pub mod scan;
pub mod thumbnail;
pub mod transform_state;
pub mod update_task;
mod updates;

pub use asset_header::{is_output_up_to_date, AssetFileHeader};
pub use asset_info::{AssetInfo, ExistenceState, SubAssetInfo, TransformState};
pub use config::{AssetProfile, CuratorConfig};
pub use curator::{Curator, LockedAssets, LockedSubAsset};
pub use dependency_index::DependencyIndex;
pub use document::{DocumentInfo, SubAssetData};
pub use error::*;
pub use event::*;
pub use file_status::{FileStatus, FileStatusKind};
pub use guid::AssetGuid;
pub use hasher::{combine_hash, hash_bytes, hash_reader, ContentHasher};
pub use lookup::TransitiveHull;
pub use manager::{
    AssetTypeManager, JsonAssetManager, ManagerRegistry, ThumbnailContext, TransformContext,
};
pub use registry::{AssetKey, AssetRegistry, SubAssetKey};
pub use scan::ScanSummary;
pub use thumbnail::{is_thumbnail_up_to_date, ThumbnailInfo};
pub use transform_state::{
    AssetStatus, TransformFlags, TransformOutcome, TransformStats, TransformSummary,
};
pub use update_task::UpdateWorkers;
