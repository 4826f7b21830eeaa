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

//! Convenient re-exports of commonly used types.
//!
//! ```
//! use asset_curator::prelude::*;
//! ```

pub use crate::asset_info::{ExistenceState, TransformState};
pub use crate::config::{AssetProfile, CuratorConfig};
pub use crate::curator::Curator;
pub use crate::document::DocumentInfo;
pub use crate::error::{CuratorError, HashError, Result};
pub use crate::event::{CuratorEvent, CuratorEventKind, CuratorSubscriber};
pub use crate::guid::AssetGuid;
pub use crate::manager::{AssetTypeManager, JsonAssetManager, ManagerRegistry};
pub use crate::transform_state::{TransformFlags, TransformOutcome};
pub use crate::update_task::UpdateWorkers;
