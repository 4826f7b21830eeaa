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

//! Asset GUIDs

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace for name-based GUIDs derived from file paths
const STABLE_NAMESPACE: Uuid = Uuid::from_u128(0x5a1c_4b2e_9f0d_4e37_8c61_2d7a_b3e9_0f14);

/// 128-bit globally unique asset identifier
///
/// Every asset document declares one; sub-assets carry their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct AssetGuid(Uuid);

impl AssetGuid {
    /// The nil GUID, never assigned to a real asset
    pub const NIL: AssetGuid = AssetGuid(Uuid::nil());

    /// Generate a random GUID
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build from raw 128-bit value
    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    #[inline]
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse any textual UUID form (hyphenated, simple, braced, urn)
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() < 32 {
            return None;
        }
        Uuid::try_parse(text).ok().map(Self)
    }

    /// True when `text` names a GUID rather than a file path
    #[inline]
    pub fn is_guid_string(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    /// Deterministic GUID for a string (same input, same GUID)
    pub fn stable_for_string(text: &str) -> Self {
        Self(Uuid::new_v5(&STABLE_NAMESPACE, text.as_bytes()))
    }

    /// Mix `seed` into this GUID by adding both 64-bit halves component-wise
    pub fn combine_with_seed(&self, seed: &AssetGuid) -> Self {
        let (high, low) = self.0.as_u64_pair();
        let (seed_high, seed_low) = seed.0.as_u64_pair();
        Self(Uuid::from_u64_pair(
            high.wrapping_add(seed_high),
            low.wrapping_add(seed_low),
        ))
    }
}

impl fmt::Display for AssetGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for AssetGuid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}
