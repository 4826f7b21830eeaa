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

//! Error types

use crate::asset_info::TransformState;
use crate::guid::AssetGuid;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Curator error type
#[derive(Debug, Clone)]
pub enum CuratorError {
    /// File could not be stat'ed or does not exist
    FileNotFound { path: PathBuf },

    /// File exists but could not be opened for reading
    FileLocked { path: PathBuf, message: String },

    /// IO error (file operations, etc.)
    Io(String),

    /// Asset document could not be parsed by its manager
    Parse { path: PathBuf, message: String },

    /// No asset type manager is registered for the file extension
    NoManager { path: PathBuf },

    /// Path is not located below any configured data directory
    NotInDataDirectory { path: PathBuf },

    /// GUID is not a known asset or sub-asset
    UnknownAsset(AssetGuid),

    /// Two live documents declare the same GUID and patching was already attempted
    GuidCollision { path: PathBuf, other: PathBuf },

    /// Rewriting a document with a fresh GUID failed
    GuidPatchFailed { path: PathBuf, message: String },

    /// Dependency hash could not be computed
    Hash(HashError),

    /// Asset type manager reported a transform failure
    TransformFailed { guid: AssetGuid, message: String },

    /// Asset cannot be transformed in its current state
    TransformBlocked { guid: AssetGuid, state: TransformState },

    /// Manager does not produce thumbnails
    ThumbnailUnsupported(AssetGuid),

    /// Serialization error
    Serialization(String),

    /// Deserialization error
    Deserialization(String),

    /// Invalid configuration
    Config(String),
}

/// Reasons a dependency hash cannot be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Hash was requested for a GUID the curator does not know
    UnknownAsset(AssetGuid),

    /// Some inputs could not be resolved or hashed
    MissingDependencies {
        dependencies: BTreeSet<String>,
        references: BTreeSet<String>,
    },

    /// Asset is part of a transform-dependency cycle
    CircularDependency { guid: AssetGuid },
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::UnknownAsset(guid) => write!(f, "unknown asset {guid}"),
            HashError::MissingDependencies {
                dependencies,
                references,
            } => write!(
                f,
                "missing {} transform dependencies and {} runtime references",
                dependencies.len(),
                references.len()
            ),
            HashError::CircularDependency { guid } => {
                write!(f, "asset {guid} is part of a transform dependency cycle")
            }
        }
    }
}

impl fmt::Display for CuratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CuratorError::FileNotFound { path } => {
                write!(f, "File not found: {}", path.display())
            }
            CuratorError::FileLocked { path, message } => {
                write!(f, "Failed to open '{}': {message}", path.display())
            }
            CuratorError::Io(msg) => write!(f, "IO error: {msg}"),
            CuratorError::Parse { path, message } => {
                write!(f, "Failed to read asset document '{}': {message}", path.display())
            }
            CuratorError::NoManager { path } => {
                write!(f, "No asset type manager for '{}'", path.display())
            }
            CuratorError::NotInDataDirectory { path } => {
                write!(f, "'{}' is not inside a data directory", path.display())
            }
            CuratorError::UnknownAsset(guid) => write!(f, "Unknown asset: {guid}"),
            CuratorError::GuidCollision { path, other } => write!(
                f,
                "GUID collision between '{}' and '{}'",
                path.display(),
                other.display()
            ),
            CuratorError::GuidPatchFailed { path, message } => {
                write!(f, "Failed to patch GUID of '{}': {message}", path.display())
            }
            CuratorError::Hash(err) => write!(f, "Hash error: {err}"),
            CuratorError::TransformFailed { guid, message } => {
                write!(f, "Transform of {guid} failed: {message}")
            }
            CuratorError::TransformBlocked { guid, state } => {
                write!(f, "Asset {guid} cannot be transformed while {state:?}")
            }
            CuratorError::ThumbnailUnsupported(guid) => {
                write!(f, "Asset {guid} does not support thumbnails")
            }
            CuratorError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            CuratorError::Deserialization(msg) => write!(f, "Deserialization error: {msg}"),
            CuratorError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for HashError {}

impl std::error::Error for CuratorError {}

impl From<std::io::Error> for CuratorError {
    fn from(err: std::io::Error) -> Self {
        CuratorError::Io(err.to_string())
    }
}

impl From<HashError> for CuratorError {
    fn from(err: HashError) -> Self {
        CuratorError::Hash(err)
    }
}

impl From<serde_json::Error> for CuratorError {
    fn from(err: serde_json::Error) -> Self {
        CuratorError::Deserialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CuratorError>;
