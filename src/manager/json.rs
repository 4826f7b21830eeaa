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

//! Built-in manager for assets whose document is a JSON object
//!
//! ```json
//! {
//!   "guid": "6f1d0c3e-5b1a-4a57-9a53-0b6f3f1d2a10",
//!   "type": "Material",
//!   "settings": { "roughness": 0.5 },
//!   "dependencies": ["Textures/albedo.png"],
//!   "references": ["{1e0a...}"],
//!   "outputs": ["lowres"],
//!   "sub_assets": [{ "guid": "...", "name": "Layer0" }]
//! }
//! ```
//!
//! `settings_hash` may be given explicitly, otherwise the `settings` value is
//! hashed. Transforming writes the output header followed by the document.

use super::{AssetTypeManager, ThumbnailContext, TransformContext};
use crate::document::{DocumentInfo, SubAssetData};
use crate::error::{CuratorError, Result};
use crate::guid::AssetGuid;
use crate::hasher::hash_bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct JsonDocumentHeader {
    guid: AssetGuid,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settings_hash: Option<u64>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    settings: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    dependencies: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    references: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    outputs: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sub_assets: Vec<SubAssetData>,
}

/// Manager for JSON asset documents
pub struct JsonAssetManager {
    type_name: String,
    extensions: Vec<&'static str>,
    thumbnails: bool,
    version: u16,
}

impl JsonAssetManager {
    pub fn new(type_name: impl Into<String>, extensions: &[&'static str]) -> Self {
        Self {
            type_name: type_name.into(),
            extensions: extensions.to_vec(),
            thumbnails: false,
            version: 1,
        }
    }

    /// Produce thumbnails for this type
    pub fn with_thumbnails(mut self, enabled: bool) -> Self {
        self.thumbnails = enabled;
        self
    }

    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    /// Serialize a document header in the format this manager reads
    pub fn document_to_string(info: &DocumentInfo) -> Result<String> {
        let header = JsonDocumentHeader {
            guid: info.guid,
            asset_type: (!info.asset_type.is_empty()).then(|| info.asset_type.clone()),
            settings_hash: Some(info.settings_hash),
            settings: serde_json::Value::Null,
            dependencies: info.transform_dependencies.clone(),
            references: info.runtime_references.clone(),
            outputs: info.outputs.clone(),
            sub_assets: info.sub_assets.clone(),
        };
        serde_json::to_string_pretty(&header).map_err(|e| CuratorError::Serialization(e.to_string()))
    }
}

impl AssetTypeManager for JsonAssetManager {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn extensions(&self) -> &[&str] {
        &self.extensions
    }

    fn document_version(&self) -> u16 {
        self.version
    }

    fn read_document_info(&self, path: &Path, bytes: &[u8]) -> Result<DocumentInfo> {
        let header: JsonDocumentHeader =
            serde_json::from_slice(bytes).map_err(|e| CuratorError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let settings_hash = match header.settings_hash {
            Some(hash) => hash,
            None if header.settings.is_null() => 0,
            None => hash_bytes(&serde_json::to_vec(&header.settings)?),
        };
        Ok(DocumentInfo {
            guid: header.guid,
            asset_type: header.asset_type.unwrap_or_else(|| self.type_name.clone()),
            settings_hash,
            transform_dependencies: header.dependencies,
            runtime_references: header.references,
            outputs: header.outputs,
            sub_assets: header.sub_assets,
        })
    }

    fn transform_asset(&self, ctx: &TransformContext<'_>) -> Result<()> {
        let source = fs::read(ctx.asset_path)?;
        if let Some(dir) = ctx.output_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = fs::File::create(&ctx.output_path)?;
        ctx.header.write(&mut file)?;
        file.write_all(&source)?;
        Ok(())
    }

    fn supports_thumbnail(&self, _info: &DocumentInfo) -> bool {
        self.thumbnails
    }

    fn create_thumbnail(&self, ctx: &ThumbnailContext<'_>) -> Result<Vec<u8>> {
        if !self.thumbnails {
            return Err(CuratorError::ThumbnailUnsupported(ctx.document.guid));
        }
        let mut image = vec![0xFF, 0xD8];
        image.extend_from_slice(ctx.document.asset_type.as_bytes());
        image.extend_from_slice(&[0xFF, 0xD9]);
        Ok(image)
    }

    fn patch_document_guid(&self, path: &Path, new_guid: AssetGuid) -> Result<()> {
        let bytes = fs::read(path)?;
        let mut value: serde_json::Value = serde_json::from_slice(&bytes)?;
        let object = value.as_object_mut().ok_or_else(|| CuratorError::Parse {
            path: path.to_path_buf(),
            message: "document is not a JSON object".into(),
        })?;
        object.insert("guid".into(), serde_json::Value::String(new_guid.to_string()));
        let text =
            serde_json::to_string_pretty(&value).map_err(|e| CuratorError::Serialization(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }
}
