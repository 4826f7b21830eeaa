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

//! Persistent file and document caches
//!
//! Saves the content hash of every known file and the parsed document of
//! every asset. Entries are only trusted while the file's modification time
//! still matches, so a stale cache costs reads, never correctness.

use crate::curator::{CachedDocument, Curator};
use crate::document::DocumentInfo;
use crate::error::{CuratorError, Result};
use crate::file_status::{FileStatus, FileStatusKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Bumped whenever the layout below changes
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    files: Vec<CachedFileEntry>,
    documents: Vec<CachedDocumentEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedFileEntry {
    path: PathBuf,
    timestamp: SystemTime,
    hash: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedDocumentEntry {
    path: PathBuf,
    timestamp: SystemTime,
    hash: u64,
    document: DocumentInfo,
}

impl Curator {
    /// Write the caches to `path`, or the configured cache file
    pub fn save_caches(&self, path: Option<&Path>) -> Result<()> {
        let path = self.cache_path(path)?;
        let cache = {
            let data = self.data.lock();
            let files = data
                .files
                .iter()
                .filter(|(_, status)| status.status == FileStatusKind::Valid)
                .filter_map(|(path, status)| {
                    Some(CachedFileEntry {
                        path: path.clone(),
                        timestamp: status.timestamp?,
                        hash: status.hash,
                    })
                })
                .collect();
            let documents = data
                .registry
                .iter()
                .filter_map(|(_, info)| {
                    let status = data.files.get(&info.absolute_path)?;
                    Some(CachedDocumentEntry {
                        path: info.absolute_path.clone(),
                        timestamp: status.document_timestamp?,
                        hash: status.hash,
                        document: info.document_info.clone(),
                    })
                })
                .collect();
            CacheFile {
                version: CACHE_FORMAT_VERSION,
                files,
                documents,
            }
        };

        let json = serde_json::to_string(&cache).map_err(|e| CuratorError::Serialization(e.to_string()))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let staging = path.with_extension("tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &path)?;
        tracing::debug!(
            "Saved {} file and {} document cache entries to '{}'",
            cache.files.len(),
            cache.documents.len(),
            path.display()
        );
        Ok(())
    }

    /// Load caches written by [`save_caches`](Self::save_caches). Returns the
    /// number of entries restored; a missing or outdated cache restores none.
    pub fn load_caches(&self, path: Option<&Path>) -> Result<usize> {
        let path = self.cache_path(path)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("No asset cache at '{}'", path.display());
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        };
        let cache: CacheFile = serde_json::from_str(&json)?;
        if cache.version != CACHE_FORMAT_VERSION {
            tracing::warn!(
                "Ignoring asset cache '{}' with version {} (expected {CACHE_FORMAT_VERSION})",
                path.display(),
                cache.version
            );
            return Ok(0);
        }

        let restored = cache.files.len() + cache.documents.len();
        let mut data = self.data.lock();
        for entry in cache.files {
            let status = FileStatus {
                timestamp: Some(entry.timestamp),
                hash: entry.hash,
                status: FileStatusKind::Valid,
                ..Default::default()
            };
            data.cached_files.insert(entry.path, status);
        }
        for entry in cache.documents {
            let cached = CachedDocument {
                timestamp: entry.timestamp,
                hash: entry.hash,
                document: entry.document,
            };
            data.cached_documents.insert(entry.path, cached);
        }
        tracing::debug!("Restored {restored} cache entries from '{}'", path.display());
        Ok(restored)
    }

    fn cache_path(&self, path: Option<&Path>) -> Result<PathBuf> {
        path.map(Path::to_path_buf)
            .or_else(|| self.config.cache_file.clone())
            .ok_or_else(|| CuratorError::Config("no cache file configured".into()))
    }
}
