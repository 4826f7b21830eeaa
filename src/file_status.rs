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

//! Per-file status cache
//!
//! Every file the curator has looked at (asset documents, raw inputs, outputs)
//! gets a [`FileStatus`]. The content hash is only trusted while the stored
//! timestamp equals the file's current modification time.

use crate::curator::Curator;
use crate::error::{CuratorError, Result};
use crate::guid::AssetGuid;
use crate::hasher::hash_reader;
use crate::paths::normalize_path;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileStatusKind {
    /// Not confirmed by the last scan
    #[default]
    Unknown,
    Valid,
    /// Exists but could not be opened
    FileLocked,
    FileNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileStatus {
    /// Modification time the hash was computed for
    pub timestamp: Option<SystemTime>,
    pub hash: u64,
    /// Asset declared by this file, if it is an asset document
    pub asset_guid: Option<AssetGuid>,
    /// Modification time the document header was last parsed at
    pub document_timestamp: Option<SystemTime>,
    pub status: FileStatusKind,
}

impl FileStatus {
    /// Cached hash, if it is valid for `modified`
    #[inline]
    pub fn hash_for(&self, modified: SystemTime) -> Option<u64> {
        (self.timestamp == Some(modified)).then_some(self.hash)
    }

    /// Forget the hash (and parse time) so the next access re-reads the file
    pub fn invalidate_timestamp(&mut self) {
        self.timestamp = None;
        self.document_timestamp = None;
        self.hash = 0;
    }
}

/// Absolute path -> status
#[derive(Debug, Default, Clone)]
pub struct FileStatusTable {
    files: AHashMap<PathBuf, FileStatus>,
}

impl FileStatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&FileStatus> {
        self.files.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut FileStatus> {
        self.files.get_mut(path)
    }

    /// Status for `path`, inserted as unknown if missing
    pub fn entry(&mut self, path: &Path) -> &mut FileStatus {
        self.files.entry(path.to_path_buf()).or_default()
    }

    pub fn insert(&mut self, path: PathBuf, status: FileStatus) -> Option<FileStatus> {
        self.files.insert(path, status)
    }

    pub fn remove(&mut self, path: &Path) -> Option<FileStatus> {
        self.files.remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileStatus)> {
        self.files.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PathBuf, &mut FileStatus)> {
        self.files.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths currently in `status`
    pub fn paths_with_status(&self, status: FileStatusKind) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|(_, s)| s.status == status)
            .map(|(p, _)| p.clone())
            .collect()
    }
}

pub(crate) fn modification_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl Curator {
    /// Content hash of `path`, reading the file only when its timestamp changed.
    ///
    /// Stat and read happen without the curator lock; the result is written
    /// back only if nobody else updated the entry in the meantime.
    pub fn recompute_file_hash(&self, path: &Path) -> Result<u64> {
        let path = normalize_path(path);
        let Some(modified) = modification_time(&path) else {
            let mut data = self.data.lock();
            let entry = data.files.entry(&path);
            entry.invalidate_timestamp();
            entry.status = FileStatusKind::FileNotFound;
            return Err(CuratorError::FileNotFound { path });
        };

        let previous = {
            let mut data = self.data.lock();
            if let Some(hash) = data.files.get(&path).and_then(|f| f.hash_for(modified)) {
                return Ok(hash);
            }
            if let Some(cached) = data.cached_files.get(&path).cloned() {
                if let Some(hash) = cached.hash_for(modified) {
                    let entry = data.files.entry(&path);
                    entry.timestamp = cached.timestamp;
                    entry.hash = hash;
                    entry.status = FileStatusKind::Valid;
                    return Ok(hash);
                }
            }
            data.files.get(&path).and_then(|f| f.timestamp)
        };

        let hash = match self.hash_file_contents(&path, None) {
            Ok(hash) => hash,
            Err(err) => {
                let mut data = self.data.lock();
                let entry = data.files.entry(&path);
                entry.invalidate_timestamp();
                entry.status = FileStatusKind::FileLocked;
                return Err(err);
            }
        };

        let mut data = self.data.lock();
        let entry = data.files.entry(&path);
        if entry.timestamp == previous {
            entry.timestamp = Some(modified);
            entry.hash = hash;
            entry.status = FileStatusKind::Valid;
        }
        Ok(hash)
    }

    /// Stream a file through the hasher, optionally keeping a copy of the bytes
    pub(crate) fn hash_file_contents(&self, path: &Path, tee: Option<&mut dyn Write>) -> Result<u64> {
        self.file_reads.fetch_add(1, Ordering::Relaxed);
        let file = fs::File::open(path).map_err(|e| CuratorError::FileLocked {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        hash_reader(file, tee).map_err(|e| CuratorError::FileLocked {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Number of file content reads performed so far
    pub fn file_read_count(&self) -> u64 {
        self.file_reads.load(Ordering::Relaxed)
    }

    pub fn file_status(&self, path: &Path) -> Option<FileStatus> {
        self.data.lock().files.get(&normalize_path(path)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn hash_only_valid_for_matching_timestamp() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let status = FileStatus {
            timestamp: Some(t),
            hash: 7,
            ..Default::default()
        };
        assert_eq!(status.hash_for(t), Some(7));
        assert_eq!(status.hash_for(t + Duration::from_secs(1)), None);
    }

    #[test]
    fn table_tracks_status() {
        let mut table = FileStatusTable::new();
        table.entry(Path::new("/a")).status = FileStatusKind::Valid;
        table.entry(Path::new("/b"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.paths_with_status(FileStatusKind::Unknown), vec![PathBuf::from("/b")]);
        table.remove(Path::new("/b"));
        assert!(!table.contains(Path::new("/b")));
    }
}
