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

//! Full rescan of the data directories

use crate::curator::Curator;
use crate::event::{CuratorEvent, CuratorEventKind};
use crate::file_status::FileStatusKind;
use crate::paths::normalize_path;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "profiling")]
use tracing::info_span;

/// Result of [`Curator::check_file_system`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files: usize,
    pub assets: usize,
    /// File entries that vanished since the last scan
    pub removed: usize,
    pub elapsed: Duration,
}

impl Curator {
    /// Walk every data directory, pick up added, modified and removed files
    /// and reset every transform state.
    pub fn check_file_system(&self) -> ScanSummary {
        #[cfg(feature = "profiling")]
        let _span = info_span!("check_file_system").entered();

        let started = Instant::now();
        let files = self.collect_data_files();

        {
            let mut guard = self.data.lock();
            let data = &mut *guard;
            for (_, status) in data.files.iter_mut() {
                status.status = FileStatusKind::Unknown;
            }
            for guid in data.registry.guids() {
                self.invalidate_transform_state(data, guid);
            }
        }

        let handle = |path: &PathBuf| {
            if let Err(err) = self.handle_file_change(path) {
                tracing::warn!("Failed to process '{}': {err}", path.display());
            }
        };
        #[cfg(feature = "parallel")]
        files.par_iter().for_each(handle);
        #[cfg(not(feature = "parallel"))]
        files.iter().for_each(handle);

        let (removed, assets) = {
            let mut guard = self.data.lock();
            let data = &mut *guard;
            let stale = data.files.paths_with_status(FileStatusKind::Unknown);
            for path in &stale {
                self.handle_file_removed(data, path);
                data.files.remove(path);
            }
            (stale.len(), data.registry.len())
        };

        let summary = ScanSummary {
            files: files.len(),
            assets,
            removed,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Scanned {} files ({} assets, {} removed) in {:?}",
            summary.files,
            summary.assets,
            summary.removed,
            summary.elapsed
        );
        self.broadcast(&[CuratorEvent::global(CuratorEventKind::AssetListReset)]);
        summary
    }

    fn collect_data_files(&self) -> Vec<PathBuf> {
        let cache_folder = self.config.asset_cache_folder.as_str();
        let mut files = Vec::new();
        for dir in &self.config.data_directories {
            let walker = WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != cache_folder);
            for entry in walker {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => files.push(normalize_path(entry.path())),
                    Ok(_) => {}
                    Err(err) => tracing::warn!("Failed to walk '{}': {err}", dir.display()),
                }
            }
        }
        files.sort();
        files
    }
}
