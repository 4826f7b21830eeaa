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

//! Background recomputation of invalidated transform states
//!
//! Invalidation only queues assets. The queue is drained either
//! synchronously with [`Curator::process_pending_updates`] or by a pool of
//! [`UpdateWorkers`]. An asset is never updated by two workers at once.

use crate::asset_info::TransformState;
use crate::curator::Curator;
use crate::guid::AssetGuid;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How long an idle worker sleeps before re-checking the queue
const IDLE_POLL: Duration = Duration::from_millis(50);

impl Curator {
    /// Claim the next stale asset, skipping ones another worker holds
    pub fn get_next_asset_to_update(&self) -> Option<(AssetGuid, PathBuf)> {
        let mut guard = self.data.lock();
        let data = &mut *guard;
        let mut busy = Vec::new();
        let mut next = None;
        while let Some(guid) = data.update_queue.pop_front() {
            if !data.queued.contains(&guid) {
                continue;
            }
            if data.updating.contains(&guid) {
                busy.push(guid);
                continue;
            }
            data.queued.remove(&guid);
            let Some(info) = data.registry.get(guid) else {
                continue;
            };
            data.updating.insert(guid);
            next = Some((guid, info.absolute_path.clone()));
            break;
        }
        data.update_queue.extend(busy);
        next
    }

    /// Update one queued asset. Returns `false` when nothing was queued.
    pub fn run_next_update(&self) -> bool {
        match self.get_next_asset_to_update() {
            Some((guid, path)) => {
                self.update_asset(guid, &path);
                true
            }
            None => false,
        }
    }

    fn update_asset(&self, guid: AssetGuid, path: &Path) {
        let result = self
            .ensure_updated(path)
            .and_then(|_| self.is_asset_up_to_date(guid, None, false));
        match result {
            Ok(status) if status.state != TransformState::UpToDate => {
                tracing::trace!("{guid} is {:?}", status.state);
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("Update of {guid} failed: {err}"),
        }
        self.data.lock().updating.remove(&guid);
    }

    /// Drain the update queue on the calling thread (fanned out over rayon
    /// when the `parallel` feature is on). Returns the number of updates.
    pub fn process_pending_updates(&self) -> usize {
        let mut processed = 0;
        loop {
            let mut batch = Vec::new();
            while let Some(next) = self.get_next_asset_to_update() {
                batch.push(next);
            }
            if batch.is_empty() {
                break;
            }
            processed += batch.len();

            #[cfg(feature = "parallel")]
            batch
                .par_iter()
                .for_each(|(guid, path)| self.update_asset(*guid, path));

            #[cfg(not(feature = "parallel"))]
            for (guid, path) in &batch {
                self.update_asset(*guid, path);
            }
        }
        processed
    }

    /// Number of assets queued or being updated
    pub fn pending_updates(&self) -> usize {
        let data = self.data.lock();
        data.queued.len() + data.updating.len()
    }

    /// Forget all queued work; the states stay `Unknown` until requested
    pub fn clear_update_queue(&self) {
        let mut data = self.data.lock();
        data.update_queue.clear();
        data.queued.clear();
    }
}

/// Worker threads draining the curator's update queue
pub struct UpdateWorkers {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl UpdateWorkers {
    /// Spawn `threads` workers (the configured count when 0)
    pub fn start(curator: Arc<Curator>, threads: usize) -> Self {
        let threads = if threads == 0 {
            curator.config().update_threads.max(1)
        } else {
            threads
        };
        let running = Arc::new(AtomicBool::new(true));
        let handles = (0..threads)
            .map(|index| {
                let curator = curator.clone();
                let running = running.clone();
                thread::Builder::new()
                    .name(format!("curator-update-{index}"))
                    .spawn(move || worker_loop(&curator, &running))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(err) => {
                    tracing::error!("Failed to spawn update worker: {err}");
                    None
                }
            })
            .collect::<Vec<_>>();
        tracing::debug!("Started {} update workers", handles.len());
        Self { running, handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop and join all workers
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Update worker panicked");
            }
        }
    }
}

impl Drop for UpdateWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(curator: &Curator, running: &AtomicBool) {
    while running.load(Ordering::Acquire) {
        if !curator.run_next_update() {
            let _ = curator.wake_rx.recv_timeout(IDLE_POLL);
        }
    }
}
