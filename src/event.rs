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

//! Curator events and subscribers
//!
//! Events are collected under the curator lock and delivered after it has
//! been released, so subscribers may call back into the curator.

use crate::asset_info::ExistenceState;
use crate::error::Result;
use crate::guid::AssetGuid;
use crossbeam::channel::{self, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CuratorEventKind {
    AssetAdded,
    AssetRemoved,
    /// Document content or location changed
    AssetModified,
    /// Transform state changed
    AssetUpdated,
    /// Full rescan finished; listeners should re-query everything
    AssetListReset,
    ActiveProfileChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratorEvent {
    pub kind: CuratorEventKind,
    pub guid: Option<AssetGuid>,
    pub existence: Option<ExistenceState>,
}

impl CuratorEvent {
    pub fn asset(kind: CuratorEventKind, guid: AssetGuid, existence: ExistenceState) -> Self {
        Self {
            kind,
            guid: Some(guid),
            existence: Some(existence),
        }
    }

    pub fn global(kind: CuratorEventKind) -> Self {
        Self {
            kind,
            guid: None,
            existence: None,
        }
    }
}

/// Receives curator events
pub trait CuratorSubscriber: Send + Sync {
    fn on_event(&mut self, event: &CuratorEvent) -> Result<()>;

    fn name(&self) -> &str {
        "UnnamedSubscriber"
    }
}

/// Forwards every event into a crossbeam channel
pub struct ChannelSubscriber {
    sender: Sender<CuratorEvent>,
}

impl ChannelSubscriber {
    /// Subscriber plus the receiving end of its channel
    pub fn channel() -> (Self, Receiver<CuratorEvent>) {
        let (sender, receiver) = channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl CuratorSubscriber for ChannelSubscriber {
    fn on_event(&mut self, event: &CuratorEvent) -> Result<()> {
        // A dropped receiver just means nobody listens anymore.
        let _ = self.sender.send(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "ChannelSubscriber"
    }
}

/// Calls a closure for every event
pub struct CallbackSubscriber {
    callback: Box<dyn FnMut(&CuratorEvent) + Send + Sync>,
}

impl CallbackSubscriber {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&CuratorEvent) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl CuratorSubscriber for CallbackSubscriber {
    fn on_event(&mut self, event: &CuratorEvent) -> Result<()> {
        (self.callback)(event);
        Ok(())
    }

    fn name(&self) -> &str {
        "CallbackSubscriber"
    }
}
