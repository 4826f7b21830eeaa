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

//! Tracing subscriber setup for binaries and profiling runs

use crate::error::{CuratorError, Result};
use std::fs::File;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn env_filter(default: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .map_err(|e| CuratorError::Config(format!("invalid log filter '{default}': {e}")))
}

/// Log to stderr. `RUST_LOG` overrides `default_filter`.
pub fn init_logging(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter)?)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| CuratorError::Config(e.to_string()))
}

/// Log JSON lines to `path` through a non-blocking writer. Keep the guard
/// alive until exit or buffered lines are lost.
pub fn init_file_logging(path: &Path, default_filter: &str) -> Result<WorkerGuard> {
    let file = File::create(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_filter)?)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| CuratorError::Config(e.to_string()))?;
    Ok(guard)
}
