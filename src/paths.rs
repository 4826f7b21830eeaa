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

//! Path helpers shared by the curator

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path (`.` and `..` removed, no filesystem access)
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Longest data directory containing `path`
pub fn find_data_directory<'a>(data_directories: &'a [PathBuf], path: &Path) -> Option<&'a Path> {
    data_directories
        .iter()
        .filter(|dir| path.starts_with(dir))
        .max_by_key(|dir| dir.components().count())
        .map(PathBuf::as_path)
}

/// Resolve a dependency string that names a file.
///
/// Absolute paths are taken as they are. Relative paths are tried against
/// every data directory (and against the data directories' parent, so
/// `Data/tex.png` works too); the first existing candidate wins. When none
/// exists the candidate below the first data directory is returned so the
/// missing file can still be tracked.
pub fn resolve_in_data_directories(data_directories: &[PathBuf], relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.is_absolute() {
        return Some(normalize_path(relative));
    }
    let mut candidates = Vec::with_capacity(data_directories.len() * 2);
    for dir in data_directories {
        candidates.push(normalize_path(&dir.join(relative)));
        if let (Some(parent), Some(first)) = (dir.parent(), relative.components().next()) {
            if dir.file_name() == Some(first.as_os_str()) {
                candidates.push(normalize_path(&parent.join(relative)));
            }
        }
    }
    candidates
        .iter()
        .find(|candidate| candidate.exists())
        .or_else(|| candidates.first())
        .cloned()
}

/// True when any component of `path` below `root` equals `folder`
pub fn is_inside_folder(root: Option<&Path>, path: &Path, folder: &str) -> bool {
    let relative = root.and_then(|r| path.strip_prefix(r).ok()).unwrap_or(path);
    relative
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == folder))
}

/// Lower-case extension without the dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
