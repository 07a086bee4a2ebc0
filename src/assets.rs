// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Named audio assets. Where they come from (archives, a directory of
//! extracted lumps) is up to the store; missing assets are simply absent.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

/// Extension used for extracted lumps in a directory store.
const LUMP_EXTENSION: &str = "lmp";

/// Looks up raw asset bytes by name. Names are case-insensitive.
pub trait AssetStore: Send + Sync {
    /// Returns the asset's bytes, or `None` if it doesn't exist.
    fn read(&self, name: &str) -> Option<Arc<[u8]>>;

    /// All asset names in the store, upper-cased.
    fn names(&self) -> Vec<String>;
}

/// Assets held in memory.
#[derive(Default, Clone)]
pub struct MemoryAssets {
    assets: HashMap<String, Arc<[u8]>>,
}

impl MemoryAssets {
    pub fn new() -> MemoryAssets {
        MemoryAssets::default()
    }

    pub fn insert(&mut self, name: &str, data: impl Into<Arc<[u8]>>) {
        self.assets.insert(name.to_uppercase(), data.into());
    }
}

impl AssetStore for MemoryAssets {
    fn read(&self, name: &str) -> Option<Arc<[u8]>> {
        self.assets.get(&name.to_uppercase()).cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.assets.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Assets stored as individual files in a directory, one file per lump. A
/// lump named `DSPISTOL` is read from `DSPISTOL.lmp` or `dspistol.lmp`.
pub struct DirectoryAssets {
    path: PathBuf,
}

impl DirectoryAssets {
    pub fn new(path: &Path) -> Result<DirectoryAssets, io::Error> {
        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", path.display()),
            ));
        }
        Ok(DirectoryAssets {
            path: path.to_path_buf(),
        })
    }

    fn candidates(&self, name: &str) -> [PathBuf; 2] {
        [
            self.path
                .join(format!("{}.{}", name.to_uppercase(), LUMP_EXTENSION)),
            self.path
                .join(format!("{}.{}", name.to_lowercase(), LUMP_EXTENSION)),
        ]
    }
}

impl AssetStore for DirectoryAssets {
    fn read(&self, name: &str) -> Option<Arc<[u8]>> {
        for path in self.candidates(name) {
            match fs::read(&path) {
                Ok(data) => return Some(data.into()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = ?path, err = %e, "Unable to read asset");
                    return None;
                }
            }
        }
        debug!(name, "Asset not found");
        None
    }

    fn names(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = ?self.path, err = %e, "Unable to list assets");
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(LUMP_EXTENSION))
            })
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(|stem| stem.to_uppercase())
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
