// Copyright 2025 Anapaya Systems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! File-backed storage: one JSON document, replaced atomically on every
//! mutation.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::{
    model::{Allocation, Pool},
    storage::{dto::StateDocumentDto, Storage, StorageError},
};

/// Directory for the state document when no path is configured, relative to
/// the current working directory.
pub const DEFAULT_STATE_DIR: &str = ".ipam";
/// Filename of the state document inside [DEFAULT_STATE_DIR].
pub const DEFAULT_STATE_FILE: &str = "ipam-storage.json";

const TEMP_SUFFIX: &str = ".tmp";

/// The in-memory mirror of the persisted dataset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct StoreState {
    pub(crate) pools: BTreeMap<String, Pool>,
    pub(crate) allocations: BTreeMap<String, Allocation>,
}

/// Stores the whole dataset as a single JSON document on disk.
///
/// Reads are served from an in-memory mirror under a shared lock. Mutations
/// take the exclusive lock, apply the change to a scratch copy, serialize it
/// to a sibling temporary file and atomically rename it over the target; the
/// scratch copy only becomes visible after the rename succeeded, so neither
/// memory nor disk ever exposes a partially-applied mutation.
pub struct FileStorage {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl FileStorage {
    /// Opens the state document at `path`, or at the default location when
    /// `path` is `None`.
    ///
    /// A missing file means "start empty"; any other read, parse or record
    /// conversion failure is fatal to construction.
    pub fn open(path: Option<PathBuf>) -> Result<Self, StorageError> {
        let path = match path {
            Some(path) => path,
            None => default_path()?,
        };

        let temp = temp_path(&path);
        if temp.exists() {
            // Leftover from an interrupted write; the target document is
            // still the last successfully renamed one.
            tracing::warn!(path = %temp.display(), "removing stale temporary state file");
            let _ = fs::remove_file(&temp);
        }

        let state = match fs::read(&path) {
            Ok(bytes) => {
                let document: StateDocumentDto = serde_json::from_slice(&bytes)?;
                StoreState::try_from(document).map_err(StorageError::InvalidDocument)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Serializes `state` and atomically replaces the document on disk.
    fn persist(&self, state: &StoreState) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let document = StateDocumentDto::from(state);
        let bytes = serde_json::to_vec_pretty(&document)?;

        let temp = temp_path(&self.path);
        fs::write(&temp, &bytes)?;
        if let Err(err) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }
        Ok(())
    }

    /// Applies `mutation` to a scratch copy of the state and commits it to
    /// memory only after it durably reached disk.
    fn mutate<F>(&self, mutation: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut StoreState) -> Result<(), StorageError>,
    {
        let mut state = self.state.write().expect("no fail");
        let mut scratch = state.clone();
        mutation(&mut scratch)?;
        self.persist(&scratch)?;
        *state = scratch;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_pool(&self, name: &str) -> Result<Pool, StorageError> {
        let state = self.state.read().expect("no fail");
        state.pools.get(name).cloned().ok_or(StorageError::NotFound)
    }

    fn list_pools(&self) -> Result<Vec<Pool>, StorageError> {
        let state = self.state.read().expect("no fail");
        Ok(state.pools.values().cloned().collect())
    }

    fn save_pool(&self, pool: &Pool) -> Result<(), StorageError> {
        self.mutate(|state| {
            state.pools.insert(pool.name().to_string(), pool.clone());
            Ok(())
        })
    }

    fn delete_pool(&self, name: &str) -> Result<(), StorageError> {
        self.mutate(|state| {
            state
                .pools
                .remove(name)
                .map(|_| ())
                .ok_or(StorageError::NotFound)
        })
    }

    fn get_allocation(&self, id: &str) -> Result<Allocation, StorageError> {
        let state = self.state.read().expect("no fail");
        state
            .allocations
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn list_allocations(&self) -> Result<Vec<Allocation>, StorageError> {
        let state = self.state.read().expect("no fail");
        Ok(state.allocations.values().cloned().collect())
    }

    fn list_allocations_by_pool(
        &self,
        pool_name: &str,
    ) -> Result<Vec<Allocation>, StorageError> {
        let state = self.state.read().expect("no fail");
        Ok(state
            .allocations
            .values()
            .filter(|a| a.pool_name == pool_name)
            .cloned()
            .collect())
    }

    fn save_allocation(&self, allocation: &Allocation) -> Result<(), StorageError> {
        self.mutate(|state| {
            state
                .allocations
                .insert(allocation.id.clone(), allocation.clone());
            Ok(())
        })
    }

    fn delete_allocation(&self, id: &str) -> Result<(), StorageError> {
        self.mutate(|state| {
            state
                .allocations
                .remove(id)
                .map(|_| ())
                .ok_or(StorageError::NotFound)
        })
    }

    fn close(&self) -> Result<(), StorageError> {
        // The file backend holds no resources beyond the in-memory mirror.
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(TEMP_SUFFIX);
    PathBuf::from(os)
}

fn default_path() -> Result<PathBuf, StorageError> {
    let dir = std::env::current_dir()?.join(DEFAULT_STATE_DIR);
    fs::create_dir_all(&dir)?;
    Ok(dir.join(DEFAULT_STATE_FILE))
}
