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
//! Durable storage for pools and allocations.
//!
//! [Storage] is the backend-agnostic contract; [file::FileStorage] is the
//! reference implementation. Backends are a closed set selected through
//! [StorageConfig], so adding one means adding a [Backend] variant and a
//! constructor, not touching the contract.

use std::{path::PathBuf, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Allocation, Pool};

pub mod dto;
pub mod file;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested pool or allocation does not exist.
    #[error("not found")]
    NotFound,
    /// The underlying persistence medium failed.
    #[error("storage I/O failed")]
    Io(#[from] std::io::Error),
    /// The state document could not be serialized or deserialized.
    #[error("state document serialization failed")]
    Serialization(#[from] serde_json::Error),
    /// The state document parsed but does not describe valid records.
    #[error("state document is invalid")]
    InvalidDocument(#[source] anyhow::Error),
    /// The configured backend is not part of the closed backend set.
    #[error("unknown storage backend {0:?}")]
    UnknownBackend(String),
}

/// Backend-agnostic contract for durable pool and allocation storage.
///
/// Every accessor returns independent copies of the stored records, never
/// references into a backend's internal state. Mutations are atomic: either
/// the full dataset is durably replaced or the prior state remains intact
/// and an error is returned.
pub trait Storage: Send + Sync {
    /// Fetches a pool by name.
    fn get_pool(&self, name: &str) -> Result<Pool, StorageError>;
    /// Lists all pools.
    fn list_pools(&self) -> Result<Vec<Pool>, StorageError>;
    /// Upserts a pool by name.
    fn save_pool(&self, pool: &Pool) -> Result<(), StorageError>;
    /// Deletes a pool by name; [StorageError::NotFound] if absent.
    fn delete_pool(&self, name: &str) -> Result<(), StorageError>;

    /// Fetches an allocation by id.
    fn get_allocation(&self, id: &str) -> Result<Allocation, StorageError>;
    /// Lists all allocations.
    fn list_allocations(&self) -> Result<Vec<Allocation>, StorageError>;
    /// Lists the allocations recorded for one pool.
    fn list_allocations_by_pool(&self, pool_name: &str)
        -> Result<Vec<Allocation>, StorageError>;
    /// Upserts an allocation by id.
    fn save_allocation(&self, allocation: &Allocation) -> Result<(), StorageError>;
    /// Deletes an allocation by id; [StorageError::NotFound] if absent.
    fn delete_allocation(&self, id: &str) -> Result<(), StorageError>;

    /// Releases any held resources. Idempotent.
    fn close(&self) -> Result<(), StorageError>;
}

/// Storage backend configuration.
///
/// Only `file_path` is honored by the file backend; fields for future
/// backends are added here without widening the [Storage] contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selector; an empty string selects the file backend.
    pub backend: String,
    /// Path of the state document (file backend only).
    pub file_path: Option<PathBuf>,
}

/// The closed set of storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Single JSON document with atomic-rename writes.
    File,
}

impl FromStr for Backend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "file" => Ok(Backend::File),
            other => Err(StorageError::UnknownBackend(other.to_string())),
        }
    }
}

/// Constructs the storage backend selected by `config`.
pub fn open_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    match config.backend.parse::<Backend>()? {
        Backend::File => Ok(Arc::new(file::FileStorage::open(config.file_path.clone())?)),
    }
}
