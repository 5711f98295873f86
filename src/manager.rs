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
//! Coordinates allocation requests against durable storage.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use thiserror::Error;

use crate::{
    allocator::{self, AllocationError},
    model::{Allocation, Pool},
    storage::{Storage, StorageError},
};

/// Coordinator errors.
#[derive(Debug, Error)]
pub enum IpamError {
    /// The named pool does not exist.
    #[error("pool {0:?} not found")]
    PoolNotFound(String),
    /// The requested allocation does not exist (or belongs to another pool).
    #[error("allocation {0:?} not found")]
    NotFound(String),
    /// An allocation with this id already exists.
    #[error("allocation {0:?} already exists")]
    DuplicateId(String),
    /// The pool still has live allocations and cannot be deleted.
    #[error("pool {name:?} still has {allocations} allocation(s)")]
    PoolInUse { name: String, allocations: usize },
    /// The allocation engine failed.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Orchestrates pool and allocation operations on a storage backend.
///
/// Every multi-step read-compute-write sequence runs under a per-pool
/// exclusive lock, so two concurrent [IpamManager::create_allocation] calls
/// on the same pool can never select the same free candidate.
pub struct IpamManager {
    storage: Arc<dyn Storage>,
    pool_locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl IpamManager {
    /// Creates a coordinator on top of the given storage backend.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            pool_locks: Mutex::new(BTreeMap::new()),
        }
    }

    fn pool_lock(&self, pool_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.pool_locks.lock().expect("no fail");
        locks.entry(pool_name.to_string()).or_default().clone()
    }

    /// Allocates the first free sub-prefix of `prefix_length` from the named
    /// pool and persists it under `id`.
    pub fn create_allocation(
        &self,
        id: &str,
        pool_name: &str,
        prefix_length: u8,
    ) -> Result<Allocation, IpamError> {
        let lock = self.pool_lock(pool_name);
        let _guard = lock.lock().expect("no fail");

        let pool = match self.storage.get_pool(pool_name) {
            Ok(pool) => pool,
            Err(StorageError::NotFound) => {
                return Err(IpamError::PoolNotFound(pool_name.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let existing = self.storage.list_allocations_by_pool(pool_name)?;
        match self.storage.get_allocation(id) {
            Ok(_) => return Err(IpamError::DuplicateId(id.to_string())),
            Err(StorageError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let allocated_cidr = allocator::allocate(&pool, &existing, prefix_length)?;
        let allocation = Allocation {
            id: id.to_string(),
            pool_name: pool_name.to_string(),
            allocated_cidr,
            prefix_length,
        };
        self.storage.save_allocation(&allocation)?;
        tracing::debug!(id, pool = pool_name, cidr = %allocated_cidr, "allocated prefix");

        Ok(allocation)
    }

    /// Fetches an allocation and validates that it belongs to `pool_name`.
    ///
    /// A pool mismatch is reported as [IpamError::NotFound], never as a
    /// cross-pool lookup.
    pub fn read_allocation(
        &self,
        id: &str,
        pool_name: &str,
    ) -> Result<Allocation, IpamError> {
        let allocation = match self.storage.get_allocation(id) {
            Ok(allocation) => allocation,
            Err(StorageError::NotFound) => return Err(IpamError::NotFound(id.to_string())),
            Err(err) => return Err(err.into()),
        };
        if allocation.pool_name != pool_name {
            return Err(IpamError::NotFound(id.to_string()));
        }
        Ok(allocation)
    }

    /// Lists the allocations recorded for one pool.
    pub fn list_allocations(&self, pool_name: &str) -> Result<Vec<Allocation>, IpamError> {
        Ok(self.storage.list_allocations_by_pool(pool_name)?)
    }

    /// Lists all allocations across pools.
    pub fn list_all_allocations(&self) -> Result<Vec<Allocation>, IpamError> {
        Ok(self.storage.list_allocations()?)
    }

    /// Deletes an allocation, freeing its range for future allocation.
    pub fn delete_allocation(&self, id: &str) -> Result<(), IpamError> {
        let allocation = match self.storage.get_allocation(id) {
            Ok(allocation) => allocation,
            Err(StorageError::NotFound) => return Err(IpamError::NotFound(id.to_string())),
            Err(err) => return Err(err.into()),
        };

        let lock = self.pool_lock(&allocation.pool_name);
        let _guard = lock.lock().expect("no fail");

        match self.storage.delete_allocation(id) {
            Ok(()) => {
                tracing::debug!(id, pool = %allocation.pool_name, "freed prefix");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(IpamError::NotFound(id.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Upserts a pool. The pool was already validated by [Pool::new].
    pub fn save_pool(&self, pool: &Pool) -> Result<(), IpamError> {
        Ok(self.storage.save_pool(pool)?)
    }

    /// Fetches a pool by name.
    pub fn get_pool(&self, name: &str) -> Result<Pool, IpamError> {
        match self.storage.get_pool(name) {
            Ok(pool) => Ok(pool),
            Err(StorageError::NotFound) => Err(IpamError::PoolNotFound(name.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Lists all pools.
    pub fn list_pools(&self) -> Result<Vec<Pool>, IpamError> {
        Ok(self.storage.list_pools()?)
    }

    /// Deletes a pool.
    ///
    /// Rejected with [IpamError::PoolInUse] while any allocation still
    /// references the pool; callers must delete those first.
    pub fn delete_pool(&self, name: &str) -> Result<(), IpamError> {
        let lock = self.pool_lock(name);
        let _guard = lock.lock().expect("no fail");

        let referencing = self.storage.list_allocations_by_pool(name)?;
        if !referencing.is_empty() {
            return Err(IpamError::PoolInUse {
                name: name.to_string(),
                allocations: referencing.len(),
            });
        }

        match self.storage.delete_pool(name) {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound) => Err(IpamError::PoolNotFound(name.to_string())),
            Err(err) => Err(err.into()),
        }
    }
}
