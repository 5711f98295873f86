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
//! Serialization layer for the persisted state document.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    cidr,
    model::{Allocation, Pool},
    storage::file::StoreState,
};

/// The full persisted dataset.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocumentDto {
    /// All pools, keyed by name.
    pub pools: BTreeMap<String, PoolDto>,
    /// All allocations, keyed by id.
    pub allocations: BTreeMap<String, AllocationDto>,
}

/// A persisted pool record.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PoolDto {
    pub name: String,
    pub cidrs: Vec<String>,
}

/// A persisted allocation record.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct AllocationDto {
    pub id: String,
    pub pool_name: String,
    pub allocated_cidr: String,
    pub prefix_length: u8,
}

impl TryFrom<PoolDto> for Pool {
    type Error = anyhow::Error;

    fn try_from(value: PoolDto) -> Result<Self, Self::Error> {
        let cidrs = value
            .cidrs
            .iter()
            .map(|c| {
                cidr::parse(c)
                    .with_context(|| format!("invalid CIDR in pool {:?}", value.name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Pool::new(value.name.clone(), cidrs)
            .with_context(|| format!("invalid pool {:?}", value.name))
    }
}

impl From<&Pool> for PoolDto {
    fn from(pool: &Pool) -> Self {
        PoolDto {
            name: pool.name().to_string(),
            cidrs: pool.cidrs().iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TryFrom<AllocationDto> for Allocation {
    type Error = anyhow::Error;

    fn try_from(value: AllocationDto) -> Result<Self, Self::Error> {
        let allocated_cidr = cidr::parse(&value.allocated_cidr)
            .with_context(|| format!("invalid CIDR in allocation {:?}", value.id))?;

        Ok(Allocation {
            id: value.id,
            pool_name: value.pool_name,
            allocated_cidr,
            prefix_length: value.prefix_length,
        })
    }
}

impl From<&Allocation> for AllocationDto {
    fn from(allocation: &Allocation) -> Self {
        AllocationDto {
            id: allocation.id.clone(),
            pool_name: allocation.pool_name.clone(),
            allocated_cidr: allocation.allocated_cidr.to_string(),
            prefix_length: allocation.prefix_length,
        }
    }
}

impl TryFrom<StateDocumentDto> for StoreState {
    type Error = anyhow::Error;

    fn try_from(value: StateDocumentDto) -> Result<Self, Self::Error> {
        let pools = value
            .pools
            .into_values()
            .map(|dto| {
                let pool = Pool::try_from(dto)?;
                Ok((pool.name().to_string(), pool))
            })
            .collect::<Result<_, Self::Error>>()?;

        let allocations = value
            .allocations
            .into_values()
            .map(|dto| {
                let allocation = Allocation::try_from(dto)?;
                Ok((allocation.id.clone(), allocation))
            })
            .collect::<Result<_, Self::Error>>()?;

        Ok(StoreState { pools, allocations })
    }
}

impl From<&StoreState> for StateDocumentDto {
    fn from(state: &StoreState) -> Self {
        StateDocumentDto {
            pools: state
                .pools
                .iter()
                .map(|(name, pool)| (name.clone(), pool.into()))
                .collect(),
            allocations: state
                .allocations
                .iter()
                .map(|(id, allocation)| (id.clone(), allocation.into()))
                .collect(),
        }
    }
}
