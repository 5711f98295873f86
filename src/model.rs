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
//! Domain records: address pools and the allocations carved from them.

use ipnet::IpNet;
use thiserror::Error;

use crate::cidr;

/// Pool construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolValidationError {
    /// A pool must have at least one CIDR block.
    #[error("pool {0:?} has no CIDR blocks")]
    EmptyPool(String),
    /// CIDR blocks within one pool must not overlap each other.
    #[error("pool {name:?} has overlapping blocks {a} and {b}")]
    OverlappingBlocks { name: String, a: IpNet, b: IpNet },
}

/// A named, ordered set of non-overlapping CIDR blocks to allocate from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    name: String,
    cidrs: Vec<IpNet>,
}

impl Pool {
    /// Creates a pool after validating its blocks.
    ///
    /// Blocks are canonicalized to their network address and kept in the
    /// declared order; the allocator walks them in exactly this order.
    pub fn new(
        name: impl Into<String>,
        cidrs: Vec<IpNet>,
    ) -> Result<Self, PoolValidationError> {
        let name = name.into();
        if cidrs.is_empty() {
            return Err(PoolValidationError::EmptyPool(name));
        }
        let cidrs: Vec<IpNet> = cidrs.into_iter().map(|c| c.trunc()).collect();
        for i in 0..cidrs.len() {
            for j in i + 1..cidrs.len() {
                if cidr::overlaps(&cidrs[i], &cidrs[j]) {
                    return Err(PoolValidationError::OverlappingBlocks {
                        name,
                        a: cidrs[i],
                        b: cidrs[j],
                    });
                }
            }
        }
        Ok(Self { name, cidrs })
    }

    /// The pool's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pool's CIDR blocks in declared order.
    pub fn cidrs(&self) -> &[IpNet] {
        &self.cidrs
    }
}

/// A sub-prefix carved from a pool, bound to a caller-supplied identifier.
///
/// The record is immutable once created; deleting it frees the address
/// range for future allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Caller-supplied unique identifier.
    pub id: String,
    /// Name of the pool the prefix was carved from.
    pub pool_name: String,
    /// The concrete prefix assigned by the allocator.
    pub allocated_cidr: IpNet,
    /// The prefix length that was requested.
    pub prefix_length: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn pool_requires_at_least_one_block() {
        assert_eq!(
            Pool::new("empty", vec![]),
            Err(PoolValidationError::EmptyPool("empty".to_string()))
        );
    }

    #[test]
    fn pool_rejects_overlapping_blocks() {
        let result = Pool::new("bad", vec![net("10.0.0.0/16"), net("10.0.1.0/24")]);
        assert!(matches!(
            result,
            Err(PoolValidationError::OverlappingBlocks { .. })
        ));
    }

    #[test]
    fn pool_canonicalizes_blocks() {
        let pool = Pool::new("p", vec![net("10.0.0.1/24")]).unwrap();
        assert_eq!(pool.cidrs(), &[net("10.0.0.0/24")]);
    }

    #[test]
    fn pool_keeps_declared_block_order() {
        let blocks = vec![net("192.168.1.0/24"), net("10.0.0.0/24")];
        let pool = Pool::new("p", blocks.clone()).unwrap();
        assert_eq!(pool.cidrs(), blocks.as_slice());
    }

    #[test]
    fn pool_allows_mixed_families() {
        let pool = Pool::new("dual", vec![net("10.0.0.0/24"), net("2001:db8::/64")]);
        assert!(pool.is_ok());
    }
}
