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
//! First-fit prefix allocation.

use ipnet::IpNet;
use thiserror::Error;

use crate::{
    cidr,
    model::{Allocation, Pool},
};

/// Prefix allocation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// Requested length is out of range for one of the pool's blocks.
    #[error("prefix length /{requested} not allocatable from block {block}")]
    InvalidPrefixLength { block: IpNet, requested: u8 },
    /// No free sub-prefix of the requested length remains in the pool.
    #[error("pool {0:?} has no free /{1} prefix left")]
    PoolExhausted(String, u8),
}

/// Selects the first free sub-prefix of the requested length in `pool`.
///
/// Walks the pool's blocks in declared order and, within each block, the
/// candidate sub-prefixes in ascending address order. The first candidate
/// that overlaps none of `existing` wins. Pure function: identical inputs
/// always select the identical candidate, so a failed write can safely be
/// recomputed.
///
/// The requested length is validated against every block before any
/// enumeration: it must not be shorter than any block's own length nor
/// exceed any block's address family maximum.
pub fn allocate(
    pool: &Pool,
    existing: &[Allocation],
    requested_prefix_len: u8,
) -> Result<IpNet, AllocationError> {
    for block in pool.cidrs() {
        if requested_prefix_len < block.prefix_len()
            || requested_prefix_len > block.max_prefix_len()
        {
            return Err(AllocationError::InvalidPrefixLength {
                block: *block,
                requested: requested_prefix_len,
            });
        }
    }

    let used: Vec<IpNet> = existing
        .iter()
        .filter(|a| a.pool_name == pool.name())
        .map(|a| a.allocated_cidr)
        .collect();

    for block in pool.cidrs() {
        let candidates =
            cidr::subdivide(block, requested_prefix_len).expect("validated above");
        for candidate in candidates {
            if used.iter().all(|u| !cidr::overlaps(&candidate, u)) {
                return Ok(candidate);
            }
        }
    }

    Err(AllocationError::PoolExhausted(
        pool.name().to_string(),
        requested_prefix_len,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn pool(name: &str, blocks: &[&str]) -> Pool {
        Pool::new(name, blocks.iter().map(|b| b.parse().unwrap()).collect()).unwrap()
    }

    fn allocation(id: &str, pool_name: &str, cidr: &str) -> Allocation {
        let allocated_cidr = net(cidr);
        Allocation {
            id: id.to_string(),
            pool_name: pool_name.to_string(),
            allocated_cidr,
            prefix_length: allocated_cidr.prefix_len(),
        }
    }

    #[test]
    fn first_fit_selects_lowest_free_candidate() {
        let pool = pool("p", &["10.0.0.0/16"]);

        let first = allocate(&pool, &[], 24).unwrap();
        assert_eq!(first, net("10.0.0.0/24"));

        let existing = vec![allocation("a", "p", "10.0.0.0/24")];
        let second = allocate(&pool, &existing, 24).unwrap();
        assert_eq!(second, net("10.0.1.0/24"));
    }

    #[test]
    fn allocation_is_deterministic() {
        let pool = pool("p", &["10.0.0.0/16"]);
        let existing = vec![
            allocation("a", "p", "10.0.0.0/24"),
            allocation("b", "p", "10.0.2.0/24"),
        ];
        let first = allocate(&pool, &existing, 24).unwrap();
        let second = allocate(&pool, &existing, 24).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, net("10.0.1.0/24"));
    }

    #[test]
    fn exhausts_after_every_address_is_taken() {
        let pool = pool("tiny", &["10.0.0.0/30"]);
        let mut existing = Vec::new();
        for i in 0..4 {
            let prefix = allocate(&pool, &existing, 32).unwrap();
            assert_eq!(prefix, net(&format!("10.0.0.{i}/32")));
            existing.push(allocation(&format!("a{i}"), "tiny", &prefix.to_string()));
        }
        assert_eq!(
            allocate(&pool, &existing, 32),
            Err(AllocationError::PoolExhausted("tiny".to_string(), 32))
        );
    }

    #[test]
    fn skips_space_covered_by_wider_allocations() {
        let pool = pool("p", &["10.0.0.0/16"]);
        let existing = vec![allocation("half", "p", "10.0.0.0/17")];
        let prefix = allocate(&pool, &existing, 24).unwrap();
        assert_eq!(prefix, net("10.0.128.0/24"));
    }

    #[test]
    fn walks_blocks_in_declared_order() {
        let pool = pool("p", &["192.168.1.0/24", "10.0.0.0/24"]);
        let first = allocate(&pool, &[], 24).unwrap();
        assert_eq!(first, net("192.168.1.0/24"));

        let existing = vec![allocation("a", "p", "192.168.1.0/24")];
        let second = allocate(&pool, &existing, 24).unwrap();
        assert_eq!(second, net("10.0.0.0/24"));
    }

    #[test]
    fn ignores_allocations_from_other_pools() {
        let pool = pool("p", &["10.0.0.0/24"]);
        let existing = vec![allocation("other", "q", "10.0.0.0/24")];
        let prefix = allocate(&pool, &existing, 24).unwrap();
        assert_eq!(prefix, net("10.0.0.0/24"));
    }

    #[test]
    fn allocates_ipv6_prefixes() {
        let pool = pool("v6", &["2001:db8::/32"]);

        let first = allocate(&pool, &[], 64).unwrap();
        assert_eq!(first, net("2001:db8::/64"));

        let existing = vec![allocation("a", "v6", "2001:db8::/64")];
        let second = allocate(&pool, &existing, 64).unwrap();
        assert_eq!(second, net("2001:db8:0:1::/64"));
    }

    #[test]
    fn rejects_length_shorter_than_block() {
        let pool = pool("v6", &["2001:db8::/32"]);
        assert_eq!(
            allocate(&pool, &[], 24),
            Err(AllocationError::InvalidPrefixLength {
                block: net("2001:db8::/32"),
                requested: 24,
            })
        );
    }

    #[test]
    fn rejects_length_beyond_family_maximum() {
        let pool = pool("v4", &["10.0.0.0/24"]);
        assert_eq!(
            allocate(&pool, &[], 64),
            Err(AllocationError::InvalidPrefixLength {
                block: net("10.0.0.0/24"),
                requested: 64,
            })
        );
    }

    #[test]
    fn validates_before_enumerating_any_block() {
        // The first block could satisfy the request, but the second makes
        // the requested length invalid for the pool as a whole.
        let pool = pool("p", &["10.0.0.0/16", "10.1.0.0/24"]);
        assert_eq!(
            allocate(&pool, &[], 20),
            Err(AllocationError::InvalidPrefixLength {
                block: net("10.1.0.0/24"),
                requested: 20,
            })
        );
    }

    #[test]
    fn allocations_never_overlap() {
        let pool = pool("p", &["10.0.0.0/26", "192.168.0.0/28"]);
        let mut existing = Vec::new();
        let mut i = 0;
        loop {
            match allocate(&pool, &existing, 29) {
                Ok(prefix) => {
                    for a in &existing {
                        assert!(
                            !cidr::overlaps(&prefix, &a.allocated_cidr),
                            "{prefix} overlaps {}",
                            a.allocated_cidr
                        );
                    }
                    assert!(pool.cidrs().iter().any(|b| cidr::contains(b, &prefix)));
                    existing.push(allocation(&format!("a{i}"), "p", &prefix.to_string()));
                    i += 1;
                }
                Err(AllocationError::PoolExhausted(..)) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        // A /26 holds eight /29s, a /28 holds two.
        assert_eq!(existing.len(), 10);
    }
}
