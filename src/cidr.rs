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
//! CIDR prefix arithmetic.

use ipnet::IpNet;
use thiserror::Error;

/// CIDR arithmetic errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CidrError {
    /// Input is not a valid CIDR prefix.
    #[error("invalid CIDR {0:?}")]
    InvalidCidr(String),
    /// Prefix length is out of range for the prefix it is applied to.
    #[error("prefix length /{requested} not valid inside {prefix}")]
    InvalidPrefixLength { prefix: IpNet, requested: u8 },
}

/// Parses a CIDR prefix and canonicalizes it to its network address.
///
/// `"10.0.0.1/24"` parses to `10.0.0.0/24`; host bits are never kept.
pub fn parse(text: &str) -> Result<IpNet, CidrError> {
    let net: IpNet = text
        .parse()
        .map_err(|_| CidrError::InvalidCidr(text.to_string()))?;
    Ok(net.trunc())
}

/// Returns true iff `inner`'s address range is a subset of `outer`'s.
///
/// Prefixes of different address families never contain each other.
pub fn contains(outer: &IpNet, inner: &IpNet) -> bool {
    match (outer, inner) {
        (IpNet::V4(outer), IpNet::V4(inner)) => outer.contains(inner),
        (IpNet::V6(outer), IpNet::V6(inner)) => outer.contains(inner),
        _ => false,
    }
}

/// Returns true iff the address ranges of `a` and `b` intersect.
///
/// Two CIDR prefixes intersect exactly when one contains the other.
pub fn overlaps(a: &IpNet, b: &IpNet) -> bool {
    contains(a, b) || contains(b, a)
}

/// Enumerates every sub-prefix of length `new_prefix_len` contained in
/// `outer`, in ascending address order.
///
/// The returned iterator is lazy and finite; it is a pure function of its
/// inputs and can be restarted by calling `subdivide` again. Fails with
/// [CidrError::InvalidPrefixLength] if `new_prefix_len` is shorter than
/// `outer`'s own length or exceeds the address family maximum (32 or 128).
pub fn subdivide(
    outer: &IpNet,
    new_prefix_len: u8,
) -> Result<impl Iterator<Item = IpNet>, CidrError> {
    if new_prefix_len < outer.prefix_len() || new_prefix_len > outer.max_prefix_len() {
        return Err(CidrError::InvalidPrefixLength {
            prefix: *outer,
            requested: new_prefix_len,
        });
    }
    outer
        .trunc()
        .subnets(new_prefix_len)
        .map_err(|_| CidrError::InvalidPrefixLength {
            prefix: *outer,
            requested: new_prefix_len,
        })
}
