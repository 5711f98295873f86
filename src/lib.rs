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
//! # IPAM Engine
//!
//! Carve non-overlapping sub-prefixes out of named address pools and keep
//! the allocation state durable across restarts.
//!
//! The [manager::IpamManager] orchestrates requests: it loads a pool and its
//! recorded allocations from a [storage::Storage] backend, asks
//! [allocator::allocate] for the first free sub-prefix of the requested
//! length, and persists the resulting [model::Allocation].
//!
//! The reference backend, [storage::file::FileStorage], keeps the whole
//! dataset in a single JSON document and replaces it atomically on every
//! mutation.

pub mod allocator;
pub mod cidr;
pub mod manager;
pub mod model;
pub mod storage;
