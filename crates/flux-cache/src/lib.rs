// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-bundle on-disk cache: the `<cacheDir>/bundle<id>/` workspace, its
//! extract-vs-reuse revision policy, and the manifest format bundles carry.

#![forbid(unsafe_code)]

mod archive;
mod cache;
mod error;
mod manifest;

pub use archive::{BundleArchive, Revision};
pub use cache::{BundleCache, CacheConfig, SYSTEM_BUNDLE_ID};
pub use error::Error;
pub use manifest::Manifest;
