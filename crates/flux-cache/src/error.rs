// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cache directory error at {path}: {source}")]
    Cache { path: PathBuf, #[source] source: std::io::Error },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("bundle archive for id {0} not found in cache")]
    ArchiveNotFound(i64),

    #[error("revise/rollback is not supported for bundle archives")]
    ReviseNotSupported,

    #[error("unsupported bundle location scheme: {0}")]
    UnsupportedLocation(String),
}
