// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Top-level error type composing every sub-crate's error kind: one
//! `thiserror`-derived enum per owning crate, composed into a top-level
//! error via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid framework configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Cache(#[from] flux_cache::Error),

    #[error(transparent)]
    Bundle(#[from] flux_bundle::Error),

    #[error(transparent)]
    Registry(#[from] flux_registry::Error),

    #[error(transparent)]
    Scheduler(#[from] flux_scheduler::Error),

    #[error(transparent)]
    Filter(#[from] flux_filter::ParseError),

    #[error("bundle {0} not found")]
    BundleNotFound(i64),

    #[error("framework is shutting down, enqueue rejected")]
    ShuttingDown,
}
