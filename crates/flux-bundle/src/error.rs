// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::state::BundleState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bundle {id} cannot {attempted} from state {from}")]
    InvalidTransition { id: i64, from: BundleState, attempted: &'static str },

    #[error("cache error: {0}")]
    Cache(#[from] flux_cache::Error),

    #[error("bundle has no activator library (Bundle-Activator manifest attribute missing)")]
    NoActivator,

    #[error("cannot load bundle activator image: {0}")]
    Load(#[from] flux_loader::Error),

    #[error("activator {entry_point} failed for bundle {id}: {message}")]
    Activator { id: i64, entry_point: &'static str, message: String },
}
