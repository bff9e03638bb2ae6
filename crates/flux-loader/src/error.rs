// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot load library at {path}: {message}")]
    Open { path: String, message: String },

    #[error("symbol `{0}` not found")]
    SymbolNotFound(String),

    #[error("no loaded library matches address")]
    AddressNotFound,
}
