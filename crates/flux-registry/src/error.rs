// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reserved property `{0}` may not be set by the caller")]
    Conflict(&'static str),

    #[error("service {0} not found")]
    NotFound(i64),

    #[error("bad filter: {0}")]
    FilterParse(#[from] flux_filter::ParseError),

    #[error("timed out waiting for a matching service")]
    Timeout,
}
