// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("scheduled event {0} not found")]
    NotFound(i64),

    #[error("timed out waiting for scheduled event")]
    Timeout,
}
