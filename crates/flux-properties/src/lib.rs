// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ordered, typed attribute maps shared by the filter, registry and bundle
//! cache. See [`Properties`] for the map type and [`Value`] for the typed
//! values it stores.

#![forbid(unsafe_code)]

mod properties;
mod value;
mod version;

pub use properties::Properties;
pub use value::Value;
pub use version::{Version, VersionParseError};
