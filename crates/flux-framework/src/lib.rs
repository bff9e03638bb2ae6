// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! FrameworkCore: creates and tears down one runtime instance — cache,
//! registry, scheduled-event engine and readiness subsystem — and
//! sequences bundle lifecycle across them.

mod config;
mod error;
mod framework;
mod log;

pub use config::FrameworkConfig;
pub use error::Error;
pub use framework::FrameworkCore;
pub use log::{LogLevel, LogSink, TracingLogSink};

pub use flux_bundle::{BundleActivator, BundleContext, BundleState};
pub use flux_filter::Filter;
pub use flux_properties::Properties;
pub use flux_readiness::{ReadinessSubsystem, CONDITION_ID, CONDITION_INTERFACE};
pub use flux_registry::{Registry, ServiceEntry, SharedInstance, TrackerCallbacks, TrackerHandle};
