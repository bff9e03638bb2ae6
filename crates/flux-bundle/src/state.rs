// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The bundle state diagram: `UNKNOWN` is never observed once a `Bundle`
//! value exists (construction starts at `Installed`), and every other
//! transition is checked against this table before it runs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleState {
    Installed,
    Resolved,
    Starting,
    Active,
    Stopping,
    Uninstalled,
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BundleState::Installed => "INSTALLED",
            BundleState::Resolved => "RESOLVED",
            BundleState::Starting => "STARTING",
            BundleState::Active => "ACTIVE",
            BundleState::Stopping => "STOPPING",
            BundleState::Uninstalled => "UNINSTALLED",
        };
        f.write_str(name)
    }
}

impl BundleState {
    /// True for every transition in the state diagram except the two that the
    /// framework drives internally as part of a larger operation
    /// (`Starting`/`Stopping` are reached only through [`super::Bundle::start`]
    /// and [`super::Bundle::stop`], never requested directly).
    pub(crate) fn can_resolve(self) -> bool {
        matches!(self, BundleState::Installed)
    }

    pub(crate) fn can_start(self) -> bool {
        matches!(self, BundleState::Installed | BundleState::Resolved)
    }

    pub(crate) fn can_stop(self) -> bool {
        matches!(self, BundleState::Active)
    }

    pub(crate) fn can_uninstall(self) -> bool {
        !matches!(self, BundleState::Uninstalled)
    }
}
