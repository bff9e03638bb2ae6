// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! A published service's metadata and instance handle.

use flux_properties::Properties;
use std::any::Any;
use std::sync::Arc;

/// Property keys the registry owns; a caller supplying one of these to
/// `register` gets [`crate::Error::Conflict`] rather than silently losing
/// the write.
pub const OBJECT_CLASS: &str = "objectClass";
pub const SERVICE_ID: &str = "service.id";
pub const SERVICE_BUNDLE_ID: &str = "service.bundleid";
pub const SERVICE_RANKING: &str = "service.ranking";

pub(crate) const RESERVED_KEYS: [&str; 3] = [OBJECT_CLASS, SERVICE_ID, SERVICE_BUNDLE_ID];

pub(crate) fn reject_reserved(props: &Properties) -> Result<(), crate::Error> {
    for key in RESERVED_KEYS {
        if props.contains_key(key) {
            return Err(crate::Error::Conflict(key));
        }
    }
    Ok(())
}

/// Type-erased handle to a registered service instance.
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Instance {
    Direct(SharedInstance),
    Factory(Arc<dyn crate::factory::ServiceFactory>),
}

/// One entry in the registry's index: a service id, its full property set
/// (including the registry-assigned `objectClass`/`service.id`/
/// `service.bundleid`/`service.ranking`), and the instance or factory that
/// produced it.
#[derive(Clone)]
pub struct ServiceEntry {
    pub id: i64,
    pub bundle_id: i64,
    pub interface: String,
    pub properties: Properties,
    pub(crate) instance: Instance,
}

impl ServiceEntry {
    pub fn ranking(&self) -> i64 {
        self.properties.get_as_long(SERVICE_RANKING, 0)
    }

    /// Downcasts a directly-registered (non-factory) instance.
    pub fn downcast<T: 'static + Send + Sync>(&self) -> Option<Arc<T>> {
        match &self.instance {
            Instance::Direct(instance) => instance.clone().downcast::<T>().ok(),
            Instance::Factory(_) => None,
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self.instance, Instance::Factory(_))
    }
}

/// Ranked ordering: ranking descending, ties broken by service id ascending.
pub(crate) fn ranked_order(a: &ServiceEntry, b: &ServiceEntry) -> std::cmp::Ordering {
    b.ranking().cmp(&a.ranking()).then(a.id.cmp(&b.id))
}
