// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ranked service registry: publish, find, track, per-bundle factories and
//! find-hooks.

mod entry;
mod error;
mod factory;
mod hooks;
mod registry;
mod tracker;

pub use entry::{ServiceEntry, SharedInstance, OBJECT_CLASS, SERVICE_BUNDLE_ID, SERVICE_ID, SERVICE_RANKING};
pub use error::Error;
pub use factory::ServiceFactory;
pub use hooks::FindHook;
pub use registry::Registry;
pub use tracker::{TrackerCallbacks, TrackerHandle};

#[cfg(test)]
mod tests {
    use super::*;
    use flux_filter::Filter;
    use flux_properties::Properties;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn find_returns_registered_service_in_object_class() {
        let registry = Registry::new();
        let id = registry.register("demo.Greeter", 1, Arc::new(42i32), Properties::new()).unwrap();
        let found = registry.find("demo.Greeter", None);
        assert!(found.contains(&id));
    }

    #[test]
    fn find_orders_by_ranking_desc_then_id_asc() {
        let registry = Registry::new();
        let mut low = Properties::new();
        low.set(SERVICE_RANKING, 0i64);
        let mut high = Properties::new();
        high.set(SERVICE_RANKING, 10i64);

        let a = registry.register("demo.Greeter", 1, Arc::new(1i32), low).unwrap();
        let b = registry.register("demo.Greeter", 1, Arc::new(2i32), high).unwrap();
        let mut tied = Properties::new();
        tied.set(SERVICE_RANKING, 10i64);
        let c = registry.register("demo.Greeter", 1, Arc::new(3i32), tied).unwrap();

        let found = registry.find("demo.Greeter", None);
        assert_eq!(found, vec![b, c, a]);
    }

    #[test]
    fn register_rejects_caller_supplied_reserved_properties() {
        let registry = Registry::new();
        let mut props = Properties::new();
        props.set(SERVICE_ID, 99i64);
        let err = registry.register("demo.Greeter", 1, Arc::new(1i32), props).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn tracker_receives_add_on_creation_and_remove_on_unregister() {
        let registry = Registry::new();
        let adds = Arc::new(AtomicUsize::new(0));
        let removes = Arc::new(AtomicUsize::new(0));
        let id = registry.register("demo.Greeter", 1, Arc::new(1i32), Properties::new()).unwrap();

        let adds2 = adds.clone();
        let removes2 = removes.clone();
        let handle = registry.track(
            "demo.Greeter",
            Filter::parse("").unwrap(),
            TrackerCallbacks {
                on_add: Some(Box::new(move |_| { adds2.fetch_add(1, Ordering::SeqCst); })),
                on_remove: Some(Box::new(move |_| { removes2.fetch_add(1, Ordering::SeqCst); })),
                ..Default::default()
            },
        );

        assert_eq!(adds.load(Ordering::SeqCst), 1);
        registry.unregister(id).unwrap();
        assert_eq!(removes.load(Ordering::SeqCst), 1);
        registry.close_tracker(handle);
    }

    #[test]
    fn use_services_increments_invocation_count_and_sees_instance() {
        let registry = Registry::new();
        registry.register("demo.Greeter", 1, Arc::new(7i32), Properties::new()).unwrap();
        let mut seen = 0;
        let count = registry
            .use_services("demo.Greeter", None, 0, Duration::ZERO, 1, |_entry, instance| {
                seen = *instance.downcast_ref::<i32>().unwrap();
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(seen, 7);
    }

    #[test]
    fn use_services_times_out_when_nothing_matches() {
        let registry = Registry::new();
        let result = registry.use_services("demo.Nobody", None, 0, Duration::from_millis(20), 1, |_, _| {});
        assert!(matches!(result, Err(Error::Timeout)));
    }

    struct CountingFactory {
        creates: AtomicUsize,
        releases: AtomicUsize,
    }

    impl ServiceFactory for CountingFactory {
        fn create(&self, _consumer_bundle_id: i64) -> SharedInstance {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Arc::new(String::from("instance"))
        }
        fn bundle_specific_service_removed(&self, _consumer_bundle_id: i64, _instance: &SharedInstance) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn modify_properties_fires_modified_for_a_tracker_that_still_matches() {
        let registry = Registry::new();
        let id = registry.register("demo.Greeter", 1, Arc::new(1i32), Properties::new()).unwrap();

        let modified = Arc::new(AtomicUsize::new(0));
        let modified2 = modified.clone();
        let handle = registry.track(
            "demo.Greeter",
            Filter::parse("").unwrap(),
            TrackerCallbacks {
                on_modified: Some(Box::new(move |_| { modified2.fetch_add(1, Ordering::SeqCst); })),
                ..Default::default()
            },
        );

        let mut updated = Properties::new();
        updated.set("greeting", "hola");
        registry.modify_properties(id, updated).unwrap();
        assert_eq!(modified.load(Ordering::SeqCst), 1);
        registry.close_tracker(handle);
    }

    #[test]
    fn modify_properties_flips_tracker_membership_when_filter_stops_matching() {
        let registry = Registry::new();
        let mut props = Properties::new();
        props.set("lang", "en");
        let id = registry.register("demo.Greeter", 1, Arc::new(1i32), props).unwrap();

        let adds = Arc::new(AtomicUsize::new(0));
        let removes = Arc::new(AtomicUsize::new(0));
        let adds2 = adds.clone();
        let removes2 = removes.clone();
        let handle = registry.track(
            "demo.Greeter",
            Filter::parse("(lang=en)").unwrap(),
            TrackerCallbacks {
                on_add: Some(Box::new(move |_| { adds2.fetch_add(1, Ordering::SeqCst); })),
                on_remove: Some(Box::new(move |_| { removes2.fetch_add(1, Ordering::SeqCst); })),
                ..Default::default()
            },
        );
        assert_eq!(adds.load(Ordering::SeqCst), 1);

        let mut updated = Properties::new();
        updated.set("lang", "fr");
        registry.modify_properties(id, updated).unwrap();
        assert_eq!(removes.load(Ordering::SeqCst), 1);
        registry.close_tracker(handle);
    }

    #[test]
    fn factory_instance_released_exactly_once_when_last_reference_drops() {
        let registry = Registry::new();
        let factory = Arc::new(CountingFactory { creates: AtomicUsize::new(0), releases: AtomicUsize::new(0) });
        registry.register_factory("demo.Widget", 1, factory.clone(), Properties::new()).unwrap();

        registry.use_services("demo.Widget", None, 0, Duration::ZERO, 5, |_, _| {}).unwrap();
        registry.use_services("demo.Widget", None, 0, Duration::ZERO, 5, |_, _| {}).unwrap();
        assert_eq!(factory.creates.load(Ordering::SeqCst), 1, "second use from same bundle reuses the instance");
        assert_eq!(factory.releases.load(Ordering::SeqCst), 0, "refcount does not reach zero until both uses release");
    }
}
