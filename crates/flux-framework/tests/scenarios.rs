// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios, literal inputs to expected outputs, exercised
//! against a real `FrameworkCore`. One scenario substitutes a synthetic
//! two-dependency readiness condition for a pub-sub topology manager
//! bundle — pub/sub discovery itself is out of the core's scope, but the
//! generic readiness mechanism it would exercise is not.

use flux_framework::{FrameworkConfig, FrameworkCore, Properties, SharedInstance};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn write_test_bundle_zip(path: &std::path::Path, symbolic_name: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
    use std::io::Write;
    zip.write_all(format!("Bundle-SymbolicName: {symbolic_name}\nBundle-Version: 1.0.0\n").as_bytes()).unwrap();
    zip.finish().unwrap();
}

fn framework(cache_dir: &std::path::Path) -> Arc<FrameworkCore> {
    let mut props = Properties::new();
    props.set("cache.dir", cache_dir.to_string_lossy().into_owned());
    FrameworkCore::create(FrameworkConfig::from_properties(&props).unwrap()).unwrap()
}

/// S1 — Cache reuse.
#[test]
fn s1_cache_reuse() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("a.zip");
    write_test_bundle_zip(&zip_path, "bundle-a");
    let framework = framework(&dir.path().join("cache"));

    let id1 = framework.install(zip_path.to_str().unwrap()).unwrap();
    let t1 = framework.bundle_last_modified(id1).unwrap();
    framework.uninstall_bundle(id1).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    let id2 = framework.install(zip_path.to_str().unwrap()).unwrap();
    assert_eq!(id1, id2, "reinstalling the same location with identical cache state reuses the bundle id");
    let t2 = framework.bundle_last_modified(id2).unwrap();
    assert_eq!(t1, t2, "unchanged source archive must not be re-extracted on reinstall");

    framework.destroy().unwrap();
}

/// S2 — Cache always-update.
#[test]
fn s2_cache_always_update() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("a.zip");
    write_test_bundle_zip(&zip_path, "bundle-a");

    let mut props = Properties::new();
    props.set("cache.dir", dir.path().join("cache").to_string_lossy().into_owned());
    props.set("cache.always.update.archives", true);
    let framework = FrameworkCore::create(FrameworkConfig::from_properties(&props).unwrap()).unwrap();

    let id1 = framework.install(zip_path.to_str().unwrap()).unwrap();
    let t1 = framework.bundle_last_modified(id1).unwrap();
    framework.uninstall_bundle(id1).unwrap();

    std::thread::sleep(Duration::from_millis(20));
    let id2 = framework.install(zip_path.to_str().unwrap()).unwrap();
    let t2 = framework.bundle_last_modified(id2).unwrap();
    assert!(t2 > t1, "always-update must re-extract on every install, advancing the manifest mtime");

    framework.destroy().unwrap();
}

/// S3 — Ranking order.
#[test]
fn s3_ranking_order() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework(&dir.path().join("cache"));
    let registry = framework.registry();

    let mut low = Properties::new();
    low.set("service.ranking", 0i64);
    let a = registry.register("demo.I", 1, Arc::new(()) as SharedInstance, low).unwrap();

    let mut high = Properties::new();
    high.set("service.ranking", 100i64);
    let b = registry.register("demo.I", 1, Arc::new(()) as SharedInstance, high.clone()).unwrap();
    let c = registry.register("demo.I", 1, Arc::new(()) as SharedInstance, high).unwrap();

    assert_eq!(registry.find("demo.I", None), vec![b, c, a]);
    framework.destroy().unwrap();
}

/// S4 — Tracker initial delivery.
#[test]
fn s4_tracker_initial_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework(&dir.path().join("cache"));
    let registry = framework.registry();

    let s1 = registry.register("demo.I", 1, Arc::new(()) as SharedInstance, Properties::new()).unwrap();
    let s2 = registry.register("demo.I", 1, Arc::new(()) as SharedInstance, Properties::new()).unwrap();

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let handle = registry.track(
        "demo.I",
        flux_framework::Filter::parse("").unwrap(),
        flux_framework::TrackerCallbacks {
            on_add: Some(Box::new(move |entry| seen2.lock().unwrap().push(entry.id))),
            ..Default::default()
        },
    );

    assert_eq!(*seen.lock().unwrap(), vec![s1, s2]);
    registry.close_tracker(handle);
    framework.destroy().unwrap();
}

/// S5 — Scheduled event cancellation.
#[test]
fn s5_scheduled_event_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework(&dir.path().join("cache"));

    let count = Arc::new(AtomicUsize::new(0));
    let count2 = count.clone();
    let id = framework.scheduler().schedule(1, "s5", Duration::ZERO, Duration::from_millis(50), move || {
        count2.fetch_add(1, Ordering::SeqCst);
    }, None);

    std::thread::sleep(Duration::from_millis(220));
    framework.scheduler().cancel(id).unwrap();
    let n = count.load(Ordering::SeqCst);
    assert!((3..=5).contains(&n), "expected 3-5 invocations in 220ms at 50ms interval, got {n}");

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(count.load(Ordering::SeqCst), n, "no further invocations after cancel returns");

    framework.destroy().unwrap();
}

/// S6 — Readiness flip, using a synthetic two-dependency condition in
/// place of the out-of-scope pub-sub topology manager.
#[test]
fn s6_readiness_flip() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework(&dir.path().join("cache"));
    let registry = framework.registry();
    let readiness = framework.readiness();

    let ready_filter = flux_framework::Filter::parse("(condition.id=framework.ready)").unwrap();
    assert_eq!(registry.find(flux_framework::CONDITION_INTERFACE, Some(&ready_filter)).len(), 1);

    let demo_filter = flux_framework::Filter::parse("(condition.id=demo.ready)").unwrap();
    assert_eq!(registry.find(flux_framework::CONDITION_INTERFACE, Some(&demo_filter)).len(), 0);

    let admin_present = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let subscriber_present = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let admin2 = admin_present.clone();
    let sub2 = subscriber_present.clone();
    readiness.register_condition("demo.ready", move || admin2.load(Ordering::SeqCst) && sub2.load(Ordering::SeqCst));
    readiness.watch("demo.Admin");
    readiness.watch("demo.Subscriber");

    let admin_id = registry.register("demo.Admin", 1, Arc::new(()) as SharedInstance, Properties::new()).unwrap();
    admin_present.store(true, Ordering::SeqCst);
    readiness.recompute();
    let subscriber_id = registry.register("demo.Subscriber", 1, Arc::new(()) as SharedInstance, Properties::new()).unwrap();
    subscriber_present.store(true, Ordering::SeqCst);
    readiness.recompute();

    assert_eq!(registry.find(flux_framework::CONDITION_INTERFACE, Some(&demo_filter)).len(), 1);

    registry.unregister(admin_id).unwrap();
    admin_present.store(false, Ordering::SeqCst);
    readiness.recompute();
    assert_eq!(registry.find(flux_framework::CONDITION_INTERFACE, Some(&demo_filter)).len(), 0);

    registry.unregister(subscriber_id).unwrap();
    framework.destroy().unwrap();
}
