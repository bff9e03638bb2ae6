// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The activator contract: `create(context) → userData`,
//! `start(userData, context)`, `stop(userData, context)`,
//! `destroy(userData, context)`. Two implementations satisfy it: a native
//! one resolving the four well-known symbols from a loaded bundle image,
//! and a static one for bundles registered directly as Rust types (tests,
//! statically linked bundles) — activator plugins are conceptually
//! polymorphic, so they're encoded as a function table rather than a
//! single concrete type.

use std::ffi::c_void;
use std::os::raw::c_int;

/// Opaque handle a bundle's activator receives on every entry point. The
/// framework owns the real, registry-aware context; this crate only
/// threads an explicit pointer through so bundle code never depends on
/// thread-local or global lookup to find "its own" context.
#[repr(transparent)]
pub struct BundleContext(pub *mut c_void);

unsafe impl Send for BundleContext {}

/// Statically-registered activator, for bundles that are Rust types
/// linked directly into the framework process rather than loaded from a
/// shared object.
pub trait BundleActivator: Send {
    fn create(&mut self, ctx: &BundleContext) -> Result<(), String>;
    fn start(&mut self, ctx: &BundleContext) -> Result<(), String>;
    fn stop(&mut self, ctx: &BundleContext) -> Result<(), String>;
    fn destroy(&mut self, ctx: &BundleContext) -> Result<(), String>;
}

type CreateFn = unsafe extern "C" fn(ctx: *mut c_void, user_data_out: *mut *mut c_void) -> c_int;
type LifecycleFn = unsafe extern "C" fn(user_data: *mut c_void, ctx: *mut c_void) -> c_int;

/// Resolves and invokes the four `bundleActivator_*` symbols from a
/// [`flux_loader::LibraryHandle`].
pub struct NativeActivator {
    handle: flux_loader::LibraryHandle,
    user_data: *mut c_void,
}

unsafe impl Send for NativeActivator {}

impl NativeActivator {
    pub fn new(handle: flux_loader::LibraryHandle) -> Self {
        Self { handle, user_data: std::ptr::null_mut() }
    }

    fn call_create(&mut self, ctx: &BundleContext) -> Result<(), String> {
        let sym = flux_loader::symbol(&self.handle, "bundleActivator_create").map_err(|e| e.to_string())?;
        let func: CreateFn = unsafe { std::mem::transmute(sym) };
        let mut user_data: *mut c_void = std::ptr::null_mut();
        let rc = unsafe { func(ctx.0, &mut user_data as *mut _) };
        if rc != 0 {
            return Err(format!("bundleActivator_create returned {rc}"));
        }
        self.user_data = user_data;
        Ok(())
    }

    fn call_lifecycle(&mut self, name: &str, ctx: &BundleContext) -> Result<(), String> {
        let sym = flux_loader::symbol(&self.handle, name).map_err(|e| e.to_string())?;
        let func: LifecycleFn = unsafe { std::mem::transmute(sym) };
        let rc = unsafe { func(self.user_data, ctx.0) };
        if rc != 0 {
            return Err(format!("{name} returned {rc}"));
        }
        Ok(())
    }
}

impl BundleActivator for NativeActivator {
    fn create(&mut self, ctx: &BundleContext) -> Result<(), String> {
        self.call_create(ctx)
    }

    fn start(&mut self, ctx: &BundleContext) -> Result<(), String> {
        self.call_lifecycle("bundleActivator_start", ctx)
    }

    fn stop(&mut self, ctx: &BundleContext) -> Result<(), String> {
        self.call_lifecycle("bundleActivator_stop", ctx)
    }

    fn destroy(&mut self, ctx: &BundleContext) -> Result<(), String> {
        self.call_lifecycle("bundleActivator_destroy", ctx)
    }
}

/// Either form the activator may take. `into_handle` gives back the
/// underlying library handle for native activators, so the bundle can
/// close it on uninstall.
pub enum Activator {
    Native(NativeActivator),
    Static(Box<dyn BundleActivator>),
}

impl Activator {
    pub(crate) fn as_dyn(&mut self) -> &mut dyn BundleActivator {
        match self {
            Activator::Native(a) => a,
            Activator::Static(a) => a.as_mut(),
        }
    }

    pub(crate) fn into_native_handle(self) -> Option<flux_loader::LibraryHandle> {
        match self {
            Activator::Native(a) => Some(a.handle),
            Activator::Static(_) => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    #[derive(Default)]
    pub struct RecordingActivator {
        pub calls: Vec<&'static str>,
        pub fail_on: Option<&'static str>,
    }

    impl BundleActivator for RecordingActivator {
        fn create(&mut self, _ctx: &BundleContext) -> Result<(), String> {
            self.calls.push("create");
            if self.fail_on == Some("create") { Err("boom".into()) } else { Ok(()) }
        }
        fn start(&mut self, _ctx: &BundleContext) -> Result<(), String> {
            self.calls.push("start");
            if self.fail_on == Some("start") { Err("boom".into()) } else { Ok(()) }
        }
        fn stop(&mut self, _ctx: &BundleContext) -> Result<(), String> {
            self.calls.push("stop");
            Ok(())
        }
        fn destroy(&mut self, _ctx: &BundleContext) -> Result<(), String> {
            self.calls.push("destroy");
            Ok(())
        }
    }
}
