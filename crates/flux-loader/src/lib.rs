// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Loads a bundle's extracted shared-object/DLL image and lets in-bundle
//! code recover its own handle from any address inside that image, which is
//! how a bundle calls `getBundleContext()` without an explicit parameter.
//! Grounded on `celix_libloader.c`'s open/close/getSymbol/
//! findBundleActivatorSymbolFromAddr quartet.

// Wraps `dlopen`/`dlsym`/`dladdr`, so unlike the rest of the workspace this
// crate cannot forbid unsafe code; every unsafe block here is a direct FFI
// call into the OS loader.

mod error;
mod registry;

pub use error::Error;

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded bundle image. Closing the last handle for a path unloads the
/// image unless it was opened with `no_delete`.
pub struct LibraryHandle {
    key: String,
    library: Arc<libloading::Library>,
    no_delete: bool,
}

impl LibraryHandle {
    pub fn path(&self) -> &str {
        &self.key
    }
}

/// Loads `path` with process-local symbol visibility (two bundles never
/// collide on symbol names) and registers it under its canonical path so
/// [`find_activator_symbol_from_address`] can recover it later.
///
/// `no_delete` keeps the image mapped after [`close`] — useful for
/// diagnostic builds where stack traces must still resolve symbols from an
/// unloaded bundle.
pub fn open(path: impl AsRef<Path>, no_delete: bool) -> Result<LibraryHandle, Error> {
    let path = path.as_ref();
    let key = canonical_key(path);

    let library = unsafe { load_with_flags(path, no_delete) }
        .map_err(|e| Error::Open { path: key.clone(), message: e.to_string() })?;
    let library = Arc::new(library);

    registry::register(key.clone(), library.clone());
    tracing::debug!(path = %key, no_delete, "loaded bundle image");
    Ok(LibraryHandle { key, library, no_delete })
}

#[cfg(unix)]
unsafe fn load_with_flags(path: &Path, no_delete: bool) -> Result<libloading::Library, libloading::Error> {
    use libloading::os::unix::Library as UnixLibrary;
    let mut flags = libc::RTLD_LAZY | libc::RTLD_LOCAL;
    if no_delete {
        flags |= libc::RTLD_NODELETE;
    }
    UnixLibrary::open(Some(path), flags).map(libloading::Library::from)
}

#[cfg(not(unix))]
unsafe fn load_with_flags(path: &Path, _no_delete: bool) -> Result<libloading::Library, libloading::Error> {
    libloading::Library::new(path)
}

fn canonical_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .into_owned()
}

/// Detaches `handle`. Per-bundle images opened without `no_delete` are
/// unmapped once this is the last outstanding reference.
pub fn close(handle: LibraryHandle) {
    registry::unregister(&handle.key);
    let LibraryHandle { key, library, no_delete } = handle;
    drop(library);
    tracing::debug!(path = %key, no_delete, "closed bundle image");
}

/// Returns the raw address of `name` in `handle`'s image, or
/// [`Error::SymbolNotFound`] if the OS loader can't resolve it.
pub fn symbol(handle: &LibraryHandle, name: &str) -> Result<*const c_void, Error> {
    let cname = format!("{name}\0");
    unsafe {
        handle
            .library
            .get::<*const c_void>(cname.as_bytes())
            .map(|sym| *sym)
            .map_err(|_| Error::SymbolNotFound(name.to_string()))
    }
}

/// Given any address inside a loaded bundle's image, recovers the handle
/// that owns it and resolves `symbol` within it. This is how bundle code
/// calls back into its own per-bundle context without the framework
/// threading an explicit pointer through every call.
#[cfg(unix)]
pub fn find_activator_symbol_from_address(addr: *const c_void, symbol_name: &str) -> Result<*const c_void, Error> {
    let fname = unsafe { resolve_containing_path(addr) }.ok_or(Error::AddressNotFound)?;
    let library = registry::find(&fname).ok_or(Error::AddressNotFound)?;
    let cname = format!("{symbol_name}\0");
    unsafe {
        library
            .get::<*const c_void>(cname.as_bytes())
            .map(|sym| *sym)
            .map_err(|_| Error::SymbolNotFound(symbol_name.to_string()))
    }
}

#[cfg(not(unix))]
pub fn find_activator_symbol_from_address(_addr: *const c_void, _symbol_name: &str) -> Result<*const c_void, Error> {
    Err(Error::AddressNotFound)
}

#[cfg(unix)]
unsafe fn resolve_containing_path(addr: *const c_void) -> Option<String> {
    let mut info: libc::Dl_info = std::mem::zeroed();
    if libc::dladdr(addr, &mut info) == 0 {
        return None;
    }
    if info.dli_fname.is_null() {
        return None;
    }
    let raw = std::ffi::CStr::from_ptr(info.dli_fname).to_string_lossy().into_owned();
    Some(canonical_key(Path::new(&raw)))
}
