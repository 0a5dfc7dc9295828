//! Loading of extra shared libraries.
//!
//! Each library listed in [`GpiConfig::extra`](crate::GpiConfig) is opened
//! and its entry symbol is called once with a pointer to the [`Gpi`]
//! context. The entry typically registers a backend or callbacks. Loaded
//! libraries stay open for the lifetime of the context.
//!
//! The pointer is only meaningful to code built against the same version of
//! this crate; such code recovers the context with [`gpi_from_entry_arg`].

use std::ffi::c_void;

use crate::config::ExtraEntry;
use crate::context::Gpi;
use crate::error::{GpiError, GpiResult};

/// Signature of an extra library's entry symbol.
pub type EntryPoint = unsafe extern "C" fn(gpi: *const c_void);

/// Recovers the context from the argument of an [`EntryPoint`].
///
/// # Safety
///
/// `arg` must be the pointer passed to the entry point, used only for the
/// duration of that call.
pub unsafe fn gpi_from_entry_arg<'a>(arg: *const c_void) -> Option<&'a Gpi> {
    // SAFETY: guaranteed by the caller.
    unsafe { (arg as *const Gpi).as_ref() }
}

impl Gpi {
    /// Loads every entry in order and stops at the first failure.
    ///
    /// Returns how many libraries were loaded.
    pub fn load_extras(&self, entries: &[ExtraEntry]) -> GpiResult<usize> {
        for entry in entries {
            self.load_extra(entry)?;
        }
        Ok(entries.len())
    }

    /// Loads one library and calls its entry symbol.
    pub fn load_extra(&self, entry: &ExtraEntry) -> GpiResult<()> {
        let load_error = |reason: String| GpiError::ExtraLoad {
            library: entry.library.display().to_string(),
            reason,
        };
        tracing::info!(library = %entry.library.display(), entry = %entry.entry, "loading extra library");
        // SAFETY: running the library's initialisers is the point of loading it.
        let library = unsafe { libloading::Library::new(&entry.library) }
            .map_err(|e| load_error(e.to_string()))?;
        {
            // SAFETY: the entry symbol is declared with the `EntryPoint` signature.
            let func: libloading::Symbol<EntryPoint> = unsafe { library.get(entry.entry.as_bytes()) }
                .map_err(|e| load_error(format!("entry '{}': {e}", entry.entry)))?;
            // SAFETY: the pointer outlives the call.
            unsafe { func(self as *const Gpi as *const c_void) };
        }
        self.keep_library(library);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_reported() {
        let gpi = Gpi::new();
        let dir = tempfile::tempdir().unwrap();
        let entry = ExtraEntry::new(dir.path().join("libmissing.so"));
        let err = gpi.load_extra(&entry).unwrap_err();
        assert!(matches!(err, GpiError::ExtraLoad { ref library, .. } if library.ends_with("libmissing.so")));
    }

    #[test]
    fn empty_list_loads_nothing() {
        assert_eq!(Gpi::new().load_extras(&[]).unwrap(), 0);
    }

    #[test]
    fn entry_arg_round_trips() {
        let gpi = Gpi::new();
        let arg = &gpi as *const Gpi as *const c_void;
        let back = unsafe { gpi_from_entry_arg(arg) }.unwrap();
        assert!(back.ptr_eq(&gpi));
        assert!(unsafe { gpi_from_entry_arg(std::ptr::null()) }.is_none());
    }
}
