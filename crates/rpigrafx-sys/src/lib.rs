// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]

include!("ffi.rs");

// Re-export libloading for error handling
pub use libloading;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

static LIBRARY: OnceLock<MmalLibrary> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Directory searched when the libraries are not on the loader path.
pub const FALLBACK_LIBRARY_DIR: &str = "/opt/vc/lib";

/// Initialize the MMAL userland by loading its shared libraries.
///
/// This must be called before using any other MMAL functions. The first
/// successful call also runs `bcm_host_init()`.
///
/// The environment variable `RPIGRAFX_MMAL_PATH` can be used to specify the
/// directory holding `libmmal_core.so` and friends. If not set, the standard
/// system paths are searched, then [`FALLBACK_LIBRARY_DIR`].
pub fn init() -> Result<&'static MmalLibrary, libloading::Error> {
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    // Double-check after acquiring lock
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let lib = match std::env::var_os("RPIGRAFX_MMAL_PATH") {
        Some(dir) => unsafe { MmalLibrary::new(Some(PathBuf::from(dir).as_path()))? },
        None => match unsafe { MmalLibrary::new(None) } {
            Ok(lib) => lib,
            Err(_) => unsafe { MmalLibrary::new(Some(Path::new(FALLBACK_LIBRARY_DIR)))? },
        },
    };

    unsafe { lib.bcm_host_init() };

    Ok(LIBRARY.get_or_init(|| lib))
}

/// Try to get a reference to the loaded library without loading it
pub fn try_library() -> Option<&'static MmalLibrary> {
    LIBRARY.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_values_match_headers() {
        // mmal_format.h: UNKNOWN, CONTROL, AUDIO, VIDEO, SUBPICTURE
        assert_eq!(MMAL_ES_TYPE_T_MMAL_ES_TYPE_VIDEO, 3);

        // mmal_port.h: UNKNOWN, CONTROL, INPUT, OUTPUT, CLOCK
        assert_eq!(MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_CONTROL, 1);
        assert_eq!(MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_INPUT, 2);
        assert_eq!(MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_OUTPUT, 3);

        assert_eq!(MMAL_STATUS_T_MMAL_SUCCESS, 0);
        assert_eq!(MMAL_STATUS_T_MMAL_EFAULT, 15);
    }

    #[test]
    fn test_parameter_ids() {
        assert_eq!(MMAL_PARAMETER_ZERO_COPY, 4);
        assert_eq!(MMAL_PARAMETER_CAMERA_NUM, 0x1_0010);
        assert_eq!(MMAL_PARAMETER_CAMERA_INFO, 0x1_001c);
    }
}
