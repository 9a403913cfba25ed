//! # loopback-capture-ffi
//!
//! C-callable control surface over [`CaptureController`].
//!
//! Exports `StartCapture`, `StopCapture`, and `GetCaptureState` against a
//! single process-wide controller, constructed explicitly on first use.
//! Consumers embedding the Rust crates directly should instantiate
//! [`CaptureController`] themselves instead of going through this shim.
//!
//! ## Status codes
//!
//! `0` is success. `-1..=-9` are facade codes (invalid argument, encoding
//! failure, session misuse). Anything else is the engine's own code,
//! surfaced verbatim.

#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::ffi::{c_char, CStr};
use std::sync::OnceLock;

use loopback_capture_core::{CaptureController, CaptureError, STATUS_OK};

#[cfg(target_os = "windows")]
use loopback_capture_windows::ProcessLoopbackEngine as PlatformEngine;
#[cfg(not(target_os = "windows"))]
use loopback_capture_windows::UnsupportedEngine as PlatformEngine;

static CONTROLLER: OnceLock<CaptureController<PlatformEngine>> = OnceLock::new();

fn controller() -> &'static CaptureController<PlatformEngine> {
    CONTROLLER.get_or_init(|| CaptureController::new(platform_engine()))
}

#[cfg(target_os = "windows")]
fn platform_engine() -> PlatformEngine {
    PlatformEngine::new(loopback_capture_core::CaptureFormat::default())
}

#[cfg(not(target_os = "windows"))]
fn platform_engine() -> PlatformEngine {
    PlatformEngine::new()
}

/// Start capturing the audio rendered by `process_id` (0 = system-wide)
/// into `output_path`, optionally including the target's process tree.
///
/// `output_path` must be a NUL-terminated narrow string. It is converted
/// losslessly to the platform's wide representation; a path that cannot
/// be converted is reported, never truncated. Returns `0` once the
/// engine has accepted the request.
#[no_mangle]
pub extern "C" fn StartCapture(
    process_id: i32,
    include_process_tree: bool,
    output_path: *const c_char,
) -> i32 {
    if output_path.is_null() {
        return CaptureError::InvalidArgument("output path is null".into()).status_code();
    }

    // SAFETY: non-null; the caller guarantees NUL termination.
    let narrow = unsafe { CStr::from_ptr(output_path) };
    let path = match narrow.to_str() {
        Ok(path) => path,
        Err(_) => {
            return CaptureError::EncodingError("output path is not valid UTF-8".into())
                .status_code()
        }
    };

    match controller().start(process_id, include_process_tree, path) {
        Ok(()) => STATUS_OK,
        Err(err) => err.status_code(),
    }
}

/// Stop the running capture. Idempotent once the session has ended;
/// returns `0` on acceptance.
#[no_mangle]
pub extern "C" fn StopCapture() -> i32 {
    match controller().stop() {
        Ok(()) => STATUS_OK,
        Err(err) => err.status_code(),
    }
}

/// Current session state: 0 idle, 1 starting, 2 running, 3 stopping,
/// 4 stopped, 5 failed.
#[no_mangle]
pub extern "C" fn GetCaptureState() -> i32 {
    controller().state().as_code()
}
