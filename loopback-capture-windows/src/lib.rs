//! # loopback-capture-windows
//!
//! Windows process-loopback capture engine for loopback-capture-kit.
//!
//! Provides:
//! - `ProcessLoopbackEngine` — `CaptureEngine` backed by
//!   `ActivateAudioInterfaceAsync` on the process-loopback virtual device
//! - `UnsupportedEngine` — non-Windows fallback that rejects every request
//!
//! ## Platform Requirements
//! - Windows 10 2004+ (build 19041) for process loopback activation
//! - Visual Studio Build Tools + Windows SDK for linking

#[cfg(target_os = "windows")]
pub mod process_loopback;

#[cfg(target_os = "windows")]
pub use process_loopback::ProcessLoopbackEngine;

#[cfg(not(target_os = "windows"))]
pub mod unsupported;

#[cfg(not(target_os = "windows"))]
pub use unsupported::UnsupportedEngine;
