//! # loopback-capture-core
//!
//! Platform-agnostic capture control facade.
//!
//! Owns the capture session state machine and all boundary validation;
//! the actual audio capture is performed by an injected engine
//! implementing the [`CaptureEngine`] trait. Platform backends
//! (Windows process loopback) live in `loopback-capture-windows` and
//! plug into the generic [`CaptureController`].
//!
//! ## Architecture
//!
//! ```text
//! loopback-capture-core (this crate)
//! ├── traits/     ← CaptureEngine, CaptureDelegate
//! ├── models/     ← CaptureError, CaptureState, CaptureSession, CaptureFormat
//! ├── encoding    ← lossless narrow → wide path conversion
//! └── controller  ← CaptureController (serialized start/stop facade)
//! ```

pub mod controller;
pub mod encoding;
pub mod models;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use controller::CaptureController;
pub use encoding::{to_wide, WidePath};
pub use models::error::{CaptureError, STATUS_OK};
pub use models::format::CaptureFormat;
pub use models::session::CaptureSession;
pub use models::state::CaptureState;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_engine::{CaptureEngine, EngineStatus};
