//! Fallback engine for non-Windows targets.
//!
//! Process loopback capture is a Windows facility. On other platforms
//! this engine rejects every request with [`STATUS_UNSUPPORTED`]; the
//! facade, FFI surface, and CLI link and run everywhere.

use loopback_capture_core::{CaptureEngine, EngineStatus, WidePath};

/// Status reported for every request on platforms without process
/// loopback support. Positive, outside the facade's reserved band.
pub const STATUS_UNSUPPORTED: i32 = 3;

#[derive(Debug, Default)]
pub struct UnsupportedEngine;

impl UnsupportedEngine {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureEngine for UnsupportedEngine {
    fn start_capture_async(
        &mut self,
        _process_id: u32,
        _include_process_tree: bool,
        _output_path: &WidePath,
    ) -> EngineStatus {
        EngineStatus(STATUS_UNSUPPORTED)
    }

    fn stop_capture_async(&mut self) -> EngineStatus {
        EngineStatus(STATUS_UNSUPPORTED)
    }
}
