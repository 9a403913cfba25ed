use std::path::PathBuf;

use super::state::CaptureState;

/// A single capture session owned by a controller.
///
/// Created on `start` in the `Starting` state; replaced only after it
/// reaches a terminal state. At most one exists per controller.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    /// Target process id. 0 requests system-wide capture.
    pub target_process_id: u32,

    /// Whether the target's child processes are included in the capture.
    pub include_process_tree: bool,

    /// Destination the engine writes captured audio to.
    pub output_destination: PathBuf,

    pub state: CaptureState,
}

impl CaptureSession {
    pub(crate) fn starting(
        target_process_id: u32,
        include_process_tree: bool,
        output_destination: PathBuf,
    ) -> Self {
        Self {
            target_process_id,
            include_process_tree,
            output_destination,
            state: CaptureState::Starting,
        }
    }
}
