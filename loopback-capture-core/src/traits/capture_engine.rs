use crate::encoding::WidePath;

/// Raw status returned by a capture engine. Zero is acceptance; any
/// other value is an engine-defined rejection code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus(pub i32);

impl EngineStatus {
    pub const ACCEPTED: EngineStatus = EngineStatus(0);

    pub fn is_accepted(self) -> bool {
        self.0 == 0
    }
}

/// Contract for the external capture engine.
///
/// The engine is an opaque capability: it performs the actual capture
/// (device activation, buffering, file output) and reports completion
/// through its own channel. The facade only submits requests.
///
/// Both operations are asynchronous submissions — they report acceptance
/// of the request, not completion of the capture — and both are invoked
/// only on the facade's serialized call path, so implementations never
/// see concurrent calls.
///
/// Rejection codes are surfaced to callers verbatim. The band `-1..=-9`
/// is reserved for facade-originated codes (see
/// [`crate::models::error::CaptureError::status_code`]); engines must
/// keep it free.
pub trait CaptureEngine: Send {
    /// Submit an asynchronous start request.
    ///
    /// `process_id` 0 requests system-wide capture; otherwise the render
    /// streams of the process (and, with `include_process_tree`, its
    /// children) are captured into `output_path`.
    fn start_capture_async(
        &mut self,
        process_id: u32,
        include_process_tree: bool,
        output_path: &WidePath,
    ) -> EngineStatus;

    /// Submit an asynchronous stop request for the running capture.
    fn stop_capture_async(&mut self) -> EngineStatus;
}
