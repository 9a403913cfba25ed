use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Observer for controller state transitions.
///
/// Notified after the session guard is released, in transition order.
/// Callbacks run on the caller's thread; implementations should return
/// quickly.
pub trait CaptureDelegate: Send + Sync {
    /// Called for every session state change.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called when a start or stop request fails.
    fn on_error(&self, error: &CaptureError);
}
