use super::error::CaptureError;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → starting → running → stopping → stopped
///            ↓                    ↓
///            └─────→ failed ←─────┘
/// ```
///
/// `Stopped` and `Failed` are both terminal and both permit a new start.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed(_))
    }

    /// Whether a new session may be started from this state.
    pub fn permits_new_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped | Self::Failed(_))
    }

    /// Numeric projection used by the C boundary (`GetCaptureState`).
    pub fn as_code(&self) -> i32 {
        match self {
            Self::Idle => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
            Self::Stopped => 4,
            Self::Failed(_) => 5,
        }
    }
}
