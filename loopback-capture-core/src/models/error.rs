use thiserror::Error;

/// Status code returned across the C boundary when an operation succeeds.
pub const STATUS_OK: i32 = 0;

/// Errors surfaced by the capture facade.
///
/// Facade-originated variants project into the reserved status band
/// `-1..=-9`; `EngineRejected` carries the engine's own code verbatim
/// (see [`crate::traits::capture_engine::CaptureEngine`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("a capture session is already running")]
    AlreadyRunning,

    #[error("no active capture session")]
    NoActiveSession,

    #[error("engine rejected the request (status {0})")]
    EngineRejected(i32),
}

impl CaptureError {
    /// Project this error into the C boundary's status code space.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => -1,
            Self::EncodingError(_) => -2,
            Self::AlreadyRunning => -3,
            Self::NoActiveSession => -4,
            Self::EngineRejected(code) => *code,
        }
    }
}
