use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::encoding;
use crate::models::error::CaptureError;
use crate::models::session::CaptureSession;
use crate::models::state::CaptureState;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_engine::CaptureEngine;

/// Mutable controller state, protected by `parking_lot::Mutex`.
///
/// The engine handle lives inside the guard: engines are only ever
/// called on the serialized path.
struct ControllerInner<E: CaptureEngine> {
    engine: E,
    session: Option<CaptureSession>,
}

/// Capture control facade owning one engine handle and at most one live
/// session.
///
/// `start` and `stop` submit asynchronous requests to the injected
/// [`CaptureEngine`] and return the engine's acceptance or rejection,
/// not capture completion. Concurrent callers serialize on the internal
/// guard; every session mutation happens under it. Delegate callbacks
/// fire after the guard is released, in transition order.
///
/// ```text
/// idle → starting → running → stopping → stopped
///            ↓                    ↓
///            └─────→ failed ←─────┘       stopped/failed → start again
/// ```
pub struct CaptureController<E: CaptureEngine> {
    inner: Mutex<ControllerInner<E>>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl<E: CaptureEngine> CaptureController<E> {
    pub fn new(engine: E) -> Self {
        Self {
            inner: Mutex::new(ControllerInner {
                engine,
                session: None,
            }),
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Snapshot of the session state. `Idle` when no session exists.
    pub fn state(&self) -> CaptureState {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.state.clone())
            .unwrap_or(CaptureState::Idle)
    }

    /// Snapshot of the current session, if one was ever started.
    pub fn session(&self) -> Option<CaptureSession> {
        self.inner.lock().session.clone()
    }

    /// Submit an asynchronous start request.
    ///
    /// `process_id` must be non-negative; 0 requests system-wide capture.
    /// `output_path` is converted losslessly to the wide representation
    /// the engine requires before anything is mutated; a path that cannot
    /// be converted leaves the previous state untouched.
    ///
    /// Exactly one engine start is issued per successful call. On engine
    /// rejection the session lands in `Failed`, from which a new start
    /// is always permitted.
    pub fn start(
        &self,
        process_id: i32,
        include_process_tree: bool,
        output_path: &str,
    ) -> Result<(), CaptureError> {
        let mut transitions = Vec::new();
        let result = self.start_locked(process_id, include_process_tree, output_path, &mut transitions);
        self.notify(&transitions, result.as_ref().err());
        result
    }

    /// Submit an asynchronous stop request.
    ///
    /// Permitted while `Running` or `Starting` (a stop during start is
    /// forwarded to the engine as a cancellation). Idempotent once the
    /// session is terminal; `NoActiveSession` when no session exists.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let mut transitions = Vec::new();
        let result = self.stop_locked(&mut transitions);
        self.notify(&transitions, result.as_ref().err());
        result
    }

    fn start_locked(
        &self,
        process_id: i32,
        include_process_tree: bool,
        output_path: &str,
        transitions: &mut Vec<CaptureState>,
    ) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();

        if let Some(session) = &inner.session {
            if !session.state.permits_new_start() {
                return Err(CaptureError::AlreadyRunning);
            }
        }

        if process_id < 0 {
            return Err(CaptureError::InvalidArgument(format!(
                "process id must be non-negative, got {process_id}"
            )));
        }
        if output_path.is_empty() {
            return Err(CaptureError::InvalidArgument("output path is empty".into()));
        }

        let wide = encoding::to_wide(output_path)?;

        // Validation passed: the prior terminal session is replaced now.
        inner.session = Some(CaptureSession::starting(
            process_id as u32,
            include_process_tree,
            PathBuf::from(output_path),
        ));
        transitions.push(CaptureState::Starting);
        log::debug!("capture session starting (pid {process_id}, tree {include_process_tree})");

        let status = inner
            .engine
            .start_capture_async(process_id as u32, include_process_tree, &wide);

        if status.is_accepted() {
            Self::set_session_state(&mut inner, transitions, CaptureState::Running);
            Ok(())
        } else {
            let error = CaptureError::EngineRejected(status.0);
            log::error!("engine rejected start for pid {process_id}: status {}", status.0);
            Self::set_session_state(&mut inner, transitions, CaptureState::Failed(error.clone()));
            Err(error)
        }
    }

    fn stop_locked(&self, transitions: &mut Vec<CaptureState>) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();

        let Some(session) = &inner.session else {
            return Err(CaptureError::NoActiveSession);
        };

        match session.state {
            // Terminal sessions have no engine activity left to cancel.
            CaptureState::Stopped | CaptureState::Failed(_) => return Ok(()),
            // A stop is already underway on another caller's behalf.
            CaptureState::Stopping => return Ok(()),
            CaptureState::Idle => return Err(CaptureError::NoActiveSession),
            CaptureState::Starting | CaptureState::Running => {}
        }

        Self::set_session_state(&mut inner, transitions, CaptureState::Stopping);

        let status = inner.engine.stop_capture_async();

        if status.is_accepted() {
            Self::set_session_state(&mut inner, transitions, CaptureState::Stopped);
            Ok(())
        } else {
            let error = CaptureError::EngineRejected(status.0);
            log::error!("engine rejected stop: status {}", status.0);
            Self::set_session_state(&mut inner, transitions, CaptureState::Failed(error.clone()));
            Err(error)
        }
    }

    fn set_session_state(
        inner: &mut ControllerInner<E>,
        transitions: &mut Vec<CaptureState>,
        state: CaptureState,
    ) {
        if let Some(session) = &mut inner.session {
            log::debug!("capture state {:?} -> {:?}", session.state, state);
            session.state = state.clone();
            transitions.push(state);
        }
    }

    fn notify(&self, transitions: &[CaptureState], error: Option<&CaptureError>) {
        let Some(delegate) = &self.delegate else {
            return;
        };
        for state in transitions {
            delegate.on_state_changed(state);
        }
        if let Some(error) = error {
            delegate.on_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::WidePath;
    use crate::traits::capture_engine::EngineStatus;

    /// Scripted engine recording every call it receives.
    #[derive(Default)]
    struct CallLog {
        starts: Vec<(u32, bool, String)>,
        stops: usize,
    }

    struct ScriptedEngine {
        start_status: i32,
        stop_status: i32,
        log: Arc<Mutex<CallLog>>,
    }

    impl CaptureEngine for ScriptedEngine {
        fn start_capture_async(
            &mut self,
            process_id: u32,
            include_process_tree: bool,
            output_path: &WidePath,
        ) -> EngineStatus {
            let path = String::from_utf16(output_path.as_units()).unwrap();
            self.log.lock().starts.push((process_id, include_process_tree, path));
            EngineStatus(self.start_status)
        }

        fn stop_capture_async(&mut self) -> EngineStatus {
            self.log.lock().stops += 1;
            EngineStatus(self.stop_status)
        }
    }

    fn controller(start_status: i32, stop_status: i32) -> (CaptureController<ScriptedEngine>, Arc<Mutex<CallLog>>) {
        let log = Arc::new(Mutex::new(CallLog::default()));
        let engine = ScriptedEngine {
            start_status,
            stop_status,
            log: Arc::clone(&log),
        };
        (CaptureController::new(engine), log)
    }

    #[test]
    fn starts_idle() {
        let (controller, _) = controller(0, 0);
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(controller.session().is_none());
    }

    #[test]
    fn start_then_stop_happy_path() {
        let (controller, log) = controller(0, 0);

        assert!(controller.start(1234, true, "C:\\out\\clip.wav").is_ok());
        assert_eq!(controller.state(), CaptureState::Running);

        assert!(controller.stop().is_ok());
        assert_eq!(controller.state(), CaptureState::Stopped);

        let log = log.lock();
        assert_eq!(log.starts, vec![(1234, true, "C:\\out\\clip.wav".to_string())]);
        assert_eq!(log.stops, 1);
    }

    #[test]
    fn pid_zero_requests_system_wide_capture() {
        let (controller, log) = controller(0, 0);

        assert!(controller.start(0, false, "/tmp/out.pcm").is_ok());
        assert_eq!(log.lock().starts[0].0, 0);
    }

    #[test]
    fn start_while_running_is_rejected_without_touching_session() {
        let (controller, log) = controller(0, 0);

        controller.start(1234, true, "C:\\out\\clip.wav").unwrap();
        let before = controller.session().unwrap();

        assert_eq!(
            controller.start(5678, false, "C:\\other.wav"),
            Err(CaptureError::AlreadyRunning)
        );
        assert_eq!(controller.session().unwrap(), before);
        assert_eq!(log.lock().starts.len(), 1);
    }

    #[test]
    fn stop_while_idle_reports_no_active_session() {
        let (controller, log) = controller(0, 0);

        assert_eq!(controller.stop(), Err(CaptureError::NoActiveSession));
        assert_eq!(log.lock().stops, 0);
    }

    #[test]
    fn stop_twice_is_idempotent() {
        let (controller, log) = controller(0, 0);

        controller.start(1234, true, "C:\\out\\clip.wav").unwrap();
        controller.stop().unwrap();

        assert!(controller.stop().is_ok());
        assert_eq!(controller.state(), CaptureState::Stopped);
        assert_eq!(log.lock().stops, 1);
    }

    #[test]
    fn negative_pid_and_empty_path_are_rejected_before_the_engine() {
        let (controller, log) = controller(0, 0);

        assert!(matches!(
            controller.start(-1, false, ""),
            Err(CaptureError::InvalidArgument(_))
        ));
        assert!(matches!(
            controller.start(-1, false, "C:\\out.wav"),
            Err(CaptureError::InvalidArgument(_))
        ));
        assert!(matches!(
            controller.start(1234, false, ""),
            Err(CaptureError::InvalidArgument(_))
        ));

        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(log.lock().starts.is_empty());
    }

    #[test]
    fn unconvertible_path_leaves_state_unchanged() {
        let (controller, log) = controller(0, 0);

        assert!(matches!(
            controller.start(1234, true, "C:\\out\0clip.wav"),
            Err(CaptureError::EncodingError(_))
        ));
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(log.lock().starts.is_empty());

        // Same outcome from a terminal state: the stopped session survives.
        controller.start(1234, true, "C:\\out\\clip.wav").unwrap();
        controller.stop().unwrap();
        assert!(controller.start(1234, true, "bad\0path").is_err());
        assert_eq!(controller.state(), CaptureState::Stopped);
    }

    #[test]
    fn engine_rejection_of_start_is_surfaced_verbatim() {
        // 0x80004005 (E_FAIL) as an engine would report it.
        let hresult = -2147467259;
        let (controller, _) = controller(hresult, 0);

        let err = controller.start(1234, true, "C:\\out\\clip.wav").unwrap_err();
        assert_eq!(err, CaptureError::EngineRejected(hresult));
        assert_eq!(err.status_code(), hresult);
        assert_eq!(controller.state(), CaptureState::Failed(err));
    }

    #[test]
    fn failed_start_permits_a_new_start() {
        let (controller, log) = controller(7, 0);

        assert!(controller.start(1234, true, "C:\\out\\clip.wav").is_err());
        assert!(controller.state().permits_new_start());

        // Engine recovers; the next start goes through.
        log.lock().starts.clear();
        controller.inner.lock().engine.start_status = 0;
        assert!(controller.start(1234, true, "C:\\out\\clip.wav").is_ok());
        assert_eq!(controller.state(), CaptureState::Running);
    }

    #[test]
    fn engine_rejection_of_stop_leaves_failed_then_restart_works() {
        let (controller, _) = controller(0, 11);

        controller.start(1234, true, "C:\\out\\clip.wav").unwrap();
        assert_eq!(controller.stop(), Err(CaptureError::EngineRejected(11)));
        assert!(matches!(controller.state(), CaptureState::Failed(_)));

        controller.inner.lock().engine.stop_status = 0;
        assert!(controller.start(1234, true, "C:\\out\\clip.wav").is_ok());
        assert!(controller.stop().is_ok());
    }

    #[test]
    fn facade_codes_stay_out_of_the_engine_space() {
        assert_eq!(CaptureError::InvalidArgument(String::new()).status_code(), -1);
        assert_eq!(CaptureError::EncodingError(String::new()).status_code(), -2);
        assert_eq!(CaptureError::AlreadyRunning.status_code(), -3);
        assert_eq!(CaptureError::NoActiveSession.status_code(), -4);

        // Engine codes used in this suite: small positives and HRESULTs.
        for engine_code in [7, 11, -2147467259] {
            assert!(!(-9..=-1).contains(&engine_code));
        }
    }

    struct RecordingDelegate {
        states: Mutex<Vec<CaptureState>>,
        errors: Mutex<Vec<CaptureError>>,
    }

    impl CaptureDelegate for RecordingDelegate {
        fn on_state_changed(&self, state: &CaptureState) {
            self.states.lock().push(state.clone());
        }

        fn on_error(&self, error: &CaptureError) {
            self.errors.lock().push(error.clone());
        }
    }

    #[test]
    fn delegate_observes_transitions_in_order() {
        let (mut controller, _) = controller(0, 0);
        let delegate = Arc::new(RecordingDelegate {
            states: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        });
        controller.set_delegate(Arc::clone(&delegate) as Arc<dyn CaptureDelegate>);

        controller.start(1234, true, "C:\\out\\clip.wav").unwrap();
        controller.stop().unwrap();

        assert_eq!(
            *delegate.states.lock(),
            vec![
                CaptureState::Starting,
                CaptureState::Running,
                CaptureState::Stopping,
                CaptureState::Stopped,
            ]
        );
        assert!(delegate.errors.lock().is_empty());
    }

    #[test]
    fn delegate_sees_errors() {
        let (mut controller, _) = controller(7, 0);
        let delegate = Arc::new(RecordingDelegate {
            states: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        });
        controller.set_delegate(Arc::clone(&delegate) as Arc<dyn CaptureDelegate>);

        let _ = controller.start(1234, true, "C:\\out\\clip.wav");

        assert_eq!(*delegate.errors.lock(), vec![CaptureError::EngineRejected(7)]);
        assert_eq!(
            *delegate.states.lock(),
            vec![
                CaptureState::Starting,
                CaptureState::Failed(CaptureError::EngineRejected(7)),
            ]
        );
    }
}
