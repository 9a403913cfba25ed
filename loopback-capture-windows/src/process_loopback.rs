//! Process loopback capture engine.
//!
//! Captures the audio rendered by a target process (and optionally its
//! child processes) by activating `IAudioClient` on the process-loopback
//! virtual audio device. Requires Windows 10 2004+.
//!
//! The capture thread appends raw interleaved PCM frames to the output
//! file; packaging the stream (WAV or otherwise) is the consumer's
//! concern. DRM-protected audio arrives silenced.

use std::fs::File;
use std::io::Write;
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use windows::core::{implement, IUnknown, Interface, Ref, HRESULT, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::StructuredStorage::{
    PROPVARIANT, PROPVARIANT_0, PROPVARIANT_0_0, PROPVARIANT_0_0_0,
};
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, BLOB, COINIT_MULTITHREADED};
use windows::Win32::System::Threading::*;
use windows::Win32::System::Variant::VT_BLOB;

use loopback_capture_core::{CaptureEngine, CaptureFormat, EngineStatus, WidePath};

/// Status codes in this engine's space. Positive, so the facade's
/// reserved band `-1..=-9` stays free.
pub mod status {
    pub const ACCEPTED: i32 = 0;
    pub const INVALID_PATH: i32 = 1;
    pub const BUSY: i32 = 2;
    pub const INVALID_FORMAT: i32 = 4;
    pub const DEVICE: i32 = 6;
    pub const ACTIVATION: i32 = 7;
    pub const INITIALIZE: i32 = 8;
    pub const SERVICE: i32 = 9;
    pub const START: i32 = 10;
    pub const EVENT: i32 = 12;
    pub const INTERFACE: i32 = 13;
    pub const THREAD: i32 = 14;
    pub const OUTPUT: i32 = 15;
    pub const STREAM: i32 = 16;
}

/// Thread-side failure: the status stored in `last_error` plus its cause.
#[derive(Debug, Error)]
#[error("{detail}")]
struct CaptureFailure {
    status: i32,
    detail: String,
}

impl CaptureFailure {
    fn new(status: i32, cause: impl std::fmt::Display) -> Self {
        Self {
            status,
            detail: cause.to_string(),
        }
    }
}

/// Process loopback capture engine.
///
/// `start_capture_async` reports acceptance once the capture thread is
/// spawned; activation and streaming errors after that point are logged
/// and retrievable via [`last_error`](Self::last_error).
pub struct ProcessLoopbackEngine {
    format: CaptureFormat,
    running: Arc<AtomicBool>,
    last_error: Arc<AtomicI32>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ProcessLoopbackEngine {
    pub fn new(format: CaptureFormat) -> Self {
        Self {
            format,
            running: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(AtomicI32::new(status::ACCEPTED)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Status of the most recent thread-side failure, `ACCEPTED` when none.
    pub fn last_error(&self) -> i32 {
        self.last_error.load(Ordering::SeqCst)
    }
}

impl CaptureEngine for ProcessLoopbackEngine {
    fn start_capture_async(
        &mut self,
        process_id: u32,
        include_process_tree: bool,
        output_path: &WidePath,
    ) -> EngineStatus {
        if self.format.validate().is_err() {
            return EngineStatus(status::INVALID_FORMAT);
        }

        // Reap a capture thread left over from a previous run.
        if !self.running.load(Ordering::SeqCst) {
            if let Some(handle) = self.capture_handle.lock().take() {
                let _ = handle.join();
            }
        }

        if self.running.swap(true, Ordering::SeqCst) {
            return EngineStatus(status::BUSY);
        }

        let path = match String::from_utf16(output_path.as_units()) {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                return EngineStatus(status::INVALID_PATH);
            }
        };

        self.last_error.store(status::ACCEPTED, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let last_error = Arc::clone(&self.last_error);
        let format = self.format;

        let spawn = thread::Builder::new()
            .name("process-loopback-capture".into())
            .spawn(move || {
                if let Err(failure) = capture_loop(process_id, include_process_tree, format, &path, &running) {
                    log::error!(
                        "process loopback capture failed (status {}): {}",
                        failure.status,
                        failure
                    );
                    last_error.store(failure.status, Ordering::SeqCst);
                }
                running.store(false, Ordering::SeqCst);
            });

        match spawn {
            Ok(handle) => {
                *self.capture_handle.lock() = Some(handle);
                EngineStatus::ACCEPTED
            }
            Err(e) => {
                log::error!("failed to spawn capture thread: {}", e);
                self.running.store(false, Ordering::SeqCst);
                EngineStatus(status::THREAD)
            }
        }
    }

    fn stop_capture_async(&mut self) -> EngineStatus {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            let _ = handle.join();
        }
        EngineStatus::ACCEPTED
    }
}

/// Completion handler for `ActivateAudioInterfaceAsync`; signals the
/// capture thread once activation finishes.
#[implement(IActivateAudioInterfaceCompletionHandler)]
struct ActivationHandler {
    tx: mpsc::Sender<()>,
}

impl IActivateAudioInterfaceCompletionHandler_Impl for ActivationHandler_Impl {
    fn ActivateCompleted(
        &self,
        _operation: Ref<'_, IActivateAudioInterfaceAsyncOperation>,
    ) -> windows::core::Result<()> {
        let _ = self.tx.send(());
        Ok(())
    }
}

/// Activate `IAudioClient` on the process-loopback virtual device.
///
/// `ActivateAudioInterfaceAsync` completes on a COM worker thread; the
/// sender/receiver pair bridges back to the capture thread.
unsafe fn activate_process_loopback(
    process_id: u32,
    include_process_tree: bool,
) -> Result<IAudioClient, CaptureFailure> {
    let activation_params = AUDIOCLIENT_ACTIVATION_PARAMS {
        ActivationType: AUDIOCLIENT_ACTIVATION_TYPE_PROCESS_LOOPBACK,
        Anonymous: AUDIOCLIENT_ACTIVATION_PARAMS_0 {
            ProcessLoopbackParams: AUDIOCLIENT_PROCESS_LOOPBACK_PARAMS {
                TargetProcessId: process_id,
                ProcessLoopbackMode: if include_process_tree {
                    PROCESS_LOOPBACK_MODE_INCLUDE_TARGET_PROCESS_TREE
                } else {
                    PROCESS_LOOPBACK_MODE_EXCLUDE_TARGET_PROCESS_TREE
                },
            },
        },
    };

    // VT_BLOB PROPVARIANT pointing at the stack-held activation params.
    // Not PropVariantClear'd: the blob is not CoTaskMem-allocated.
    let prop = PROPVARIANT {
        Anonymous: PROPVARIANT_0 {
            Anonymous: ManuallyDrop::new(PROPVARIANT_0_0 {
                vt: VT_BLOB,
                wReserved1: 0,
                wReserved2: 0,
                wReserved3: 0,
                Anonymous: PROPVARIANT_0_0_0 {
                    blob: BLOB {
                        cbSize: std::mem::size_of::<AUDIOCLIENT_ACTIVATION_PARAMS>() as u32,
                        pBlobData: &activation_params as *const AUDIOCLIENT_ACTIVATION_PARAMS
                            as *mut u8,
                    },
                },
            }),
        },
    };

    let (tx, rx) = mpsc::channel();
    let handler: IActivateAudioInterfaceCompletionHandler = ActivationHandler { tx }.into();

    let operation = ActivateAudioInterfaceAsync(
        VIRTUAL_AUDIO_DEVICE_PROCESS_LOOPBACK,
        &IAudioClient::IID,
        Some(&prop),
        &handler,
    )
    .map_err(|e| CaptureFailure::new(status::DEVICE, e))?;

    rx.recv_timeout(Duration::from_secs(5))
        .map_err(|_| CaptureFailure::new(status::ACTIVATION, "activation callback never fired"))?;

    let mut activate_hr = HRESULT(0);
    let mut activated: Option<IUnknown> = None;
    operation
        .GetActivateResult(&mut activate_hr, &mut activated)
        .map_err(|e| CaptureFailure::new(status::ACTIVATION, e))?;
    activate_hr
        .ok()
        .map_err(|e| CaptureFailure::new(status::ACTIVATION, e))?;

    let unknown = activated
        .ok_or_else(|| CaptureFailure::new(status::ACTIVATION, "no activated interface returned"))?;
    unknown
        .cast::<IAudioClient>()
        .map_err(|e| CaptureFailure::new(status::INTERFACE, e))
}

/// Main capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Activate IAudioClient on the process-loopback device
/// 3. Initialize shared-mode with LOOPBACK | EVENTCALLBACK
/// 4. Get IAudioCaptureClient, register with MMCSS
/// 5. Start, drain buffers on the sample-ready event
fn capture_loop(
    process_id: u32,
    include_process_tree: bool,
    format: CaptureFormat,
    output_path: &Path,
    running: &AtomicBool,
) -> Result<(), CaptureFailure> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| CaptureFailure::new(status::INITIALIZE, format!("CoInitializeEx failed: {}", e)))?;

        let _com_guard = CoUninitializeGuard;

        let audio_client = activate_process_loopback(process_id, include_process_tree)?;

        let wfx = WAVEFORMATEX {
            wFormatTag: WAVE_FORMAT_PCM as u16,
            nChannels: format.channels,
            nSamplesPerSec: format.sample_rate,
            nAvgBytesPerSec: format.avg_bytes_per_sec(),
            nBlockAlign: format.block_align(),
            wBitsPerSample: format.bit_depth,
            cbSize: 0,
        };

        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_LOOPBACK
                    | AUDCLNT_STREAMFLAGS_EVENTCALLBACK
                    | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                    | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY,
                0,
                0,
                &wfx,
                None,
            )
            .map_err(|e| {
                CaptureFailure::new(status::INITIALIZE, format!("IAudioClient::Initialize failed: {}", e))
            })?;

        let sample_ready = CreateEventW(None, false, false, None)
            .map_err(|e| CaptureFailure::new(status::EVENT, format!("CreateEventW failed: {}", e)))?;
        let _event_guard = HandleGuard(sample_ready);

        audio_client
            .SetEventHandle(sample_ready)
            .map_err(|e| CaptureFailure::new(status::EVENT, format!("SetEventHandle failed: {}", e)))?;

        let capture_client: IAudioCaptureClient = audio_client
            .GetService()
            .map_err(|e| CaptureFailure::new(status::SERVICE, format!("GetService failed: {}", e)))?;

        let mut file = File::create(output_path)
            .map_err(|e| CaptureFailure::new(status::OUTPUT, format!("failed to create output file: {}", e)))?;

        // MMCSS registration for real-time priority
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let _mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);

        audio_client
            .Start()
            .map_err(|e| CaptureFailure::new(status::START, format!("IAudioClient::Start failed: {}", e)))?;

        let block_align = format.block_align() as usize;

        while running.load(Ordering::SeqCst) {
            // Wake at least every 50ms to observe the stop flag.
            if WaitForSingleObject(sample_ready, 50) != WAIT_OBJECT_0 {
                continue;
            }

            let mut packet_length = capture_client
                .GetNextPacketSize()
                .map_err(|e| CaptureFailure::new(status::STREAM, format!("GetNextPacketSize failed: {}", e)))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                capture_client
                    .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                    .map_err(|e| CaptureFailure::new(status::STREAM, format!("GetBuffer failed: {}", e)))?;

                if num_frames > 0 && !buffer_ptr.is_null() {
                    let byte_count = num_frames as usize * block_align;

                    let write_result = if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                        file.write_all(&vec![0u8; byte_count])
                    } else {
                        let data = std::slice::from_raw_parts(buffer_ptr, byte_count);
                        file.write_all(data)
                    };

                    if let Err(e) = write_result {
                        let _ = capture_client.ReleaseBuffer(num_frames);
                        let _ = audio_client.Stop();
                        return Err(CaptureFailure::new(
                            status::OUTPUT,
                            format!("failed to write captured audio: {}", e),
                        ));
                    }
                }

                capture_client
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| CaptureFailure::new(status::STREAM, format!("ReleaseBuffer failed: {}", e)))?;

                packet_length = capture_client
                    .GetNextPacketSize()
                    .map_err(|e| CaptureFailure::new(status::STREAM, format!("GetNextPacketSize failed: {}", e)))?;
            }
        }

        let _ = audio_client.Stop();
        let _ = file.flush();
    }

    Ok(())
}

struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

struct HandleGuard(HANDLE);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}
