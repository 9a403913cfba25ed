//! Timed process loopback capture from the command line.
//!
//! ```text
//! loopback-capture <pid> <includetree|excludetree> <output> [--duration 10]
//! ```
//!
//! `<pid>` 0 captures system-wide. The output file receives raw
//! interleaved PCM frames.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use loopback_capture_core::CaptureController;

#[cfg(target_os = "windows")]
use loopback_capture_windows::ProcessLoopbackEngine as PlatformEngine;
#[cfg(not(target_os = "windows"))]
use loopback_capture_windows::UnsupportedEngine as PlatformEngine;

/// Capture the audio rendered by a process into a raw PCM file.
#[derive(Parser)]
#[command(name = "loopback-capture", version, about)]
struct Cli {
    /// Target process id; 0 captures system-wide.
    process_id: i32,

    /// Whether the target's child processes are included.
    #[arg(value_enum)]
    tree: TreeMode,

    /// Output file receiving raw PCM frames.
    output: String,

    /// Capture duration in seconds.
    #[arg(long, default_value_t = 10)]
    duration: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum TreeMode {
    /// Capture the process and its child processes.
    Includetree,
    /// Capture everything except the process and its children.
    Excludetree,
}

#[cfg(target_os = "windows")]
fn platform_engine() -> PlatformEngine {
    PlatformEngine::new(loopback_capture_core::CaptureFormat::default())
}

#[cfg(not(target_os = "windows"))]
fn platform_engine() -> PlatformEngine {
    PlatformEngine::new()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let include_tree = matches!(cli.tree, TreeMode::Includetree);

    let controller = CaptureController::new(platform_engine());

    if let Err(err) = controller.start(cli.process_id, include_tree, &cli.output) {
        eprintln!("failed to start capture: {err}");
        return ExitCode::FAILURE;
    }

    println!("Capturing {} seconds of audio.", cli.duration);
    thread::sleep(Duration::from_secs(cli.duration));

    match controller.stop() {
        Ok(()) => {
            println!("Finished.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to stop capture: {err}");
            ExitCode::FAILURE
        }
    }
}
