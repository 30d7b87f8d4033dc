//! Interpreter frame probe.
//!
//! Exercises the marker pipeline in-process: resolves the classifier
//! ranges, enters nested interpreter frames, and runs the capture encoder
//! over each live record's sampler view. Diagnostic output only; no
//! symbolization and no native stack walking.

use std::process::ExitCode;

use anyhow::{Result, ensure};
use clap::Parser;
use interpframe::{
    CAPTURED_ENTRY_SLOTS, FRAME_SENTINEL, InterpreterState, STACK_PADDING, capture_interp_frame,
    enter_interpreter_frame, is_entry_trampoline_frame, is_interpreter_frame,
    marker_frames_supported,
};
use smallvec::SmallVec;
use tracing::{error, info, warn};

/// Captured words for a comfortably deep probe run stay inline.
type CapturedWords = SmallVec<[usize; 48]>;

#[derive(Parser, Debug)]
#[command(name = "interpframe", about = "Marker-frame self-check probe")]
struct Args {
    /// Nested interpreter entries to establish before capturing.
    #[arg(long, default_value_t = 4)]
    depth: usize,

    /// Only resolve and report the classifier ranges.
    #[arg(long)]
    ranges: bool,
}

fn main() -> ExitCode {
    let log_level = std::env::var("INTERPFRAME_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt().with_env_filter(log_level).init();

    println!("interpframe probe v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("probe failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    interpframe::init();
    report_ranges();
    if args.ranges {
        return Ok(ExitCode::SUCCESS);
    }
    ensure!(args.depth > 0, "depth must be at least 1");

    let words = descend(args.depth);
    let captured = words.len() / CAPTURED_ENTRY_SLOTS;
    if !marker_frames_supported() {
        warn!("degraded target: no frames captured by design");
        return Ok(ExitCode::SUCCESS);
    }
    if captured == args.depth {
        info!(captured, "all nested frames captured");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(captured, expected = args.depth, "capture mismatch");
        Ok(ExitCode::FAILURE)
    }
}

fn report_ranges() {
    match interpframe::dispatch_range() {
        Some(range) => {
            info!(%range, "dispatch body range");
            info!(
                marked = is_interpreter_frame(probe_dispatch as usize),
                unmarked = is_interpreter_frame(report_ranges as usize),
                "dispatch classification"
            );
        }
        None => warn!("section classification unsupported on this target"),
    }
    match interpframe::trampoline_span() {
        Some(span) => {
            info!(%span, classified = is_entry_trampoline_frame(span.start()), "entry trampoline span");
        }
        None => warn!("no assembly trampoline on this target; markers degraded"),
    }
}

interpframe::dispatch_section! {
    /// Stand-in for an evaluator's dispatch loop body.
    fn probe_dispatch() {}
}

/// Enters `depth` nested interpreter frames and captures each one on the way
/// back out, innermost first, the order an unwinder would produce.
fn descend(depth: usize) -> CapturedWords {
    let mut words = CapturedWords::new();
    level(depth, 1, &mut words);
    words
}

fn level(remaining: usize, unit: usize, words: &mut CapturedWords) {
    enter_interpreter_frame(|state| {
        state.set_source(unit);
        state.set_ip(remaining);
        if remaining > 1 {
            level(remaining - 1, unit + 1, words);
        }
        // Reconstruct the stack pointer a sampler would present for this
        // frame and capture through the same path an unwinder uses.
        let sp = (state as *mut InterpreterState as usize) - STACK_PADDING;
        let mut entry = [0usize; CAPTURED_ENTRY_SLOTS];
        let entry_len = entry.len();
        let n = unsafe { capture_interp_frame(&mut entry, sp, entry_len) };
        if n > 0 {
            let tagged = entry[0] == FRAME_SENTINEL;
            let (unit, ip) = (entry[1], entry[2]);
            info!(unit, ip, tagged, "captured interpreter frame");
            words.extend_from_slice(&entry);
        }
    });
}
