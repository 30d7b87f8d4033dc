//! Interpreter frame visibility for native unwinders.
//!
//! A native stack unwinder (a crash reporter, profiler, or debugger walking
//! frame-pointer chains or call-frame information) sees an interpreter's
//! evaluation loop as opaque internal frames, with no way to recover which
//! interpreted unit was executing where. This crate provides the mechanism
//! that makes those frames legible:
//!
//! - [`enter_interpreter_frame`] wraps every nested entry into the
//!   evaluator, leaving a fixed-layout [`InterpreterState`] record on the
//!   native stack via a per-architecture assembly trampoline;
//! - [`is_interpreter_frame`] and [`is_entry_trampoline_frame`] classify a
//!   sampled instruction pointer against process-wide address ranges
//!   resolved from linker section boundaries (see [`dispatch_section!`]);
//! - [`capture_interp_frame`] converts a sampled stack pointer into a
//!   portable `[FRAME_SENTINEL, src, ip]` tuple any downstream symbolizer
//!   can interpret.
//!
//! The crate never executes interpreted code, never walks the native stack,
//! and never formats backtraces; those belong to its collaborators. Targets
//! without assembly support compile to a fallback that keeps execution
//! correct and merely loses backtrace visibility; interpreter correctness
//! never depends on backtrace support.

mod capture;
mod registry;
mod state;
mod trampoline;

pub use capture::{CAPTURED_ENTRY_SLOTS, FRAME_SENTINEL, capture_interp_frame};
pub use registry::{
    AddressRange, dispatch_range, init, is_entry_trampoline_frame, is_interpreter_frame,
    trampoline_span,
};
pub use state::{InterpreterState, NOT_ENTERED};
pub use trampoline::{
    EntryCallback, STACK_PADDING, enter_interp_frame_raw, enter_interpreter_frame,
};

/// Whether this target carries marker frames a sampler can recover.
///
/// False means the fallback path is in use: entry behaves identically, the
/// classifiers return false, and capture yields no frames.
pub const fn marker_frames_supported() -> bool {
    trampoline::MARKER_FRAMES
}
