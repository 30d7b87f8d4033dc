//! Entry trampoline establishing a marker frame around the evaluator.
//!
//! Every nested invocation of the evaluator goes through
//! [`enter_interpreter_frame`]. The trampoline reserves room for one
//! [`InterpreterState`] on the native stack with a single stack-pointer
//! adjustment, zeroes its source word before anything else can run, swaps
//! the record pointer into the first-argument register, and calls the
//! evaluator's callback indirectly. The adjustment is described by ordinary
//! unwind metadata, so a frame-pointer or CFI-based unwinder steps over the
//! frame with no special casing; the classification predicates supply the
//! semantic interpretation.
//!
//! One assembly variant exists per supported architecture and ABI. Targets
//! without one use the fallback, which executes identically but leaves no
//! marker for samplers to find.

use std::ffi::c_void;

use crate::registry::AddressRange;
use crate::state::InterpreterState;

/// ABI of the callback the trampoline invokes.
///
/// The callback receives the freshly zeroed stack-resident record and the
/// caller's opaque argument; its return value is forwarded unchanged.
pub type EntryCallback =
    extern "C-unwind" fn(*mut InterpreterState, *mut c_void) -> *mut c_void;

cfg_if::cfg_if! {
    if #[cfg(all(
        target_arch = "x86_64",
        any(
            target_os = "linux",
            target_os = "freebsd",
            target_vendor = "apple",
            target_os = "windows",
        ),
    ))] {
        mod x86_64;
        use x86_64 as arch;
    } else if #[cfg(all(
        target_arch = "aarch64",
        any(target_os = "linux", target_vendor = "apple"),
    ))] {
        mod aarch64;
        use aarch64 as arch;
    } else {
        mod fallback;
        use fallback as arch;
    }
}

/// Byte distance from the stack pointer a sampler observes at a trampoline
/// frame to the first byte of that frame's [`InterpreterState`] record.
pub const STACK_PADDING: usize = arch::STACK_PADDING;

/// Whether this target has an assembly trampoline, and therefore marker
/// frames a sampler can recover.
pub(crate) const MARKER_FRAMES: bool = arch::MARKER_FRAMES;

/// Range of the instructions bracketing the trampoline's indirect call.
pub(crate) fn call_span() -> Option<AddressRange> {
    arch::call_span()
}

/// Invokes `callback(record, arg)` with a freshly reserved, zeroed,
/// stack-resident [`InterpreterState`] and forwards the callback's return
/// value.
///
/// This is the raw ABI the assembly implements; [`enter_interpreter_frame`]
/// is the safe surface over it.
///
/// # Safety
///
/// `callback` must treat the record pointer as valid only for the duration
/// of the call, and `arg` must be whatever `callback` expects.
pub unsafe fn enter_interp_frame_raw(callback: EntryCallback, arg: *mut c_void) -> *mut c_void {
    unsafe { arch::enter_raw(callback, arg) }
}

struct Payload<F, R> {
    f: Option<F>,
    result: Option<R>,
}

/// Runs `f` inside a nested interpreter frame.
///
/// The closure receives the record for this invocation; the evaluator stamps
/// it on every step, and the record disappears when the call returns. The
/// closure's result is forwarded exactly, on every implementation including
/// the degraded one.
pub fn enter_interpreter_frame<F, R>(f: F) -> R
where
    F: FnOnce(&mut InterpreterState) -> R,
{
    extern "C-unwind" fn shim<F, R>(state: *mut InterpreterState, arg: *mut c_void) -> *mut c_void
    where
        F: FnOnce(&mut InterpreterState) -> R,
    {
        let payload = unsafe { &mut *arg.cast::<Payload<F, R>>() };
        let f = payload.f.take().expect("entry callback runs once per frame");
        let state = unsafe { &mut *state };
        payload.result = Some(f(state));
        arg
    }

    let mut payload: Payload<F, R> = Payload {
        f: Some(f),
        result: None,
    };
    unsafe { enter_interp_frame_raw(shim::<F, R>, (&raw mut payload).cast()) };
    payload
        .result
        .take()
        .expect("trampoline always runs the callback")
}
