//! Degraded entry path for targets without trampoline assembly.
//!
//! Execution is identical to the assembly path; only sampler visibility is
//! lost. The classifiers return false and the capture encoder yields zero
//! frames, so an unwinder simply sees ordinary native frames.

use std::ffi::c_void;

use crate::registry::AddressRange;
use crate::state::InterpreterState;
use crate::trampoline::EntryCallback;

pub(crate) const MARKER_FRAMES: bool = false;

/// No marker frame exists, so there is no sampled-pointer-to-record offset.
pub(crate) const STACK_PADDING: usize = 0;

pub(crate) fn call_span() -> Option<AddressRange> {
    None
}

#[inline(never)]
pub(crate) unsafe extern "C-unwind" fn enter_raw(
    callback: EntryCallback,
    arg: *mut c_void,
) -> *mut c_void {
    let mut state = InterpreterState::new();
    callback(&raw mut state, arg)
}
