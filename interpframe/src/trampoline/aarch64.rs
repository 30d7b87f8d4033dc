//! AArch64 entry trampolines.
//!
//! AAPCS64: callback arrives in x0, the opaque argument in x1. Unlike
//! x86_64 the return address lives in a register, so the one stack
//! adjustment is a pre-indexed store of the frame record (x29/x30) with the
//! interpreter record in the 16 bytes above it.

use std::ffi::c_void;
use std::mem;

use crate::registry::AddressRange;
use crate::state::InterpreterState;
use crate::trampoline::EntryCallback;

pub(crate) const MARKER_FRAMES: bool = true;

/// The record sits above the saved x29/x30 pair.
pub(crate) const STACK_PADDING: usize = 16;

/// Bytes of the reservation available to the record itself.
const STATE_SPACE: usize = 16;

const _: () = assert!(
    mem::size_of::<InterpreterState>() <= STATE_SPACE,
    "record outgrew the trampoline reservation; update the assembly below"
);

#[cfg(target_os = "linux")]
core::arch::global_asm!(
    ".pushsection .text",
    ".p2align 2",
    ".globl enter_interp_frame_raw",
    ".type enter_interp_frame_raw, %function",
    "enter_interp_frame_raw:",
    ".cfi_startproc",
    "stp x29, x30, [sp, #-32]!",
    ".cfi_def_cfa_offset 32",
    ".cfi_offset w29, -32",
    ".cfi_offset w30, -24",
    "mov x29, sp",
    "mov x9, x0",
    "add x0, sp, #16",
    // source word reads as not-entered before the callback can run
    "str xzr, [sp, #16]",
    ".globl interp_entry_call_start",
    "interp_entry_call_start:",
    "blr x9",
    ".globl interp_entry_call_end",
    "interp_entry_call_end:",
    "ldp x29, x30, [sp], #32",
    ".cfi_def_cfa_offset 0",
    ".cfi_restore w30",
    ".cfi_restore w29",
    "ret",
    ".cfi_endproc",
    ".size enter_interp_frame_raw, . - enter_interp_frame_raw",
    ".popsection",
);

// Same body as ELF. The span labels are alt entries so
// subsections-via-symbols does not split the unwind region at them, and the
// epilogue leaves the CFA directives out because the compact unwind encoder
// mishandles them.
#[cfg(target_vendor = "apple")]
core::arch::global_asm!(
    ".section __TEXT,__text,regular,pure_instructions",
    ".p2align 2",
    ".globl _enter_interp_frame_raw",
    "_enter_interp_frame_raw:",
    ".cfi_startproc",
    "stp x29, x30, [sp, #-32]!",
    ".cfi_def_cfa_offset 32",
    ".cfi_offset w29, -32",
    ".cfi_offset w30, -24",
    "mov x29, sp",
    "mov x9, x0",
    "add x0, sp, #16",
    "str xzr, [sp, #16]",
    ".private_extern _interp_entry_call_start",
    ".alt_entry _interp_entry_call_start",
    "_interp_entry_call_start:",
    "blr x9",
    ".private_extern _interp_entry_call_end",
    ".alt_entry _interp_entry_call_end",
    "_interp_entry_call_end:",
    "ldp x29, x30, [sp], #32",
    "ret",
    ".cfi_endproc",
);

unsafe extern "C-unwind" {
    #[link_name = "enter_interp_frame_raw"]
    pub(crate) fn enter_raw(callback: EntryCallback, arg: *mut c_void) -> *mut c_void;
}

pub(crate) fn call_span() -> Option<AddressRange> {
    unsafe extern "C" {
        #[link_name = "interp_entry_call_start"]
        static CALL_START: u8;
        #[link_name = "interp_entry_call_end"]
        static CALL_END: u8;
    }
    let start = unsafe { (&raw const CALL_START) as usize };
    let end = unsafe { (&raw const CALL_END) as usize };
    Some(AddressRange::new(start, end))
}
