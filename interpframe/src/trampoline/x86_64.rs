//! x86_64 entry trampolines.
//!
//! One variant per ABI in force: System V (Linux, FreeBSD), Apple (System V
//! with Mach-O symbol and unwind-encoding quirks), and Windows x64. Each
//! variant reserves the record with a single stack-pointer adjustment,
//! zeroes the record's source word before the span labels open, moves the
//! callback out of the first-argument register, and substitutes the record
//! pointer.

use std::ffi::c_void;
use std::mem;

use crate::registry::AddressRange;
use crate::state::InterpreterState;
use crate::trampoline::EntryCallback;

pub(crate) const MARKER_FRAMES: bool = true;

/// The record sits one word above the call-site stack pointer.
#[cfg(not(target_os = "windows"))]
pub(crate) const STACK_PADDING: usize = 8;

/// The callee's 32-byte home space sits between the call-site stack pointer
/// and the record.
#[cfg(target_os = "windows")]
pub(crate) const STACK_PADDING: usize = 40;

/// Bytes of the reservation available to the record itself.
const STATE_SPACE: usize = 16;

const _: () = assert!(
    mem::size_of::<InterpreterState>() <= STATE_SPACE,
    "record outgrew the trampoline reservation; update the assembly below"
);

// System V: callback arrives in rdi, the opaque argument in rsi. The 24-byte
// adjustment is 16 bytes of record at [rsp+8] plus one word keeping the call
// site 16-byte aligned.
#[cfg(any(target_os = "linux", target_os = "freebsd"))]
core::arch::global_asm!(
    ".pushsection .text",
    ".p2align 4",
    ".globl enter_interp_frame_raw",
    ".type enter_interp_frame_raw,@function",
    "enter_interp_frame_raw:",
    ".cfi_startproc",
    "sub rsp, 24",
    ".cfi_def_cfa_offset 32",
    "mov rax, rdi",
    "lea rdi, [rsp + 8]",
    // source word reads as not-entered before the callback can run
    "mov qword ptr [rsp + 8], 0",
    ".globl interp_entry_call_start",
    "interp_entry_call_start:",
    "call rax",
    ".globl interp_entry_call_end",
    "interp_entry_call_end:",
    "add rsp, 24",
    ".cfi_def_cfa_offset 8",
    "ret",
    ".cfi_endproc",
    ".size enter_interp_frame_raw, . - enter_interp_frame_raw",
    ".popsection",
);

// Same body as System V. The span labels are alt entries so
// subsections-via-symbols does not split the unwind region at them, and the
// epilogue leaves the CFA directive out because the compact unwind encoder
// mishandles it.
#[cfg(target_vendor = "apple")]
core::arch::global_asm!(
    ".section __TEXT,__text,regular,pure_instructions",
    ".p2align 4",
    ".globl _enter_interp_frame_raw",
    "_enter_interp_frame_raw:",
    ".cfi_startproc",
    "sub rsp, 24",
    ".cfi_def_cfa_offset 32",
    "mov rax, rdi",
    "lea rdi, [rsp + 8]",
    "mov qword ptr [rsp + 8], 0",
    ".private_extern _interp_entry_call_start",
    ".alt_entry _interp_entry_call_start",
    "_interp_entry_call_start:",
    "call rax",
    ".private_extern _interp_entry_call_end",
    ".alt_entry _interp_entry_call_end",
    "_interp_entry_call_end:",
    "add rsp, 24",
    "ret",
    ".cfi_endproc",
);

// Windows x64: callback arrives in rcx, the opaque argument in rdx. The
// callee's 32-byte home space is folded into the one 56-byte adjustment so
// SEH sees a single stack allocation; the record lives above it at
// [rsp+40].
#[cfg(target_os = "windows")]
core::arch::global_asm!(
    ".text",
    ".p2align 4",
    ".globl enter_interp_frame_raw",
    "enter_interp_frame_raw:",
    ".seh_proc enter_interp_frame_raw",
    "sub rsp, 56",
    ".seh_stackalloc 56",
    ".seh_endprologue",
    "mov rax, rcx",
    "lea rcx, [rsp + 40]",
    "mov qword ptr [rsp + 40], 0",
    ".globl interp_entry_call_start",
    "interp_entry_call_start:",
    "call rax",
    ".globl interp_entry_call_end",
    "interp_entry_call_end:",
    "add rsp, 56",
    "ret",
    ".seh_endproc",
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
