//! Process-wide classification of instruction pointers.
//!
//! A native unwinder walking a thread's stack has no notion of interpreter
//! frames; it only sees machine addresses. This module gives it two cheap
//! predicates: whether an instruction pointer lies inside the evaluator's
//! dispatch code, and whether it lies inside the few trampoline instructions
//! bracketing the indirect call into the evaluator.
//!
//! Both ranges are fixed at link time. Dispatch code is placed in a dedicated
//! named code section with [`dispatch_section!`](crate::dispatch_section) and
//! bounded by the linker's section boundary symbols; the trampoline span is
//! bounded by the labels the entry assembly emits around its call
//! instruction. On targets with neither mechanism the predicates return
//! false: execution stays correct, backtrace visibility is lost.

use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

/// Immutable address range established at process load time.
///
/// Both bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    start: usize,
    end: usize,
}

impl AddressRange {
    pub(crate) const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// First address the range covers.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last address the range covers.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Whether `ip` falls inside the range.
    pub fn contains(&self, ip: usize) -> bool {
        self.start <= ip && ip <= self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..{:#x}", self.start, self.end)
    }
}

/// Places a function in the dispatch-body code section.
///
/// The evaluator wraps every function of its dispatch loop with this macro so
/// that any instruction pointer sampled inside them classifies as an
/// interpreter frame. `#[inline(never)]` is part of the contract: inlining
/// would migrate the code out of the section.
///
/// ```
/// interpframe::dispatch_section! {
///     fn eval_block(block: usize) -> usize {
///         block + 1
///     }
/// }
/// assert_eq!(eval_block(1), 2);
/// ```
#[macro_export]
macro_rules! dispatch_section {
    ($(#[$attr:meta])* $vis:vis fn $($rest:tt)*) => {
        $(#[$attr])*
        #[cfg_attr(
            any(
                target_os = "linux",
                target_os = "freebsd",
                all(target_os = "windows", target_env = "gnu"),
            ),
            unsafe(link_section = "interp_frame")
        )]
        #[cfg_attr(target_vendor = "apple", unsafe(link_section = "__TEXT,__interp"))]
        #[inline(never)]
        $vis fn $($rest)*
    };
}

crate::dispatch_section! {
    /// In-section anchor. Guarantees the dispatch section exists in every
    /// link, so the boundary symbols always resolve, and gives tests a known
    /// in-section address.
    #[doc(hidden)]
    pub fn dispatch_anchor() {}
}

cfg_if::cfg_if! {
    if #[cfg(any(
        target_os = "linux",
        target_os = "freebsd",
        all(target_os = "windows", target_env = "gnu"),
    ))] {
        fn resolve_dispatch_range() -> Option<AddressRange> {
            unsafe extern "C" {
                #[link_name = "__start_interp_frame"]
                static SECTION_START: u8;
                #[link_name = "__stop_interp_frame"]
                static SECTION_STOP: u8;
            }
            let start = unsafe { (&raw const SECTION_START) as usize };
            let stop = unsafe { (&raw const SECTION_STOP) as usize };
            Some(AddressRange::new(start, stop))
        }
    } else if #[cfg(target_vendor = "apple")] {
        fn resolve_dispatch_range() -> Option<AddressRange> {
            unsafe extern "C" {
                #[link_name = "\u{1}section$start$__TEXT$__interp"]
                static SECTION_START: u8;
                #[link_name = "\u{1}section$end$__TEXT$__interp"]
                static SECTION_STOP: u8;
            }
            let start = unsafe { (&raw const SECTION_START) as usize };
            let stop = unsafe { (&raw const SECTION_STOP) as usize };
            Some(AddressRange::new(start, stop))
        }
    } else {
        fn resolve_dispatch_range() -> Option<AddressRange> {
            None
        }
    }
}

static DISPATCH_RANGE: LazyLock<Option<AddressRange>> = LazyLock::new(|| {
    let range = resolve_dispatch_range()?;
    let anchor = dispatch_anchor as usize;
    debug!(%range, anchor, "resolved dispatch body range");
    Some(range)
});

static TRAMPOLINE_SPAN: LazyLock<Option<AddressRange>> = LazyLock::new(|| {
    let span = crate::trampoline::call_span()?;
    debug!(%span, "resolved entry trampoline span");
    Some(span)
});

/// Address range of the evaluator's dispatch code, if this target supports
/// section-based discovery.
pub fn dispatch_range() -> Option<AddressRange> {
    *DISPATCH_RANGE
}

/// Address range of the trampoline instructions bracketing the indirect call
/// into the evaluator, if this target has an assembly trampoline.
pub fn trampoline_span() -> Option<AddressRange> {
    *TRAMPOLINE_SPAN
}

/// Forces resolution of both classifier ranges.
///
/// Resolution is otherwise lazy on first predicate use. Calling this during
/// startup keeps the first resolution, and its logging, out of signal
/// handlers.
pub fn init() {
    let _ = dispatch_range();
    let _ = trampoline_span();
}

/// Whether `ip` lies within the evaluator's dispatch code.
pub fn is_interpreter_frame(ip: usize) -> bool {
    dispatch_range().is_some_and(|range| range.contains(ip))
}

/// Whether `ip` lies within the trampoline span around the indirect call.
pub fn is_entry_trampoline_frame(ip: usize) -> bool {
    trampoline_span().is_some_and(|span| span.contains(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds_are_inclusive() {
        let range = AddressRange::new(0x100, 0x200);
        assert!(range.contains(0x100));
        assert!(range.contains(0x180));
        assert!(range.contains(0x200));
        assert!(!range.contains(0xff));
        assert!(!range.contains(0x201));
    }

    #[test]
    fn test_range_display() {
        let range = AddressRange::new(0x1000, 0x2fff);
        assert_eq!(range.to_string(), "0x1000..0x2fff");
    }

    #[cfg(any(
        target_os = "linux",
        target_os = "freebsd",
        all(target_os = "windows", target_env = "gnu"),
        target_vendor = "apple",
    ))]
    mod sectioned {
        use super::super::*;

        crate::dispatch_section! {
            fn marked_dispatch() {}
        }

        fn unmarked() {}

        #[test]
        fn test_anchor_is_interpreter_frame() {
            assert!(is_interpreter_frame(dispatch_anchor as usize));
        }

        #[test]
        fn test_marked_function_is_interpreter_frame() {
            assert!(is_interpreter_frame(marked_dispatch as usize));
        }

        #[test]
        fn test_unmarked_function_is_not_interpreter_frame() {
            assert!(!is_interpreter_frame(unmarked as usize));
        }

        #[test]
        fn test_dispatch_range_is_nonempty() {
            let range = dispatch_range().expect("section boundaries resolve here");
            assert!(range.start() < range.end());
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "freebsd",
        all(target_os = "windows", target_env = "gnu"),
        target_vendor = "apple",
    )))]
    mod unsectioned {
        use super::super::*;

        #[test]
        fn test_predicates_degrade_to_false() {
            assert!(dispatch_range().is_none());
            assert!(!is_interpreter_frame(dispatch_anchor as usize));
        }
    }

    #[test]
    fn test_trampoline_span_matches_support() {
        if crate::marker_frames_supported() {
            let span = trampoline_span().expect("assembly trampoline emits span labels");
            assert!(span.start() < span.end());
            assert!(is_entry_trampoline_frame(span.start()));
            assert!(is_entry_trampoline_frame(span.end()));
            assert!(!is_entry_trampoline_frame(span.end() + 0x1000));
        } else {
            assert!(trampoline_span().is_none());
            assert!(!is_entry_trampoline_frame(0));
        }
    }
}
