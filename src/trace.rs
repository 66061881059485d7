//! Stack trace capture for fault diagnostics.
//!
//! A backtrace taken after `catch_unwind` returns only shows the recovery
//! site, so [`install_panic_hook`] records the raw backtrace of the panicking
//! thread while the faulting frames are still live. [`panic_trace`] then
//! narrows that recording to the frames between the panic machinery and the
//! unwinding boundary, capped at a KB budget.
//!
//! The output is opaque text for log lines; nothing parses it.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::sync::Once;

/// Budget used by the adapters when logging a contained panic.
pub const PANIC_TRACE_KB: usize = 4;

/// Budget used by [`stack_trace`].
pub const STACK_TRACE_KB: usize = 4;

/// Frames raised by the panic runtime and by the capture itself.
const PANIC_MACHINERY: &[&str] = &[
    "std::panicking::begin_panic",
    "std::panicking::rust_panic_with_hook",
    "std::panicking::default_hook",
    "std::panic::panic_any",
    "std::rt::begin_panic",
    "core::panicking::",
    "rust_begin_unwind",
    "std::backtrace",
    "brrtflow::trace::install_panic_hook",
    "brrtflow::trace::panic_trace",
];

/// Frames raised by a plain capture of the current stack.
const CAPTURE_MACHINERY: &[&str] = &["std::backtrace", "brrtflow::trace::stack_trace"];

/// Frames where the unwinding boundary begins; everything below belongs to
/// whoever installed the guard.
const UNWIND_BOUNDARY: &[&str] = &[
    "std::panicking::try",
    "std::panicking::catch_unwind",
    "std::panic::catch_unwind",
    "__rust_try",
];

thread_local! {
    static RECORDED: RefCell<Option<String>> = const { RefCell::new(None) };
}

// Per coroutine, so a handler that yields inside a guarded region does not
// leak its depth to other coroutines on the same worker thread.
may::coroutine_local!(static GUARD_DEPTH: Cell<usize> = Cell::new(0));

static HOOK: Once = Once::new();

/// Install the recording panic hook. Idempotent.
///
/// Panics raised inside a [`QuietRegion`] are only recorded; all others are
/// also passed to the hook that was active before the first call.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let raw = Backtrace::force_capture().to_string();
            RECORDED.with(|slot| *slot.borrow_mut() = Some(raw));
            if !in_quiet_region() {
                previous(info);
            }
        }));
    });
}

/// Marks the current coroutine (or thread) as running code whose panics are
/// reported by the caller. Regions nest; the mark is lifted on drop.
pub(crate) struct QuietRegion {
    _private: (),
}

impl QuietRegion {
    pub(crate) fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        QuietRegion { _private: () }
    }
}

impl Drop for QuietRegion {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

pub(crate) fn in_quiet_region() -> bool {
    GUARD_DEPTH.with(|depth| depth.get() > 0)
}

/// Drop any recording left on this thread by an earlier panic.
pub(crate) fn clear_recorded() {
    RECORDED.with(|slot| slot.borrow_mut().take());
}

/// Trace of the most recent panic on this thread, narrowed to `kb` KB.
///
/// Consumes the hook's recording. Without one (hook not installed), the
/// current stack is captured instead.
#[must_use]
pub fn panic_trace(kb: usize) -> String {
    let raw = RECORDED
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string());
    narrow(&raw, PANIC_MACHINERY, kb)
}

/// Trace of the caller's current stack, narrowed to [`STACK_TRACE_KB`].
#[must_use]
pub fn stack_trace() -> String {
    let raw = Backtrace::force_capture().to_string();
    narrow(&raw, CAPTURE_MACHINERY, STACK_TRACE_KB)
}

/// Narrow a rendered backtrace.
///
/// The result starts at the frame after the last frame matching one of
/// `skip_markers` and ends before the first unwinding-boundary frame. When no
/// skip marker is present the result starts at the first frame; when the
/// narrowed block is empty the whole buffer is used. Blank edge lines are
/// trimmed and the text is cut at a line boundary to `kb << 10` bytes.
#[must_use]
pub fn narrow(raw: &str, skip_markers: &[&str], kb: usize) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_frame_header(line))
        .map(|(idx, _)| idx)
        .collect();

    let frame_lines = |n: usize| -> &[&str] {
        let end = starts.get(n + 1).copied().unwrap_or(lines.len());
        &lines[starts[n]..end]
    };
    let frame_matches = |n: usize, markers: &[&str]| {
        frame_lines(n)
            .iter()
            .any(|line| markers.iter().any(|m| line.contains(m)))
    };

    let boundary = (0..starts.len())
        .find(|&n| frame_matches(n, UNWIND_BOUNDARY))
        .unwrap_or(starts.len());
    let first = (0..boundary)
        .rev()
        .find(|&n| frame_matches(n, skip_markers))
        .map_or(0, |n| n + 1);

    let narrowed = if first < boundary {
        let end_line = starts.get(boundary).copied().unwrap_or(lines.len());
        trim_blank_lines(&lines[starts[first]..end_line])
    } else {
        String::new()
    };

    if narrowed.is_empty() {
        within_budget(&trim_blank_lines(&lines), kb)
    } else {
        within_budget(&narrowed, kb)
    }
}

fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(':')
}

fn trim_blank_lines(lines: &[&str]) -> String {
    let begin = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(begin, |idx| idx + 1);
    lines[begin..end].join("\n")
}

fn within_budget(text: &str, kb: usize) -> String {
    let limit = kb.saturating_mul(1024);
    if text.len() <= limit {
        return text.to_string();
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = &text[..cut];
    let head = match head.rfind('\n') {
        Some(nl) => &head[..nl],
        None => head,
    };
    let lines: Vec<&str> = head.lines().collect();
    trim_blank_lines(&lines)
}
