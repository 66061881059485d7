//! Fault containment: a guarded region that turns a panic into a [`Fault`].

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::context::ContextLogger;
use crate::trace::{self, PANIC_TRACE_KB};

/// A panic caught inside a guarded region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// String form of the panic payload
    pub message: String,
    /// Narrowed stack trace of the panicking frames
    pub trace: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl std::error::Error for Fault {}

/// String form of a panic payload (`&str` and `String` payloads verbatim).
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Run `f` inside a guarded region.
///
/// A panic is converted to a [`Fault`] carrying the payload's string form and
/// a trace budgeted at [`PANIC_TRACE_KB`]. The previously installed panic
/// hook is not run for it, so the caller's report is the only one. Whatever
/// `f` borrowed mutably may be left half-updated; callers only use it to
/// report the fault.
pub fn contain<T>(f: impl FnOnce() -> T) -> Result<T, Fault> {
    trace::install_panic_hook();
    trace::clear_recorded();
    let region = trace::QuietRegion::enter();
    let outcome = catch_unwind(AssertUnwindSafe(f));
    drop(region);
    outcome.map_err(|payload| Fault {
        message: panic_message(payload.as_ref()),
        trace: trace::panic_trace(PANIC_TRACE_KB),
    })
}

/// Anything that carries a per-invocation logger.
pub trait Flow {
    fn log(&self) -> &ContextLogger;
}

/// Guarded region for flows: a panic is logged as `[flow panic]` through the
/// flow's own logger and swallowed. Nothing is rendered.
pub fn guard_flow<F, T>(flow: &F, f: impl FnOnce() -> T) -> Option<T>
where
    F: Flow + ?Sized,
{
    match contain(f) {
        Ok(value) => Some(value),
        Err(fault) => {
            flow.log().panic("flow", &fault);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LogContext;

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u32);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "Box<dyn Any>");
    }

    #[test]
    fn test_contain_passes_values_through() {
        assert_eq!(contain(|| 41 + 1), Ok(42));
    }

    #[test]
    fn test_contain_converts_panic() {
        let fault = contain(|| -> u32 { panic!("bad input {}", 7) }).unwrap_err();
        assert_eq!(fault.message, "bad input 7");
        assert!(!fault.trace.is_empty());
        assert!(fault.trace.len() <= PANIC_TRACE_KB << 10);
        assert_eq!(fault.to_string(), "panic: bad input 7");
    }

    #[test]
    fn test_contain_marks_quiet_region() {
        let inner = contain(|| {
            assert!(trace::in_quiet_region());
            contain(|| -> u8 { panic!("nested") }).unwrap_err();
            trace::in_quiet_region()
        });
        assert_eq!(inner, Ok(true));
        assert!(!trace::in_quiet_region());

        contain(|| -> u8 { panic!("outer") }).unwrap_err();
        assert!(!trace::in_quiet_region());
    }

    struct Importer {
        log: ContextLogger,
    }

    impl Flow for Importer {
        fn log(&self) -> &ContextLogger {
            &self.log
        }
    }

    #[test]
    fn test_guard_flow_swallows_panic() {
        let flow = Importer {
            log: ContextLogger::new(LogContext::default()),
        };
        assert_eq!(guard_flow(&flow, || 5), Some(5));
        assert_eq!(guard_flow(&flow, || -> i32 { panic!("boom") }), None);
    }
}
