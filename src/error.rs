use std::fmt;

use crate::recover::Fault;

/// Message rendered to clients for contained panics.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Why a controller invocation failed.
#[derive(Debug)]
pub enum DispatchError {
    /// The handler's main hook returned an error
    Action(anyhow::Error),
    /// The handler panicked inside the guarded region
    Panicked(Fault),
}

impl DispatchError {
    /// HTTP status used for the failure envelope
    #[must_use]
    pub fn status(&self) -> u16 {
        500
    }

    /// Message safe to show to clients. Panic details never leave the log.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            DispatchError::Action(err) => err.to_string(),
            DispatchError::Panicked(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Action(err) => write!(f, "handler error: {err:#}"),
            DispatchError::Panicked(fault) => write!(f, "handler panicked: {}", fault.message),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Action(err) => Some(err.as_ref()),
            DispatchError::Panicked(fault) => Some(fault),
        }
    }
}
