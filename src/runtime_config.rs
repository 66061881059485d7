//! # Runtime Configuration Module
//!
//! Environment-driven settings for the coroutine runtime.
//!
//! ### `BRRTFLOW_STACK_SIZE`
//!
//! Stack size for handler coroutines. Accepts decimal (`524288`) or
//! hexadecimal (`0x80000`). Default: `0x80000` (512 KB).
//!
//! Fault containment captures and symbolizes a backtrace on the handler's
//! own stack, so handler coroutines need more room than a bare router would.

use std::env;

/// Default coroutine stack size (512 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x80000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var("BRRTFLOW_STACK_SIZE")
            .ok()
            .and_then(|val| parse_size(&val))
            .unwrap_or(DEFAULT_STACK_SIZE);
        RuntimeConfig { stack_size }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}
