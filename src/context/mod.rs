//! # Context Module
//!
//! Everything an adapter attaches to a handler instance before running it:
//!
//! - [`RequestContext`] - the inbound request (or a detached placeholder) and
//!   the response slot
//! - [`LogContext`] - log id, request id, application name, local address
//! - [`ContextLogger`] - a logger stamping those four fields on every event
//! - [`ContextBuilder`] - assembles the above from an injected [`AppConfig`]
//!
//! Nothing here is cached: every invocation gets freshly built values.

mod logger;
mod request;

pub use logger::ContextLogger;
pub use request::{envelope, RequestContext, OK_CODE};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::handler::Contextual;
use crate::ids;

/// Per-invocation logging identifiers. Built once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContext {
    pub log_id: String,
    pub request_id: String,
    pub app_name: String,
    pub local_addr: String,
}

/// Builds [`LogContext`]s and loggers from the request context and the
/// application configuration it was constructed with.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    config: Arc<AppConfig>,
}

impl ContextBuilder {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self::shared(Arc::new(config))
    }

    #[must_use]
    pub fn shared(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Read the four identifier sources for one invocation.
    #[must_use]
    pub fn build(&self, ctx: &RequestContext) -> LogContext {
        LogContext {
            log_id: ids::log_id_for(ctx),
            request_id: ids::request_id_for(ctx),
            app_name: self.config.app_name.clone(),
            local_addr: self.config.local_addr.clone(),
        }
    }

    /// Attach `ctx`, its [`LogContext`] and a matching logger to `handler`.
    pub fn attach<H>(&self, handler: &mut H, ctx: RequestContext) -> LogContext
    where
        H: Contextual + ?Sized,
    {
        let log_ctx = self.build(&ctx);
        handler.set_context(ctx);
        handler.set_log_ctx(log_ctx.clone());
        handler.set_log(ContextLogger::new(log_ctx.clone()));
        log_ctx
    }
}
