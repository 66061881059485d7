use std::fmt::Display;
use std::sync::Arc;

use super::LogContext;
use crate::recover::Fault;

macro_rules! ctx_event {
    ($level:ident, $ctx:expr, $msg:expr) => {
        tracing::$level!(
            log_id = %$ctx.log_id,
            request_id = %$ctx.request_id,
            module = %$ctx.app_name,
            local_ip = %$ctx.local_addr,
            "{}",
            $msg
        )
    };
}

/// Logger handed to each handler instance. Every event it emits carries the
/// invocation's `log_id`, `request_id`, `module` and `local_ip` fields.
#[derive(Debug, Clone, Default)]
pub struct ContextLogger {
    ctx: Arc<LogContext>,
}

impl ContextLogger {
    #[must_use]
    pub fn new(ctx: LogContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    #[must_use]
    pub fn context(&self) -> &LogContext {
        &self.ctx
    }

    pub fn debug(&self, msg: impl Display) {
        ctx_event!(debug, self.ctx, msg);
    }

    pub fn info(&self, msg: impl Display) {
        ctx_event!(info, self.ctx, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        ctx_event!(warn, self.ctx, msg);
    }

    pub fn error(&self, msg: impl Display) {
        ctx_event!(error, self.ctx, msg);
    }

    /// Log a contained panic at `site` (`controller`, `flow`, ...).
    pub fn panic(&self, site: &str, fault: &Fault) {
        tracing::error!(
            log_id = %self.ctx.log_id,
            request_id = %self.ctx.request_id,
            module = %self.ctx.app_name,
            local_ip = %self.ctx.local_addr,
            panic_message = %fault.message,
            stack = %fault.trace,
            "[{site} panic]"
        );
    }
}
