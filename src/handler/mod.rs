//! # Handler Contracts
//!
//! The capability traits a type implements to be adapted:
//!
//! - [`Controller`] - web request handler, adapted by [`crate::adapter::web`]
//! - [`Task`] - CLI task, adapted by [`crate::adapter::task`]
//! - [`Job`] - scheduled job, adapted by [`crate::adapter::cron`]
//!
//! All three build on [`Contextual`], which covers the per-invocation state
//! the adapters attach. Implementors embed a [`HandlerBase`] and point
//! `base`/`base_mut` at it; every other method has a default.
//!
//! ```rust,ignore
//! #[derive(Clone, Default)]
//! struct GetPet {
//!     base: HandlerBase,
//! }
//!
//! impl Contextual for GetPet {
//!     fn base(&self) -> &HandlerBase { &self.base }
//!     fn base_mut(&mut self) -> &mut HandlerBase { &mut self.base }
//! }
//!
//! impl Controller for GetPet {
//!     fn action(&mut self) -> anyhow::Result<()> {
//!         let id = self.context().get_path_param("id").unwrap_or_default().to_string();
//!         self.log().info(format_args!("loading pet {id}"));
//!         self.context_mut().render_json_ok(&serde_json::json!({ "id": id }));
//!         Ok(())
//!     }
//! }
//! ```

use crate::context::{ContextLogger, LogContext, RequestContext};
use crate::error::DispatchError;
use crate::recover::Flow;

/// Per-invocation state attached by the adapters.
///
/// Cloning an unattached base is cheap; adapters replicate handlers before
/// anything is attached.
#[derive(Debug, Clone, Default)]
pub struct HandlerBase {
    ctx: RequestContext,
    log_ctx: LogContext,
    log: ContextLogger,
}

impl HandlerBase {
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.ctx
    }

    #[must_use]
    pub fn log_ctx(&self) -> &LogContext {
        &self.log_ctx
    }

    #[must_use]
    pub fn log(&self) -> &ContextLogger {
        &self.log
    }
}

/// Shared contract: context, logging context, logger and the pre-hook.
pub trait Contextual {
    fn base(&self) -> &HandlerBase;
    fn base_mut(&mut self) -> &mut HandlerBase;

    fn set_context(&mut self, ctx: RequestContext) {
        self.base_mut().ctx = ctx;
    }

    fn set_log_ctx(&mut self, log_ctx: LogContext) {
        self.base_mut().log_ctx = log_ctx;
    }

    fn set_log(&mut self, log: ContextLogger) {
        self.base_mut().log = log;
    }

    fn context(&self) -> &RequestContext {
        self.base().context()
    }

    fn context_mut(&mut self) -> &mut RequestContext {
        self.base_mut().context_mut()
    }

    fn log_ctx(&self) -> &LogContext {
        self.base().log_ctx()
    }

    fn log(&self) -> &ContextLogger {
        self.base().log()
    }

    /// Runs before the main hook on every invocation.
    fn pre_use(&mut self) {}
}

/// Web request handler.
pub trait Controller: Contextual {
    /// Main hook. Render through [`Contextual::context_mut`]; an error is
    /// rendered as the failure envelope.
    fn action(&mut self) -> anyhow::Result<()>;

    fn render_json_fail(&mut self, err: &DispatchError) {
        self.context_mut().render_json_fail(err);
    }

    /// Response rendered during this invocation, if any.
    fn take_response(&mut self) -> Option<crate::dispatcher::HandlerResponse> {
        self.context_mut().take_response()
    }
}

/// CLI task run once per matched command.
pub trait Task: Contextual {
    fn run(&mut self, args: &[String]) -> anyhow::Result<()>;
}

/// Scheduled job run on every timer fire.
pub trait Job: Contextual {
    fn run(&mut self) -> anyhow::Result<()>;
}

impl Flow for HandlerBase {
    fn log(&self) -> &ContextLogger {
        &self.log
    }
}
