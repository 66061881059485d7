//! # brrtflow
//!
//! **brrtflow** adapts ordinary handler types to the callable shapes three
//! kinds of host frameworks expect: a coroutine request dispatcher, a `clap`
//! command-line runner and a cron-style scheduler.
//!
//! ## Overview
//!
//! A handler is a plain struct implementing one of the capability traits in
//! [`handler`]. On every invocation an adapter:
//!
//! 1. replicates the handler from its [`replicate::Replicate`] source, so no
//!    state crosses invocations,
//! 2. attaches a [`context::RequestContext`], a [`context::LogContext`] and a
//!    [`context::ContextLogger`] built by a [`context::ContextBuilder`],
//! 3. runs `pre_use` and the main hook.
//!
//! The web adapter additionally contains panics: a panicking controller is
//! logged with a narrowed stack trace and answered with the uniform failure
//! envelope instead of taking the handler coroutine down.
//!
//! ## Architecture
//!
//! - **[`handler`]** - `Contextual`, `Controller`, `Task`, `Job` contracts
//! - **[`adapter`]** - `use_controller`, `use_task`, `use_cron` plus the
//!   `TaskRunner` and `CronScheduler` integrations
//! - **[`dispatcher`]** - coroutine-based request dispatch (`may`)
//! - **[`context`]** - request context, logging context and logger
//! - **[`replicate`]** - per-invocation handler instances
//! - **[`recover`]** / **[`trace`]** - guarded regions and narrowed traces
//! - **[`config`]** / **[`logging`]** - application config and `tracing` setup
//!
//! ### Web Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Dispatcher
//!     participant Adapter as use_controller
//!     participant Builder as ContextBuilder
//!     participant Handler as Controller replica
//!
//!     Caller->>Dispatcher: dispatch(name, Incoming)
//!     Dispatcher->>Adapter: HandlerRequest (coroutine)
//!     Adapter->>Adapter: source.replicate()
//!     Adapter->>Builder: attach(replica, RequestContext)
//!     Builder-->>Handler: context, log context, logger
//!     Adapter->>Handler: pre_use(), action() (guarded)
//!     alt panic
//!         Adapter->>Adapter: log [controller panic] + stack
//!         Adapter->>Handler: render_json_fail(Panicked)
//!     else Err(e)
//!         Adapter->>Handler: render_json_fail(Action(e))
//!     end
//!     Adapter-->>Dispatcher: HandlerResponse via reply_tx
//!     Dispatcher-->>Caller: Some(HandlerResponse)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brrtflow::adapter::use_controller;
//! use brrtflow::context::ContextBuilder;
//! use brrtflow::dispatcher::{Dispatcher, Incoming};
//! use brrtflow::replicate::ByClone;
//! use brrtflow::AppConfig;
//!
//! let builder = ContextBuilder::new(AppConfig::from_env());
//! let mut dispatcher = Dispatcher::new();
//! unsafe {
//!     dispatcher.register_handler("get_pet", use_controller(ByClone(GetPet::default()), builder));
//! }
//! let response = dispatcher.dispatch("get_pet", Incoming::new(http::Method::GET, "/pets/1"));
//! ```
//!
//! ## Runtime Configuration
//!
//! - `BRRTFLOW_STACK_SIZE` - handler coroutine stack size (hex or decimal)
//! - `BRRTFLOW_APP_NAME`, `BRRTFLOW_LOCAL_ADDR` - identity stamped on log events
//! - `BRRTFLOW_LOG_*` - see [`logging::LogConfig::from_env`]

pub mod adapter;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod recover;
pub mod replicate;
pub mod runtime_config;
pub mod trace;

pub use config::{AppConfig, ConfigError};
pub use context::{ContextBuilder, ContextLogger, LogContext, RequestContext};
pub use error::DispatchError;
pub use handler::{Contextual, Controller, HandlerBase, Job, Task};
pub use recover::{guard_flow, Fault, Flow};
