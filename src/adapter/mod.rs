//! # Dispatch Adapters
//!
//! Bridges from handler types to the callable shapes host frameworks expect:
//!
//! | Adapter | Handler | Host shape |
//! |---------|---------|------------|
//! | [`web::use_controller`] | [`Controller`](crate::handler::Controller) | `Fn(HandlerRequest)` for [`Dispatcher`](crate::dispatcher::Dispatcher) |
//! | [`task::use_task`] | [`Task`](crate::handler::Task) | `Fn(&clap::Command, &[String]) -> anyhow::Result<()>` |
//! | [`cron::use_cron`] | [`Job`](crate::handler::Job) | `Fn() -> anyhow::Result<()>` |
//!
//! Every invocation replicates the handler from its [`Replicate`](crate::replicate::Replicate)
//! source, then attaches a fresh request context, logging context and logger
//! before running `pre_use` and the main hook.
//!
//! Only the web adapter contains panics. A panicking task or job unwinds
//! into its caller unchanged.

pub mod cron;
pub mod task;
pub mod web;

pub use cron::{use_cron, CronError, CronHandle, CronScheduler, Overlap};
pub use task::{use_task, TaskRunner};
pub use web::{serve, use_controller};
