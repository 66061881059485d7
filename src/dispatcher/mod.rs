//! # Dispatcher Module
//!
//! Coroutine-based handler dispatch: the web boundary the controller adapter
//! plugs into.
//!
//! - Each registered handler runs in its own `may` coroutine
//! - Requests are sent to handlers via MPSC channels
//! - Handlers answer on a per-request reply channel
//! - Stack size is configurable via `BRRTFLOW_STACK_SIZE`
//!
//! ```rust,ignore
//! use brrtflow::adapter::web::use_controller;
//! use brrtflow::dispatcher::{Dispatcher, Incoming};
//!
//! let mut dispatcher = Dispatcher::new();
//! unsafe {
//!     dispatcher.register_handler("get_pet", use_controller(ByClone(GetPet::default()), builder));
//! }
//! let resp = dispatcher.dispatch("get_pet", Incoming::new(Method::GET, "/pets/1"));
//! ```
//!
//! Unknown handlers yield `None`; a handler that drops its reply channel
//! yields a 503.

mod core;

pub use core::{
    Dispatcher, HandlerRequest, HandlerResponse, HandlerSender, HeaderVec, Incoming, ParamVec,
    MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
};
