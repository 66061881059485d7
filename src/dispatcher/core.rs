//! Dispatcher core module - hot path for request dispatch.

use crate::ids::RequestId;
use crate::runtime_config::RuntimeConfig;
use http::Method;
use may::coroutine;
use may::sync::mpsc;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum inline path/query parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated header storage for the hot path.
///
/// Header names use `Arc<str>` because they repeat across requests and
/// `Arc::clone()` is an atomic increment rather than a string copy.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Stack-allocated parameter storage for the hot path.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Inbound request as handed to [`Dispatcher::dispatch`] by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct Incoming {
    pub method: Method,
    pub path: String,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub body: Option<Value>,
}

impl Incoming {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    #[must_use]
    pub fn path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn query_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Request data passed to a handler coroutine
///
/// Contains the extracted HTTP request information and the reply channel the
/// handler must answer on exactly once.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path
    pub path: String,
    /// Name of the handler that should process this request
    pub handler_name: String,
    /// Path parameters extracted from the URL
    pub path_params: ParamVec,
    /// Query string parameters
    pub query_params: ParamVec,
    /// HTTP headers (lowercase names)
    pub headers: HeaderVec,
    /// Request body parsed as JSON (if present)
    pub body: Option<Value>,
    /// Channel for sending the response back to the dispatcher
    pub reply_tx: mpsc::Sender<HandlerResponse>,
}

/// Response data sent back from a handler coroutine
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// HTTP response headers
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body as JSON
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create an error response
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Response for a handler that finished without rendering anything
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(204, HeaderVec::new(), Value::Null)
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Type alias for a channel sender that dispatches requests to a handler
pub type HandlerSender = mpsc::Sender<HandlerRequest>;

/// Dispatcher that routes requests to registered handler coroutines
#[derive(Clone)]
pub struct Dispatcher {
    /// Map of handler names to their channel senders
    pub handlers: HashMap<String, HandlerSender>,
    stack_size: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a new empty dispatcher using the stack size from [`RuntimeConfig::from_env`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_runtime_config(RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_runtime_config(config: RuntimeConfig) -> Self {
        Dispatcher {
            handlers: HashMap::new(),
            stack_size: config.stack_size,
        }
    }

    /// Names of all registered handlers
    #[must_use]
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Registers a handler function that will process incoming requests with the given name.
    ///
    /// Spawns a coroutine that drains the handler's channel. Handlers built with
    /// [`crate::adapter::web::use_controller`] contain their own faults; the
    /// `catch_unwind` here is a backstop for raw closures so one failing handler
    /// cannot take the coroutine down.
    ///
    /// If a handler with the same name already exists it is replaced; dropping
    /// the old sender closes its channel and the old coroutine exits.
    ///
    /// # Safety
    ///
    /// This function is marked unsafe because it calls `may::coroutine::Builder::spawn()`,
    /// which is unsafe in the `may` runtime. The caller must ensure:
    /// - The May coroutine runtime is properly initialized before calling this
    /// - The handler sends a response through the reply channel for every request
    pub unsafe fn register_handler<F>(&mut self, name: &str, handler_fn: F)
    where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let name = name.to_string();
        let handler_name_for_logging = name.clone();
        let stack_size = self.stack_size;

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The handler is Send + 'static, so the coroutine holds no borrowed state.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .name(name.clone())
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(
                        handler_name = %handler_name_for_logging,
                        stack_size = stack_size,
                        "Handler coroutine start"
                    );

                    for req in rx.iter() {
                        let reply_tx = req.reply_tx.clone();
                        let handler_name = req.handler_name.clone();
                        let request_id = req.request_id;
                        let execution_start = Instant::now();

                        if let Err(panic) =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                handler_fn(req);
                            }))
                        {
                            let panic_message = crate::recover::panic_message(panic.as_ref());
                            error!(
                                request_id = %request_id,
                                handler_name = %handler_name,
                                panic_message = %panic_message,
                                "Unguarded handler panicked"
                            );
                            if reply_tx
                                .send(HandlerResponse::error(500, "Handler panicked"))
                                .is_err()
                            {
                                debug!(request_id = %request_id, "Reply channel already closed");
                            }
                        } else {
                            debug!(
                                request_id = %request_id,
                                handler_name = %handler_name,
                                execution_time_ms = execution_start.elapsed().as_millis() as u64,
                                "Handler execution complete"
                            );
                        }
                    }
                })
        };

        if let Err(e) = spawn_result {
            error!(
                handler_name = %name,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn handler coroutine - CRITICAL"
            );
            return;
        }

        if self.handlers.insert(name.clone(), tx).is_some() {
            warn!(handler_name = %name, "Replaced existing handler - old coroutine will exit");
        }
        info!(
            handler_name = %name,
            total_handlers = self.handlers.len(),
            "Handler registered successfully"
        );
    }

    /// Dispatch a request to the named handler and wait for its response.
    ///
    /// Returns `None` if no handler is registered under `handler_name`.
    #[must_use]
    pub fn dispatch(&self, handler_name: &str, incoming: Incoming) -> Option<HandlerResponse> {
        self.dispatch_with_request_id(handler_name, incoming, RequestId::new())
    }

    /// Dispatch a request with a pre-determined request id (for correlation)
    #[must_use]
    pub fn dispatch_with_request_id(
        &self,
        handler_name: &str,
        incoming: Incoming,
        request_id: RequestId,
    ) -> Option<HandlerResponse> {
        let Some(tx) = self.handlers.get(handler_name) else {
            error!(
                handler_name = %handler_name,
                available_handlers = ?self.handler_names(),
                "Handler not found"
            );
            return None;
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        let request = HandlerRequest {
            request_id,
            method: incoming.method,
            path: incoming.path,
            handler_name: handler_name.to_string(),
            path_params: incoming.path_params,
            query_params: incoming.query_params,
            headers: incoming.headers,
            body: incoming.body,
            reply_tx,
        };

        info!(
            request_id = %request_id,
            handler_name = %handler_name,
            method = %request.method,
            path = %request.path,
            "Request dispatched to handler"
        );

        let start = Instant::now();
        if let Err(e) = tx.send(request) {
            error!(
                request_id = %request_id,
                handler_name = %handler_name,
                error = %e,
                "Failed to send request to handler"
            );
            return None;
        }

        match reply_rx.recv() {
            Ok(response) => {
                info!(
                    request_id = %request_id,
                    handler_name = %handler_name,
                    latency_ms = start.elapsed().as_millis() as u64,
                    status = response.status,
                    "Handler response received"
                );
                Some(response)
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    handler_name = %handler_name,
                    error = %e,
                    "Handler channel closed - handler may have crashed"
                );
                Some(HandlerResponse::error(
                    503,
                    &format!("Handler '{handler_name}' is not responding"),
                ))
            }
        }
    }
}
