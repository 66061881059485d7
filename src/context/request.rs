use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::dispatcher::{HandlerRequest, HandlerResponse, HeaderVec, ParamVec};
use crate::error::DispatchError;
use crate::ids::RequestId;

/// Success code carried in the response envelope.
pub const OK_CODE: i64 = 0;

/// Build the uniform response envelope `{code, message, data}`.
#[must_use]
pub fn envelope(code: i64, message: &str, data: Value) -> Value {
    json!({ "code": code, "message": message, "data": data })
}

/// Per-invocation view of the inbound request, plus the response slot the
/// handler renders into.
///
/// CLI tasks and cron jobs have no inbound request; they get a
/// [`RequestContext::detached`] placeholder so handlers see the same shape
/// everywhere.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub handler_name: String,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub body: Option<Value>,
    response: Option<HandlerResponse>,
}

impl RequestContext {
    #[must_use]
    pub fn from_request(req: &HandlerRequest) -> Self {
        Self {
            request_id: req.request_id,
            method: req.method.clone(),
            path: req.path.clone(),
            handler_name: req.handler_name.clone(),
            path_params: req.path_params.clone(),
            query_params: req.query_params.clone(),
            headers: req.headers.clone(),
            body: req.body.clone(),
            response: None,
        }
    }

    /// Placeholder context for invocations without an inbound request.
    #[must_use]
    pub fn detached(name: &str) -> Self {
        Self {
            handler_name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Deserialize the JSON body into `T`.
    pub fn bind_json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        let body = self
            .body
            .clone()
            .ok_or_else(|| anyhow::anyhow!("request has no JSON body"))?;
        Ok(serde_json::from_value(body)?)
    }

    /// Render a raw JSON response. A later render replaces an earlier one.
    pub fn render_json(&mut self, status: u16, body: Value) {
        self.response = Some(HandlerResponse::json(status, body));
    }

    /// Render `data` inside a success envelope.
    pub fn render_json_ok<T: Serialize>(&mut self, data: &T) {
        match serde_json::to_value(data) {
            Ok(data) => self.render_json(200, envelope(OK_CODE, "ok", data)),
            Err(err) => {
                let err = anyhow::Error::new(err).context("failed to serialize response");
                self.render_json_fail(&DispatchError::Action(err));
            }
        }
    }

    /// Render the uniform failure envelope for `err`.
    pub fn render_json_fail(&mut self, err: &DispatchError) {
        let status = err.status();
        self.render_json(
            status,
            envelope(i64::from(status), &err.public_message(), Value::Null),
        );
    }

    #[must_use]
    pub fn response(&self) -> Option<&HandlerResponse> {
        self.response.as_ref()
    }

    pub fn take_response(&mut self) -> Option<HandlerResponse> {
        self.response.take()
    }
}
