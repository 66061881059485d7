//! Identifiers attached to every invocation.
//!
//! A [`RequestId`] is a ULID minted per dispatched request (or per detached
//! task/cron invocation). A [`LogId`] is the shorter numeric id used to
//! correlate log lines across services. Both can be supplied by the caller
//! through the [`LOG_ID_HEADER`] and [`REQUEST_ID_HEADER`] headers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::context::RequestContext;

/// Header carrying an upstream log id.
pub const LOG_ID_HEADER: &str = "x-log-id";

/// Header carrying an upstream request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Strongly typed request identifier backed by ULID.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ulid::Ulid::from_string(s)?;
        Ok(RequestId(id))
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<RequestId>()
            .map_err(|_| serde::de::Error::custom("invalid request id"))
    }
}

/// Numeric log id: the low 31 bits of the wall clock in nanoseconds with the
/// high bit forced on, so ids are always ten digits wide.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct LogId(pub u32);

impl LogId {
    #[must_use]
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self::from_nanos(nanos)
    }

    #[must_use]
    pub fn from_nanos(nanos: u128) -> Self {
        // Truncation to the low 31 bits is the point here.
        let low = (nanos & 0x7FFF_FFFF) as u32;
        Self(low | 0x8000_0000)
    }
}

impl Display for LogId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn header_value<'a>(ctx: &'a RequestContext, name: &str) -> Option<&'a str> {
    ctx.get_header(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Log id for an invocation: the inbound `x-log-id` header verbatim, or a
/// freshly generated [`LogId`].
#[must_use]
pub fn log_id_for(ctx: &RequestContext) -> String {
    header_value(ctx, LOG_ID_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| LogId::generate().to_string())
}

/// Request id for an invocation: the inbound `x-request-id` header verbatim,
/// or the context's own ULID.
#[must_use]
pub fn request_id_for(ctx: &RequestContext) -> String {
    header_value(ctx, REQUEST_ID_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| ctx.request_id.to_string())
}
