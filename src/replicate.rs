//! Per-invocation handler instances.
//!
//! Adapters never run the handler value they were given. They ask a
//! [`Replicate`] source for a fresh instance on every invocation, so state
//! attached to one invocation (context, logger, ids) never reaches another.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Source of fresh handler instances.
pub trait Replicate<H>: Send + Sync + 'static {
    fn replicate(&self) -> H;
}

/// Replicate by `Clone`: an explicit, lossless per-type copy.
#[derive(Debug, Clone)]
pub struct ByClone<H>(pub H);

impl<H> Replicate<H> for ByClone<H>
where
    H: Clone + Send + Sync + 'static,
{
    fn replicate(&self) -> H {
        self.0.clone()
    }
}

/// Replicate by calling a constructor.
#[derive(Debug, Clone)]
pub struct Factory<F>(pub F);

impl<H, F> Replicate<H> for Factory<F>
where
    F: Fn() -> H + Send + Sync + 'static,
{
    fn replicate(&self) -> H {
        (self.0)()
    }
}

/// Replicate through a JSON round trip. See [`snapshot`].
#[derive(Debug, Clone)]
pub struct JsonSnapshot<H>(pub H);

impl<H> Replicate<H> for JsonSnapshot<H>
where
    H: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    fn replicate(&self) -> H {
        snapshot(&self.0)
    }
}

/// Best-effort copy through `serde_json`.
///
/// Only what survives serialization is copied: `#[serde(skip)]` fields come
/// back as their `Default`. If either direction fails the whole copy is
/// `H::default()`.
#[must_use]
pub fn snapshot<H>(src: &H) -> H
where
    H: Serialize + DeserializeOwned + Default,
{
    let value = match serde_json::to_value(src) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, handler = std::any::type_name::<H>(), "Snapshot serialization failed");
            return H::default();
        }
    };
    serde_json::from_value(value).unwrap_or_else(|e| {
        debug!(error = %e, handler = std::any::type_name::<H>(), "Snapshot deserialization failed");
        H::default()
    })
}
