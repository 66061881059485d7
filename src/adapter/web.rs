//! Web adapter: controllers behind the [`Dispatcher`](crate::dispatcher::Dispatcher).

use std::sync::Arc;

use tracing::warn;

use crate::context::{ContextBuilder, RequestContext};
use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::error::DispatchError;
use crate::handler::Controller;
use crate::recover;
use crate::replicate::Replicate;

/// Adapt a controller into a handler function for
/// [`Dispatcher::register_handler`](crate::dispatcher::Dispatcher::register_handler).
///
/// The returned closure replies on the request's channel exactly once per
/// request, whether the controller succeeds, returns an error or panics.
pub fn use_controller<H, R>(
    source: R,
    builder: ContextBuilder,
) -> impl Fn(HandlerRequest) + Send + Sync + Clone + 'static
where
    H: Controller + 'static,
    R: Replicate<H>,
{
    let source = Arc::new(source);
    move |req: HandlerRequest| {
        let response = serve(source.as_ref(), &builder, &req);
        if req.reply_tx.send(response).is_err() {
            warn!(
                request_id = %req.request_id,
                handler_name = %req.handler_name,
                "Reply channel closed before the response was sent"
            );
        }
    }
}

/// Run one request through a fresh controller and return its response.
///
/// `pre_use` and `action` share one guarded region. A panic in either is
/// logged as `[controller panic]` and rendered as the failure envelope; the
/// panic never reaches the caller. A controller that renders nothing
/// answers `204 No Content`.
pub fn serve<H, R>(source: &R, builder: &ContextBuilder, req: &HandlerRequest) -> HandlerResponse
where
    H: Controller,
    R: Replicate<H> + ?Sized,
{
    let mut ctl = source.replicate();
    builder.attach(&mut ctl, RequestContext::from_request(req));

    let outcome = recover::contain(|| {
        ctl.pre_use();
        ctl.action()
    });

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            ctl.log().warn(format_args!("[controller error] {err:#}"));
            ctl.render_json_fail(&DispatchError::Action(err));
        }
        Err(fault) => {
            ctl.log().panic("controller", &fault);
            ctl.render_json_fail(&DispatchError::Panicked(fault));
        }
    }

    ctl.take_response().unwrap_or_else(HandlerResponse::no_content)
}
