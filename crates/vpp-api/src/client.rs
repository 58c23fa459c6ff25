//! Engine client seam.
//!
//! Translators never talk to the engine transport directly. They build a
//! typed request and hand it to an [`EngineClient`]; the reply type is fixed
//! by the request, so a dump request can only ever yield its details list.

use crate::error::ApiResult;
use async_trait::async_trait;
use std::fmt::Debug;

/// A request message understood by the engine.
pub trait ApiRequest: Debug + Send + Sync + 'static {
    /// Reply produced for this request. Dump requests reply with a list.
    type Reply: Send + 'static;

    /// Engine message name, used in errors and logs.
    const NAME: &'static str;
}

/// Asynchronous call surface of the forwarding engine.
///
/// A returned `Err` means the call failed (transport error or non-zero
/// retval); timeouts are applied by the caller through
/// [`ReplyConsumer`](crate::ReplyConsumer).
#[async_trait]
pub trait EngineClient: Send + Sync {
    async fn send<R: ApiRequest>(&self, request: R) -> ApiResult<R::Reply>;
}
