//! Engine call surface for VPP translation.
//!
//! - [`client`]: the [`EngineClient`] seam and the [`ApiRequest`] trait that
//!   ties each request to its reply type
//! - [`reply`]: [`ReplyConsumer`], bounded waiting with typed failures
//! - [`error`]: engine status codes, [`ApiError`], read/write failures
//! - [`messages`]: request and reply messages used by the translators
//!
//! # Example
//!
//! ```ignore
//! use vpp_api::{EngineClient, ReplyConsumer, SwInterfaceDump};
//!
//! async fn interfaces<C: EngineClient>(client: &C, id: &InstanceId) -> Result<_, ReadFailedError> {
//!     ReplyConsumer::default()
//!         .get_reply_for_read(client.send(SwInterfaceDump::all()), id)
//!         .await
//! }
//! ```

pub mod client;
pub mod error;
pub mod messages;
pub mod reply;

pub use client::{ApiRequest, EngineClient};
pub use error::{ApiError, ApiResult, ApiStatus, ReadFailedError, WriteFailedError};
pub use messages::{
    Nat44StaticMappingDetails, Nat44StaticMappingDump, Nat64BibDetails, Nat64BibDump,
    SwInterfaceDetails, SwInterfaceDump,
};
pub use reply::ReplyConsumer;
