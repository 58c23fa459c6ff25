//! Bounded waiting for engine replies.
//!
//! Every engine call is awaited under a timeout. A late reply is reported as
//! a timeout; a failed one is wrapped into the read or write failure for the
//! data-tree node the call was made for.

use crate::error::{ApiError, ApiResult, ReadFailedError, WriteFailedError};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};
use vpp_types::InstanceId;

enum ReplyFailure {
    Timeout,
    Failed(ApiError),
}

/// Awaits engine replies with a fixed timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyConsumer {
    timeout: Duration,
}

impl Default for ReplyConsumer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl ReplyConsumer {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn await_reply<T, F>(&self, reply: F) -> Result<T, ReplyFailure>
    where
        F: Future<Output = ApiResult<T>>,
    {
        match time::timeout(self.timeout, reply).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ReplyFailure::Failed(err)),
            Err(_) => Err(ReplyFailure::Timeout),
        }
    }

    /// Awaits a reply needed to serve a read of `id`.
    pub async fn get_reply_for_read<T, F>(
        &self,
        reply: F,
        id: &InstanceId,
    ) -> Result<T, ReadFailedError>
    where
        F: Future<Output = ApiResult<T>>,
    {
        self.await_reply(reply).await.map_err(|failure| match failure {
            ReplyFailure::Timeout => {
                warn!(id = %id, timeout = ?self.timeout, "Engine reply timed out during read");
                ReadFailedError::Timeout {
                    id: id.clone(),
                    timeout: self.timeout,
                }
            }
            ReplyFailure::Failed(err) => {
                debug!(id = %id, error = %err, "Engine call failed during read");
                ReadFailedError::failed(id, err)
            }
        })
    }

    /// Awaits a reply for a write of `id` that is neither a plain create,
    /// update nor delete.
    pub async fn get_reply_for_write<T, F>(
        &self,
        reply: F,
        id: &InstanceId,
    ) -> Result<T, WriteFailedError>
    where
        F: Future<Output = ApiResult<T>>,
    {
        self.await_write(reply, id, |source| WriteFailedError::Failed {
            id: id.clone(),
            source,
        })
        .await
    }

    pub async fn get_reply_for_create<T, F, D>(
        &self,
        reply: F,
        id: &InstanceId,
        data: &D,
    ) -> Result<T, WriteFailedError>
    where
        F: Future<Output = ApiResult<T>>,
        D: Debug + ?Sized,
    {
        self.await_write(reply, id, |source| WriteFailedError::Create {
            id: id.clone(),
            data: format!("{:?}", data),
            source,
        })
        .await
    }

    pub async fn get_reply_for_update<T, F, D>(
        &self,
        reply: F,
        id: &InstanceId,
        before: &D,
        after: &D,
    ) -> Result<T, WriteFailedError>
    where
        F: Future<Output = ApiResult<T>>,
        D: Debug + ?Sized,
    {
        self.await_write(reply, id, |source| WriteFailedError::Update {
            id: id.clone(),
            before: format!("{:?}", before),
            after: format!("{:?}", after),
            source,
        })
        .await
    }

    pub async fn get_reply_for_delete<T, F>(
        &self,
        reply: F,
        id: &InstanceId,
    ) -> Result<T, WriteFailedError>
    where
        F: Future<Output = ApiResult<T>>,
    {
        self.await_write(reply, id, |source| WriteFailedError::Delete {
            id: id.clone(),
            source,
        })
        .await
    }

    async fn await_write<T, F, E>(
        &self,
        reply: F,
        id: &InstanceId,
        on_failure: E,
    ) -> Result<T, WriteFailedError>
    where
        F: Future<Output = ApiResult<T>>,
        E: FnOnce(ApiError) -> WriteFailedError,
    {
        match self.await_reply(reply).await {
            Ok(value) => Ok(value),
            Err(ReplyFailure::Timeout) => {
                warn!(id = %id, timeout = ?self.timeout, "Engine reply timed out during write");
                Err(WriteFailedError::Timeout {
                    id: id.clone(),
                    timeout: self.timeout,
                })
            }
            Err(ReplyFailure::Failed(err)) => {
                warn!(id = %id, error = %err, "Engine rejected write");
                Err(on_failure(err))
            }
        }
    }
}
