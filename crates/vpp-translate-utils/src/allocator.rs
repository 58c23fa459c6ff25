//! Append-only index allocation.
//!
//! An allocated index is `max(highest index ever recorded + 1, highest
//! existing index + 1, start)`. The high-water mark lives in the mapping
//! store next to the mappings, so removing the newest mapping and
//! allocating again yields a fresh index, also after a restart.
//!
//! The mark is kept as a `u64` so that recording `u32::MAX` leaves it past
//! the index space instead of pinning it at the last index.

use crate::error::{ContextError, ContextResult};
use crate::store::{ContextKey, MappingContext, MappingContextExt};

#[derive(Debug, Clone)]
pub(crate) struct HighWaterMark {
    key: ContextKey,
    start: u32,
}

impl HighWaterMark {
    pub(crate) fn new(key: ContextKey, start: u32) -> Self {
        Self { key, start }
    }

    fn mark(&self, ctx: &dyn MappingContext) -> ContextResult<u64> {
        Ok(ctx
            .read_as::<u64>(&self.key)?
            .unwrap_or_else(|| u64::from(self.start)))
    }

    /// Next free index given the indices currently in use.
    ///
    /// # Errors
    ///
    /// [`ContextError::InvariantViolation`] once every index up to
    /// `u32::MAX` has been handed out.
    pub(crate) fn next(
        &self,
        ctx: &dyn MappingContext,
        in_use: impl IntoIterator<Item = u32>,
    ) -> ContextResult<u32> {
        let after_existing = in_use
            .into_iter()
            .max()
            .map_or(u64::from(self.start), |max| u64::from(max) + 1);
        let next = self.mark(ctx)?.max(after_existing).max(u64::from(self.start));
        u32::try_from(next)
            .map_err(|_| ContextError::invariant(self.key.to_string(), "index space exhausted"))
    }

    /// Records `index` as used, raising the mark past it.
    pub(crate) fn observe(&self, ctx: &dyn MappingContext, index: u32) -> ContextResult<()> {
        let next = u64::from(index) + 1;
        if next > self.mark(ctx)? {
            ctx.put_as(&self.key, &next)?;
        }
        Ok(())
    }
}
