//! Interface dumps shared by every interface reader of a transaction.
//!
//! Listing interfaces and reading single interfaces both go through
//! [`InterfaceCacheDumpManager`]. The first full dump of a transaction also
//! registers the engine's name for every interface index that has no mapping
//! yet, and indexes the details by name so that later single-interface reads
//! never hit the engine.

use crate::cache::{DumpCacheManager, DumpExecutor, StaticCacheKeyFactory};
use crate::error::TranslateError;
use crate::naming::NamingContext;
use crate::read_context::ReadContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use vpp_api::{EngineClient, ReadFailedError, ReplyConsumer, SwInterfaceDetails, SwInterfaceDump};
use vpp_types::InstanceId;

const BY_NAME_INDEX_KEY: &str = "interface-details-by-name";

type InterfaceDetailsByName = HashMap<String, SwInterfaceDetails>;

struct InterfaceDumpExecutor<C> {
    client: Arc<C>,
    replies: ReplyConsumer,
}

impl<C: EngineClient> InterfaceDumpExecutor<C> {
    async fn dump(&self, id: &InstanceId, request: SwInterfaceDump) -> Result<Vec<SwInterfaceDetails>, ReadFailedError> {
        self.replies.get_reply_for_read(self.client.send(request), id).await
    }
}

#[async_trait]
impl<C: EngineClient + 'static> DumpExecutor<Vec<SwInterfaceDetails>> for InterfaceDumpExecutor<C> {
    async fn execute_dump(&self, id: &InstanceId, _params: &()) -> Result<Vec<SwInterfaceDetails>, ReadFailedError> {
        self.dump(id, SwInterfaceDump::all()).await
    }
}

#[async_trait]
impl<C: EngineClient + 'static> DumpExecutor<Vec<SwInterfaceDetails>, String> for InterfaceDumpExecutor<C> {
    async fn execute_dump(&self, id: &InstanceId, name: &String) -> Result<Vec<SwInterfaceDetails>, ReadFailedError> {
        self.dump(id, SwInterfaceDump::by_name(name.as_str())).await
    }
}

/// Full and name-filtered interface dumps behind one per-transaction cache.
pub struct InterfaceCacheDumpManager {
    naming: Arc<NamingContext>,
    full_dump: DumpCacheManager<Vec<SwInterfaceDetails>>,
    specific_dump: DumpCacheManager<Vec<SwInterfaceDetails>, String>,
}

impl InterfaceCacheDumpManager {
    pub fn new<C: EngineClient + 'static>(client: Arc<C>, replies: ReplyConsumer, naming: Arc<NamingContext>) -> Self {
        let full_dump: DumpCacheManager<Vec<SwInterfaceDetails>> = DumpCacheManager::builder(InterfaceDumpExecutor {
            client: Arc::clone(&client),
            replies,
        })
        .with_cache_key_factory(StaticCacheKeyFactory::new::<Vec<SwInterfaceDetails>>("sw_interface_dump_all"))
        .build();
        let specific_dump: DumpCacheManager<Vec<SwInterfaceDetails>, String> =
            DumpCacheManager::builder(InterfaceDumpExecutor { client, replies }).build();

        Self {
            naming,
            full_dump,
            specific_dump,
        }
    }

    /// Every interface the engine knows, dumped at most once per transaction.
    ///
    /// Interface indices with no name mapping get the engine's name.
    pub async fn get_interfaces(&self, id: &InstanceId, ctx: &ReadContext) -> Result<Arc<Vec<SwInterfaceDetails>>, TranslateError> {
        let dump = self
            .full_dump
            .get_dump(id, ctx.modification_cache(), &())
            .await?
            .unwrap_or_default();

        let mappings = ctx.mapping_context();
        for details in dump.iter() {
            if self
                .naming
                .add_name_if_index_absent(details.sw_if_index, details.name(), mappings)?
            {
                debug!(
                    index = details.sw_if_index,
                    name = details.name(),
                    "Registered engine interface name"
                );
            }
        }

        let cache = ctx.modification_cache();
        if !cache.contains_key(BY_NAME_INDEX_KEY) {
            let mut by_name = InterfaceDetailsByName::with_capacity(dump.len());
            for details in dump.iter() {
                let name = self.naming.get_name(details.sw_if_index, mappings)?;
                by_name.insert(name, details.clone());
            }
            cache.put(BY_NAME_INDEX_KEY, by_name);
        }

        Ok(dump)
    }

    /// Details of the interface mapped to `name`.
    ///
    /// Answered from the full dump if this transaction already has it,
    /// otherwise from a dump filtered by name.
    pub async fn get_interface_detail(
        &self,
        id: &InstanceId,
        ctx: &ReadContext,
        name: &str,
    ) -> Result<Option<SwInterfaceDetails>, TranslateError> {
        let cache = ctx.modification_cache();
        if let Some(by_name) = cache.get::<InterfaceDetailsByName>(BY_NAME_INDEX_KEY) {
            return Ok(by_name.get(name).cloned());
        }

        let dump = self
            .specific_dump
            .get_dump(id, cache, &name.to_string())
            .await?
            .unwrap_or_default();
        Ok(dump.iter().find(|details| details.name() == name).cloned())
    }
}
