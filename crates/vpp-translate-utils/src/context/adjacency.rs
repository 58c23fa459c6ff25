//! LISP adjacency identification: adjacency id to (local, remote) EID pair.

use crate::error::{ContextError, ContextResult};
use crate::store::{ContextKey, MappingContext, MappingContextExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Mapping ids of the two EIDs an adjacency connects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EidIdentificatorPair {
    pub local_eid_id: String,
    pub remote_eid_id: String,
}

impl EidIdentificatorPair {
    pub fn new(local_eid_id: impl Into<String>, remote_eid_id: impl Into<String>) -> Self {
        Self {
            local_eid_id: local_eid_id.into(),
            remote_eid_id: remote_eid_id.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AdjacencyMapping {
    id: String,
    #[serde(flatten)]
    pair: EidIdentificatorPair,
}

#[derive(Debug)]
pub struct AdjacenciesMappingContext {
    instance_name: String,
    mappings: ContextKey,
    lock: Mutex<()>,
}

impl AdjacenciesMappingContext {
    pub fn new(instance_name: impl Into<String>) -> Self {
        let instance_name = instance_name.into();
        let mappings = ContextKey::from_segments([
            "adjacencies-identification-context",
            instance_name.as_str(),
            "mappings",
        ]);
        Self {
            instance_name,
            mappings,
            lock: Mutex::new(()),
        }
    }

    fn context(&self) -> String {
        format!("adjacencies-identification-context/{}", self.instance_name)
    }

    fn ids_for(&self, pair: &EidIdentificatorPair, ctx: &dyn MappingContext) -> ContextResult<Vec<String>> {
        Ok(ctx
            .list_as::<AdjacencyMapping>(&self.mappings)?
            .into_iter()
            .filter(|(_, mapping)| mapping.pair == *pair)
            .map(|(_, mapping)| mapping.id)
            .collect())
    }

    pub fn add_eid_pair(
        &self,
        adjacency_id: &str,
        local_eid_id: &str,
        remote_eid_id: &str,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let _guard = self.lock.lock();
        let mapping = AdjacencyMapping {
            id: adjacency_id.to_string(),
            pair: EidIdentificatorPair::new(local_eid_id, remote_eid_id),
        };
        ctx.put_as(&self.mappings.child(adjacency_id), &mapping)
    }

    /// True if an adjacency is stored for the EID pair.
    pub fn contains_id(&self, local_eid_id: &str, remote_eid_id: &str, ctx: &dyn MappingContext) -> ContextResult<bool> {
        let _guard = self.lock.lock();
        let pair = EidIdentificatorPair::new(local_eid_id, remote_eid_id);
        Ok(!self.ids_for(&pair, ctx)?.is_empty())
    }

    /// Adjacency id for the EID pair; the pair must be known.
    pub fn get_adjacency_id(
        &self,
        local_eid_id: &str,
        remote_eid_id: &str,
        ctx: &dyn MappingContext,
    ) -> ContextResult<String> {
        let _guard = self.lock.lock();
        let pair = EidIdentificatorPair::new(local_eid_id, remote_eid_id);
        let mut ids = self.ids_for(&pair, ctx)?;
        match ids.len() {
            1 => Ok(ids.remove(0)),
            0 => Err(ContextError::invariant(
                self.context(),
                format!("no adjacency for eid pair {}/{}", local_eid_id, remote_eid_id),
            )),
            _ => Err(ContextError::invariant(
                self.context(),
                format!(
                    "multiple adjacencies for eid pair {}/{}: {}",
                    local_eid_id,
                    remote_eid_id,
                    ids.join(", ")
                ),
            )),
        }
    }

    pub fn get_eid_pair(&self, adjacency_id: &str, ctx: &dyn MappingContext) -> ContextResult<EidIdentificatorPair> {
        let _guard = self.lock.lock();
        ctx.read_as::<AdjacencyMapping>(&self.mappings.child(adjacency_id))?
            .map(|mapping| mapping.pair)
            .ok_or_else(|| ContextError::not_found(self.context(), adjacency_id))
    }

    pub fn contains_eid_pair_for_index(&self, adjacency_id: &str, ctx: &dyn MappingContext) -> bool {
        let _guard = self.lock.lock();
        ctx.read(&self.mappings.child(adjacency_id)).is_some()
    }

    pub fn remove_for_index(&self, adjacency_id: &str, ctx: &dyn MappingContext) {
        let _guard = self.lock.lock();
        ctx.delete(&self.mappings.child(adjacency_id));
    }
}
