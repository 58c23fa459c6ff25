//! Classify table naming, with per-table graph node names.

use crate::error::{ContextError, ContextResult};
use crate::naming::Mapping;
use crate::store::{ContextKey, MappingContext, MappingContextExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TableMapping {
    name: String,
    index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    classifier_node: Option<String>,
}

#[derive(Debug)]
pub struct ClassifierContextManager {
    artificial_name_prefix: String,
    tables: ContextKey,
    lock: Mutex<()>,
}

impl ClassifierContextManager {
    const CONTEXT: &'static str = "vpp-classifier-context";

    pub fn new(artificial_name_prefix: impl Into<String>) -> Self {
        Self {
            artificial_name_prefix: artificial_name_prefix.into(),
            tables: ContextKey::from_segments([Self::CONTEXT, "tables"]),
            lock: Mutex::new(()),
        }
    }

    fn table_key(&self, name: &str) -> ContextKey {
        self.tables.child(name)
    }

    fn tables(&self, ctx: &dyn MappingContext) -> ContextResult<Vec<TableMapping>> {
        ctx.list(&self.tables)
            .into_iter()
            .filter(|(key, _)| key.is_child_of(&self.tables))
            .map(|(key, value)| {
                serde_json::from_value::<TableMapping>(value).map_err(|source| ContextError::Codec {
                    key: key.to_string(),
                    source,
                })
            })
            .collect()
    }

    fn table_name_for(&self, index: u32, ctx: &dyn MappingContext) -> ContextResult<Option<String>> {
        let mut named = self
            .tables(ctx)?
            .into_iter()
            .filter(|table| table.index == index);

        match (named.next(), named.next()) {
            (None, _) => Ok(None),
            (Some(table), None) => Ok(Some(table.name)),
            (Some(first), Some(second)) => Err(ContextError::invariant(
                Self::CONTEXT,
                format!("multiple tables with index {}: {}, {}", index, first.name, second.name),
            )),
        }
    }

    fn add_table_locked(
        &self,
        index: u32,
        name: &str,
        classifier_node: Option<&str>,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let key = self.table_key(name);
        ctx.delete(&key);
        ctx.put_as(
            &key,
            &TableMapping {
                name: name.to_string(),
                index,
                classifier_node: classifier_node.map(str::to_string),
            },
        )
    }

    /// Stores table `name` under `index`, with the graph node it hangs off.
    /// Node names recorded for a previous table of that name are dropped.
    pub fn add_table(
        &self,
        index: u32,
        name: &str,
        classifier_node: Option<&str>,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let _guard = self.lock.lock();
        self.add_table_locked(index, name, classifier_node, ctx)
    }

    pub fn contains_table(&self, name: &str, ctx: &dyn MappingContext) -> bool {
        let _guard = self.lock.lock();
        ctx.read(&self.table_key(name)).is_some()
    }

    pub fn get_table_index(&self, name: &str, ctx: &dyn MappingContext) -> ContextResult<u32> {
        let _guard = self.lock.lock();
        ctx.read_as::<TableMapping>(&self.table_key(name))?
            .map(|table| table.index)
            .ok_or_else(|| ContextError::not_found(Self::CONTEXT, name))
    }

    pub fn get_table_name(&self, index: u32, ctx: &dyn MappingContext) -> ContextResult<String> {
        let _guard = self.lock.lock();
        if let Some(name) = self.table_name_for(index, ctx)? {
            return Ok(name);
        }

        let name = format!("{}{}", self.artificial_name_prefix, index);
        debug!(index, name = %name, "Synthesized artificial classify table name");
        self.add_table_locked(index, &name, None, ctx)?;
        Ok(name)
    }

    pub fn get_table_base_node(&self, name: &str, ctx: &dyn MappingContext) -> ContextResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(ctx
            .read_as::<TableMapping>(&self.table_key(name))?
            .and_then(|table| table.classifier_node))
    }

    pub fn remove_table(&self, name: &str, ctx: &dyn MappingContext) {
        let _guard = self.lock.lock();
        ctx.delete(&self.table_key(name));
    }

    /// Records the name of next-node `node_index` of table `table_name`.
    pub fn add_node_name(
        &self,
        table_name: &str,
        node_index: u32,
        node_name: &str,
        ctx: &dyn MappingContext,
    ) -> ContextResult<()> {
        let _guard = self.lock.lock();
        let key = self.table_key(table_name).child("nodes").child(node_name);
        ctx.put_as(&key, &Mapping::new(node_name, node_index))
    }

    /// Name of next-node `node_index` of the table with `table_index`, if
    /// both are known.
    pub fn get_node_name(
        &self,
        table_index: u32,
        node_index: u32,
        ctx: &dyn MappingContext,
    ) -> ContextResult<Option<String>> {
        let _guard = self.lock.lock();
        let Some(table_name) = self.table_name_for(table_index, ctx)? else {
            return Ok(None);
        };

        let nodes = self.table_key(&table_name).child("nodes");
        Ok(ctx
            .list_as::<Mapping>(&nodes)?
            .into_iter()
            .map(|(_, mapping)| mapping)
            .find(|mapping| mapping.index == node_index)
            .map(|mapping| mapping.name))
    }
}
