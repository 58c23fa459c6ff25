//! Configuration for the naming contexts, engine replies and the mapping store.
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file is valid.

use crate::context::{
    AclContextManager, AdjacenciesMappingContext, ClassifierContextManager, EidMappingContext,
    GpeLocatorPairMappingContext,
};
use crate::error::{Result, TranslateError};
use crate::naming::NamingContext;
use crate::store::MappingStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use vpp_api::ReplyConsumer;

/// Instance names and artificial name prefixes of the naming contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "default_interface_instance")]
    pub interface_instance: String,

    #[serde(default = "default_interface_prefix")]
    pub interface_prefix: String,

    #[serde(default = "default_bridge_domain_instance")]
    pub bridge_domain_instance: String,

    #[serde(default = "default_bridge_domain_prefix")]
    pub bridge_domain_prefix: String,

    #[serde(default = "default_acl_instance")]
    pub acl_instance: String,

    #[serde(default = "default_acl_prefix")]
    pub acl_prefix: String,

    #[serde(default = "default_classifier_prefix")]
    pub classifier_prefix: String,

    #[serde(default = "default_local_eid_instance")]
    pub local_eid_instance: String,

    #[serde(default = "default_remote_eid_instance")]
    pub remote_eid_instance: String,

    #[serde(default = "default_adjacency_instance")]
    pub adjacency_instance: String,

    #[serde(default = "default_gpe_locator_instance")]
    pub gpe_locator_instance: String,
}

/// Engine connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Time to wait for a reply before failing the request
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_ms: u64,
}

/// Mapping store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Snapshot file; mappings are kept in memory only when unset
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// Complete translation layer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateConfig {
    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_interface_instance() -> String {
    "interface-context".to_string()
}

fn default_interface_prefix() -> String {
    "interface".to_string()
}

fn default_bridge_domain_instance() -> String {
    "bridge-domain-context".to_string()
}

fn default_bridge_domain_prefix() -> String {
    "bridge-domain".to_string()
}

fn default_acl_instance() -> String {
    "acl-context".to_string()
}

fn default_acl_prefix() -> String {
    "acl".to_string()
}

fn default_classifier_prefix() -> String {
    "classify-table".to_string()
}

fn default_local_eid_instance() -> String {
    "local-mapping-context".to_string()
}

fn default_remote_eid_instance() -> String {
    "remote-mapping-context".to_string()
}

fn default_adjacency_instance() -> String {
    "adjacencies-mapping-context".to_string()
}

fn default_gpe_locator_instance() -> String {
    "gpe-entry-locator-pairs".to_string()
}

fn default_reply_timeout() -> u64 {
    5000
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            interface_instance: default_interface_instance(),
            interface_prefix: default_interface_prefix(),
            bridge_domain_instance: default_bridge_domain_instance(),
            bridge_domain_prefix: default_bridge_domain_prefix(),
            acl_instance: default_acl_instance(),
            acl_prefix: default_acl_prefix(),
            classifier_prefix: default_classifier_prefix(),
            local_eid_instance: default_local_eid_instance(),
            remote_eid_instance: default_remote_eid_instance(),
            adjacency_instance: default_adjacency_instance(),
            gpe_locator_instance: default_gpe_locator_instance(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: default_reply_timeout(),
        }
    }
}

impl NamingConfig {
    pub fn interface_context(&self) -> NamingContext {
        NamingContext::new(&self.interface_prefix, &self.interface_instance)
    }

    pub fn bridge_domain_context(&self) -> NamingContext {
        NamingContext::new(&self.bridge_domain_prefix, &self.bridge_domain_instance)
    }

    pub fn acl_context(&self) -> AclContextManager {
        AclContextManager::new(&self.acl_prefix, &self.acl_instance)
    }

    pub fn classifier_context(&self) -> ClassifierContextManager {
        ClassifierContextManager::new(&self.classifier_prefix)
    }

    pub fn local_eid_context(&self) -> EidMappingContext {
        EidMappingContext::new(&self.local_eid_instance)
    }

    pub fn remote_eid_context(&self) -> EidMappingContext {
        EidMappingContext::new(&self.remote_eid_instance)
    }

    pub fn adjacency_context(&self) -> AdjacenciesMappingContext {
        AdjacenciesMappingContext::new(&self.adjacency_instance)
    }

    pub fn gpe_locator_context(&self) -> GpeLocatorPairMappingContext {
        GpeLocatorPairMappingContext::new(&self.gpe_locator_instance)
    }

    fn fields(&self) -> [(&'static str, &str); 11] {
        [
            ("interface_instance", self.interface_instance.as_str()),
            ("interface_prefix", self.interface_prefix.as_str()),
            ("bridge_domain_instance", self.bridge_domain_instance.as_str()),
            ("bridge_domain_prefix", self.bridge_domain_prefix.as_str()),
            ("acl_instance", self.acl_instance.as_str()),
            ("acl_prefix", self.acl_prefix.as_str()),
            ("classifier_prefix", self.classifier_prefix.as_str()),
            ("local_eid_instance", self.local_eid_instance.as_str()),
            ("remote_eid_instance", self.remote_eid_instance.as_str()),
            ("adjacency_instance", self.adjacency_instance.as_str()),
            ("gpe_locator_instance", self.gpe_locator_instance.as_str()),
        ]
    }
}

impl TranslateConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                TranslateError::configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(TranslateError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TranslateError::configuration(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.reply_timeout_ms)
    }

    pub fn reply_consumer(&self) -> ReplyConsumer {
        ReplyConsumer::new(self.reply_timeout())
    }

    /// Opens the mapping store, restoring the snapshot if one is configured.
    pub fn open_store(&self) -> Result<MappingStore> {
        match &self.store.snapshot_path {
            Some(path) => Ok(MappingStore::load_or_default(path)?),
            None => Ok(MappingStore::new()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some((field, _)) = self.naming.fields().into_iter().find(|(_, value)| value.is_empty()) {
            return Err(TranslateError::configuration(format!("naming.{} must not be empty", field)));
        }

        if self.engine.reply_timeout_ms == 0 {
            return Err(TranslateError::configuration("reply_timeout_ms must be > 0"));
        }

        Ok(())
    }
}
