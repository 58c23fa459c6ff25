//! Instance identifiers: paths into the declarative data tree.
//!
//! An [`InstanceId`] names one node of the model, e.g.
//! `/interfaces/interface[eth0]/ipv4/address[10.0.0.1]`. Readers pass it to
//! the dump cache (cache keys are derived from it) and engine failures are
//! tagged with it.

use std::fmt;

/// One step of an [`InstanceId`]: a node name plus, for list entries, the
/// entry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathArgument {
    node: String,
    key: Option<String>,
}

impl PathArgument {
    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl fmt::Display for PathArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}[{}]", self.node, key),
            None => f.write_str(&self.node),
        }
    }
}

/// Path from the data tree root to one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    path: Vec<PathArgument>,
}

impl InstanceId {
    /// Identifier of a top-level container.
    pub fn create(node: impl Into<String>) -> Self {
        Self {
            path: vec![PathArgument {
                node: node.into(),
                key: None,
            }],
        }
    }

    /// Identifier of a container below this node.
    pub fn child(&self, node: impl Into<String>) -> Self {
        self.push(node.into(), None)
    }

    /// Identifier of a keyed list entry below this node.
    pub fn keyed_child(&self, node: impl Into<String>, key: impl Into<String>) -> Self {
        self.push(node.into(), Some(key.into()))
    }

    fn push(&self, node: String, key: Option<String>) -> Self {
        let mut path = self.path.clone();
        path.push(PathArgument { node, key });
        Self { path }
    }

    pub fn path(&self) -> &[PathArgument] {
        &self.path
    }

    /// Node name of the last step.
    pub fn target(&self) -> &str {
        self.path.last().map(|arg| arg.node.as_str()).unwrap_or_default()
    }

    /// Key of the first list entry named `node` on the path, if any.
    ///
    /// This is how a child reader finds its parent's key, e.g. the interface
    /// name for `/interfaces/interface[eth0]/ipv4/address[..]`.
    pub fn first_key_of(&self, node: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|arg| arg.node == node)
            .and_then(|arg| arg.key.as_deref())
    }

    /// Keyed steps whose node name is one of `nodes`, in path order.
    pub fn keyed_steps<'a>(
        &'a self,
        nodes: &'a [String],
    ) -> impl Iterator<Item = &'a PathArgument> + 'a {
        self.path
            .iter()
            .filter(move |arg| arg.key.is_some() && nodes.iter().any(|n| *n == arg.node))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arg in &self.path {
            write!(f, "/{}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn address_id(ifc: &str, addr: &str) -> InstanceId {
        InstanceId::create("interfaces")
            .keyed_child("interface", ifc)
            .child("ipv4")
            .keyed_child("address", addr)
    }

    #[test]
    fn test_display() {
        assert_eq!(
            address_id("eth0", "10.0.0.1").to_string(),
            "/interfaces/interface[eth0]/ipv4/address[10.0.0.1]"
        );
    }

    #[test]
    fn test_first_key_of() {
        let id = address_id("eth0", "10.0.0.1");
        assert_eq!(id.first_key_of("interface"), Some("eth0"));
        assert_eq!(id.first_key_of("address"), Some("10.0.0.1"));
        assert_eq!(id.first_key_of("ipv4"), None);
        assert_eq!(id.first_key_of("missing"), None);
        assert_eq!(id.target(), "address");
    }

    #[test]
    fn test_keyed_steps_scope() {
        let scope = vec!["interface".to_string()];
        let a = address_id("eth0", "10.0.0.1");
        let b = address_id("eth0", "10.0.0.2");
        let c = address_id("eth1", "10.0.0.1");

        let scoped = |id: &InstanceId| -> Vec<String> {
            id.keyed_steps(&scope).map(|arg| arg.to_string()).collect()
        };
        assert_eq!(scoped(&a), vec!["interface[eth0]".to_string()]);
        assert_eq!(scoped(&a), scoped(&b));
        assert_ne!(scoped(&a), scoped(&c));
    }
}
