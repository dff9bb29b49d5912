//! Configuration-tree nodes
//!
//! The configuration-tree parser is an external collaborator. The framework
//! only needs a read-only view of a subtree and a way to find the subtree a
//! device's match attribute points at, which [`PropertyResolver`] provides.
//! [`PropertyNode`] is the in-memory form of such a subtree; it resolves match
//! attributes itself by a depth-first search, so a parsed tree can be handed
//! to the loader directly.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Attribute value of a property node
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PropertyValue {
    Bool(bool),
    U64(u64),
    String(String),
    U64Array(Vec<u64>),
}

/// Node of the configuration tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyNode {
    pub name: String,
    /// Match attribute a device descriptor refers to this node by
    #[cfg_attr(feature = "serde", serde(default))]
    pub match_attr: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub attributes: BTreeMap<String, PropertyValue>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<PropertyNode>,
}

impl PropertyNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_match_attr(mut self, match_attr: &str) -> Self {
        self.match_attr = Some(match_attr.to_string());
        self
    }

    pub fn with_attr(mut self, key: &str, value: PropertyValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn with_child(mut self, child: PropertyNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&PropertyValue> {
        self.attributes.get(key)
    }

    pub fn read_u64(&self, key: &str) -> Option<u64> {
        match self.attr(key)? {
            PropertyValue::U64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn read_str(&self, key: &str) -> Option<&str> {
        match self.attr(key)? {
            PropertyValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn read_bool(&self, key: &str) -> Option<bool> {
        match self.attr(key)? {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Depth-first search for the node carrying `match_attr`
    pub fn find_by_match_attr(&self, match_attr: &str) -> Option<&PropertyNode> {
        if self.match_attr.as_deref() == Some(match_attr) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_by_match_attr(match_attr))
    }
}

/// Lookup of the property subtree a device refers to
pub trait PropertyResolver: Send + Sync {
    /// Resolve the subtree carrying `match_attr`, if any
    fn resolve(&self, match_attr: &str) -> Option<Arc<PropertyNode>>;
}

impl PropertyResolver for PropertyNode {
    fn resolve(&self, match_attr: &str) -> Option<Arc<PropertyNode>> {
        if match_attr.is_empty() {
            return None;
        }
        self.find_by_match_attr(match_attr).cloned().map(Arc::new)
    }
}

/// Resolver for systems without a configuration tree
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProperties;

impl PropertyResolver for EmptyProperties {
    fn resolve(&self, _match_attr: &str) -> Option<Arc<PropertyNode>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> PropertyNode {
        PropertyNode::new("root").with_child(
            PropertyNode::new("platform")
                .with_child(
                    PropertyNode::new("uart0")
                        .with_match_attr("uart_0")
                        .with_attr("baud", PropertyValue::U64(115200)),
                )
                .with_child(
                    PropertyNode::new("gpio")
                        .with_match_attr("gpio_ctrl")
                        .with_attr("label", PropertyValue::String("gpio0".into())),
                ),
        )
    }

    #[test]
    fn test_resolve_nested() {
        let tree = sample_tree();
        let uart = tree.resolve("uart_0").unwrap();
        assert_eq!(uart.name, "uart0");
        assert_eq!(uart.read_u64("baud"), Some(115200));
        assert_eq!(uart.read_str("baud"), None);

        let gpio = tree.resolve("gpio_ctrl").unwrap();
        assert_eq!(gpio.read_str("label"), Some("gpio0"));
    }

    #[test]
    fn test_resolve_missing() {
        let tree = sample_tree();
        assert!(tree.resolve("spi_0").is_none());
        assert!(tree.resolve("").is_none());
        assert!(EmptyProperties.resolve("uart_0").is_none());
    }
}
