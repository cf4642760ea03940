//! Shared types used throughout the library.

mod direction;
mod transform;

pub use direction::{Axis, Direction};
pub use transform::{BlockTransform, ElementRotation};

use std::collections::BTreeMap;

/// One concrete state of one block instance: property name to value.
pub type BlockStateProperties = BTreeMap<String, String>;

/// A block type plus its current state, e.g. `minecraft:oak_stairs[facing=north]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputBlock {
    /// Block name, e.g., "minecraft:stone"
    pub name: String,
    /// Block properties, e.g., {"facing": "north"}
    pub properties: BlockStateProperties,
}

impl InputBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BlockStateProperties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: BlockStateProperties) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Get the namespace (e.g., "minecraft").
    pub fn namespace(&self) -> &str {
        match self.name.split_once(':') {
            Some((namespace, _)) => namespace,
            None => "minecraft",
        }
    }

    /// Get the block ID without namespace (e.g., "stone").
    pub fn block_id(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, id)) => id,
            None => &self.name,
        }
    }

    /// Stable identity of this block state: `name` or `name[k1=v1,k2=v2]`
    /// with keys in sorted order.
    pub fn state_key(&self) -> String {
        if self.properties.is_empty() {
            return format!("{}:{}", self.namespace(), self.block_id());
        }
        let props: Vec<String> = self
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}:{}[{}]", self.namespace(), self.block_id(), props.join(","))
    }
}
