//! Blockstate definition parsing.
//!
//! Blockstates define how block properties map to model variants.
//! There are two formats: "variants" and "multipart". Both keep the
//! declaration order of the source file.

use crate::types::{BlockStateProperties, BlockTransform};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A blockstate definition from blockstates/*.json.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockstateDefinition {
    /// Simple variants: property combinations map to models.
    Variants(Vec<(String, Vec<ModelVariant>)>),
    /// Multipart: conditional model application.
    Multipart(Vec<MultipartCase>),
}

impl BlockstateDefinition {
    /// Variant list registered under exactly `key`.
    pub fn variant(&self, key: &str) -> Option<&[ModelVariant]> {
        match self {
            BlockstateDefinition::Variants(variants) => variants
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_slice()),
            BlockstateDefinition::Multipart(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for BlockstateDefinition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawBlockstate {
            variants: Option<Map<String, Value>>,
            multipart: Option<Vec<MultipartCase>>,
        }

        let raw = RawBlockstate::deserialize(deserializer)?;

        if let Some(variants) = raw.variants {
            let mut parsed = Vec::with_capacity(variants.len());
            for (key, value) in variants {
                let value: VariantValue = serde_json::from_value(value).map_err(D::Error::custom)?;
                parsed.push((key, value.into_vec()));
            }
            Ok(BlockstateDefinition::Variants(parsed))
        } else if let Some(multipart) = raw.multipart {
            Ok(BlockstateDefinition::Multipart(multipart))
        } else {
            Ok(BlockstateDefinition::Variants(Vec::new()))
        }
    }
}

/// A variant value can be a single model or an array of weighted models.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum VariantValue {
    Single(ModelVariant),
    Multiple(Vec<ModelVariant>),
}

impl VariantValue {
    fn into_vec(self) -> Vec<ModelVariant> {
        match self {
            VariantValue::Single(v) => vec![v],
            VariantValue::Multiple(v) => v,
        }
    }
}

/// A model variant reference with optional rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVariant {
    /// Model resource location (e.g., "block/stone" or "minecraft:block/stone").
    pub model: String,
    /// X rotation in degrees (0, 90, 180, 270).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    /// Y rotation in degrees (0, 90, 180, 270).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    /// If true, UV coordinates don't rotate with the block.
    #[serde(default)]
    pub uvlock: bool,
    /// Weight for random selection (default 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl ModelVariant {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            x: None,
            y: None,
            uvlock: false,
            weight: 1,
        }
    }

    /// Get the full resource location for the model.
    pub fn model_location(&self) -> String {
        if self.model.contains(':') {
            self.model.clone()
        } else {
            format!("minecraft:{}", self.model)
        }
    }

    /// Rotation to apply to the built model object.
    pub fn transform(&self) -> BlockTransform {
        BlockTransform::new(self.x, self.y, self.uvlock)
    }
}

/// A multipart case with optional condition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MultipartCase {
    /// Condition for when this case applies.
    #[serde(default)]
    pub when: Option<MultipartCondition>,
    /// Model(s) to apply when condition is met.
    #[serde(deserialize_with = "deserialize_apply")]
    pub apply: Vec<ModelVariant>,
}

fn deserialize_apply<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ModelVariant>, D::Error> {
    VariantValue::deserialize(deserializer).map(VariantValue::into_vec)
}

/// Property checks of a condition, in declaration order. Values may hold
/// `|`-separated alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionMap(pub Vec<(String, String)>);

impl ConditionMap {
    /// Every check must pass. A property absent from `properties` never
    /// matches, whatever the expected value.
    pub fn matches(&self, properties: &BlockStateProperties) -> bool {
        self.0.iter().all(|(key, expected)| {
            properties
                .get(key)
                .map(|actual| expected.split('|').any(|alt| alt == actual))
                .unwrap_or(false)
        })
    }

    /// First property and its first alternative.
    pub fn first(&self) -> Option<(&str, &str)> {
        self.0.first().map(|(key, value)| {
            let first_alt = value.split('|').next().unwrap_or(value);
            (key.as_str(), first_alt)
        })
    }
}

/// Multipart condition for when a case applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartCondition {
    /// OR condition: any of the sub-conditions must match.
    Or(Vec<ConditionMap>),
    /// AND condition: all of the sub-conditions must match.
    And(Vec<ConditionMap>),
    /// Simple condition: all properties must match.
    Simple(ConditionMap),
}

impl MultipartCondition {
    /// Check if the condition matches the given block properties.
    pub fn matches(&self, properties: &BlockStateProperties) -> bool {
        match self {
            MultipartCondition::Or(any) => any.iter().any(|cond| cond.matches(properties)),
            MultipartCondition::And(all) => all.iter().all(|cond| cond.matches(properties)),
            MultipartCondition::Simple(cond) => cond.matches(properties),
        }
    }
}

impl<'de> Deserialize<'de> for MultipartCondition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        if map.len() == 1 {
            if let Some(Value::Array(items)) = map.get("OR") {
                return condition_list(items).map(MultipartCondition::Or).map_err(D::Error::custom);
            }
            if let Some(Value::Array(items)) = map.get("AND") {
                return condition_list(items).map(MultipartCondition::And).map_err(D::Error::custom);
            }
        }
        condition_map(&map)
            .map(MultipartCondition::Simple)
            .map_err(D::Error::custom)
    }
}

fn condition_list(items: &[Value]) -> Result<Vec<ConditionMap>, String> {
    items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => condition_map(obj),
            other => Err(format!("expected a condition object, found {other}")),
        })
        .collect()
}

fn condition_map(obj: &Map<String, Value>) -> Result<ConditionMap, String> {
    obj.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => return Err(format!("unsupported condition value for {key}: {other}")),
            };
            Ok((key.clone(), value))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ConditionMap)
}
