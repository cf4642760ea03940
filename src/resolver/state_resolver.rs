//! Block state to model variant resolution.

use crate::error::Result;
use crate::resource_pack::{BlockstateDefinition, ModelVariant, MultipartCondition};
use crate::types::BlockStateProperties;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::HashMap;

/// How one variant is chosen from a weighted variant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantSelector {
    /// Always the first entry. Deterministic.
    #[default]
    First,
    /// Random by `weight`, from a generator seeded with `seed`.
    Weighted { seed: u64 },
}

/// Resolves block states to model variants.
pub struct StateResolver {
    selector: VariantSelector,
    rng: Mutex<StdRng>,
}

impl Default for StateResolver {
    fn default() -> Self {
        Self::new(VariantSelector::First)
    }
}

impl StateResolver {
    pub fn new(selector: VariantSelector) -> Self {
        let seed = match selector {
            VariantSelector::First => 0,
            VariantSelector::Weighted { seed } => seed,
        };
        Self {
            selector,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn selector(&self) -> VariantSelector {
        self.selector
    }

    /// Variants to instantiate together for `properties`.
    ///
    /// The variants form yields one entry per matching key; the multipart form
    /// yields one entry per applying case, in file order, without
    /// deduplication. No match is an empty list.
    pub fn map_state_to_variant(
        &self,
        definition: &BlockstateDefinition,
        properties: &BlockStateProperties,
    ) -> Vec<ModelVariant> {
        match definition {
            BlockstateDefinition::Variants(variants) => {
                if let [(key, only)] = variants.as_slice() {
                    if key.is_empty() {
                        return self.pick(only).into_iter().collect();
                    }
                }
                variants
                    .iter()
                    .filter(|(key, _)| variant_key_matches(key, properties))
                    .filter_map(|(_, list)| self.pick(list))
                    .collect()
            }
            BlockstateDefinition::Multipart(cases) => cases
                .iter()
                .filter(|case| {
                    case.when
                        .as_ref()
                        .map(|when| when.matches(properties))
                        .unwrap_or(true)
                })
                .filter_map(|case| self.pick(&case.apply))
                .collect(),
        }
    }

    /// Choose one entry of a variant list.
    pub fn pick(&self, candidates: &[ModelVariant]) -> Option<ModelVariant> {
        match self.selector {
            VariantSelector::First => candidates.first().cloned(),
            VariantSelector::Weighted { .. } => {
                let mut rng = self.rng.lock();
                candidates
                    .choose_weighted(&mut *rng, |v| v.weight)
                    .ok()
                    .or_else(|| candidates.first())
                    .cloned()
            }
        }
    }
}

/// Whether every `prop=value` pair of a variant key holds in `properties`.
/// Absent properties never match.
pub fn variant_key_matches(key: &str, properties: &BlockStateProperties) -> bool {
    key.split(',')
        .filter(|pair| !pair.is_empty())
        .all(|pair| match pair.split_once('=') {
            Some((prop, value)) => properties.get(prop).map(|v| v == value).unwrap_or(false),
            None => false,
        })
}

/// Parse a variant key such as `facing=north,half=bottom`.
pub fn parse_variant_key(key: &str) -> BlockStateProperties {
    key.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Explicit per-block default properties, e.g. loaded from a
/// `{"minecraft:oak_stairs": {"facing": "north", ...}}` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct StateDefaults {
    blocks: HashMap<String, BlockStateProperties>,
}

impl StateDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn insert(&mut self, block: impl Into<String>, properties: BlockStateProperties) {
        self.blocks.insert(block.into(), properties);
    }

    /// Explicit defaults for `block`, looked up by full name then by id.
    pub fn get(&self, block: &str) -> Option<&BlockStateProperties> {
        self.blocks.get(block).or_else(|| {
            let id = block.split_once(':').map(|(_, id)| id)?;
            self.blocks.get(id)
        })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Initial properties of `block`.
    ///
    /// An explicit table entry wins outright. Otherwise the first declared
    /// variant key is used, or for multipart definitions the first property
    /// (and its first alternative) of the first condition, unless that
    /// condition is an `OR`.
    pub fn default_properties(&self, block: &str, definition: &BlockstateDefinition) -> BlockStateProperties {
        if let Some(explicit) = self.get(block) {
            return explicit.clone();
        }

        match definition {
            BlockstateDefinition::Variants(variants) => variants
                .first()
                .map(|(key, _)| parse_variant_key(key))
                .unwrap_or_default(),
            BlockstateDefinition::Multipart(cases) => {
                let first = cases.iter().find_map(|case| case.when.as_ref());
                let condition = match first {
                    Some(MultipartCondition::Simple(condition)) => Some(condition),
                    Some(MultipartCondition::And(all)) => all.first(),
                    Some(MultipartCondition::Or(_)) | None => None,
                };
                condition
                    .and_then(|c| c.first())
                    .map(|(k, v)| BlockStateProperties::from([(k.to_string(), v.to_string())]))
                    .unwrap_or_default()
            }
        }
    }
}
