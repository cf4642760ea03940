//! Model inheritance resolution.

use crate::error::{RenderError, Result};
use crate::resource_pack::{AssetCache, AssetKey, AssetLoader, BlockModel, CacheConfig, ModelElement, ModelParser};
use std::collections::HashSet;
use std::sync::Arc;

/// Model names the game builds natively instead of from JSON elements.
const FLUID_MODELS: [&str; 2] = ["lava", "water"];

/// Resolves model inheritance chains.
///
/// Raw models and merged models live in separate caches, so a parent shared by
/// many children is fetched once and each child is merged once.
#[derive(Clone)]
pub struct ModelMerger {
    loader: AssetLoader,
    raw: Arc<AssetCache<BlockModel>>,
    merged: Arc<AssetCache<BlockModel>>,
}

impl ModelMerger {
    pub fn new(loader: AssetLoader, config: CacheConfig) -> Self {
        Self {
            loader,
            raw: Arc::new(AssetCache::new("model", config)),
            merged: Arc::new(AssetCache::new("merged model", config)),
        }
    }

    /// The unmerged model stored at `key`.
    pub async fn load_model(&self, key: &AssetKey) -> Result<Option<BlockModel>> {
        let loader = self.loader.clone();
        let k = key.clone();
        self.raw
            .get_or_load(key, move || loader.load_with_fallback(&k, ModelParser))
            .await
    }

    /// Load the model at `key` and merge it with its parents.
    pub async fn resolve(&self, key: &AssetKey) -> Result<Option<BlockModel>> {
        let merger = self.clone();
        let k = key.clone();
        self.merged
            .get_or_load(key, move || async move {
                match merger.load_model(&k).await? {
                    Some(model) => merger.merge_with_parents(&k, model).await.map(Some),
                    None => Ok(None),
                }
            })
            .await
    }

    /// Merge `model` (stored at `key`) with its ancestors.
    ///
    /// Ancestors are applied oldest first and `model` last, so the most
    /// specific definition of any key wins. Arrays such as `elements` are
    /// replaced, never concatenated. A parent that cannot be found ends the
    /// chain; a parent seen twice is a cycle.
    pub async fn merge_with_parents(&self, key: &AssetKey, model: BlockModel) -> Result<BlockModel> {
        let mut visited = HashSet::new();
        visited.insert(key.clone().with_root(self.loader.default_root()).serialize());

        let mut ancestors = Vec::new();
        let mut hierarchy = Vec::new();
        let mut next_parent = model.parent.clone();

        while let Some(parent) = next_parent.take() {
            hierarchy.push(parent.clone());
            if parent.starts_with("builtin/") {
                break;
            }

            let parent_key = AssetKey::model(&parent)?.with_root(key.root());
            if !visited.insert(parent_key.clone().with_root(self.loader.default_root()).serialize()) {
                return Err(RenderError::ModelCycle(format!(
                    "{} -> {}",
                    key.location(),
                    hierarchy.join(" -> ")
                )));
            }

            match self.load_model(&parent_key).await? {
                Some(parent_model) => {
                    next_parent = parent_model.parent.clone();
                    ancestors.push(parent_model);
                }
                None => {
                    log::warn!("Parent model {} of {} not found", parent, key);
                }
            }
        }

        let mut merged = BlockModel::new();
        for ancestor in ancestors.iter().rev() {
            merged.overlay(ancestor);
        }
        merged.overlay(&model);
        merged.hierarchy = hierarchy;

        if !merged.has_elements() && FLUID_MODELS.contains(&key.base_name()) {
            merged.elements = Some(vec![ModelElement::cube("#particle")]);
        }

        Ok(merged)
    }

    pub fn clear(&self) {
        self.raw.clear();
        self.merged.clear();
    }
}
