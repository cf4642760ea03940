//! Block objects: a block type plus mutable state.

use super::SceneObject;
use crate::error::Result;
use crate::resource_pack::{BlockstateDefinition, ModelVariant};
use crate::session::RenderSession;
use crate::types::BlockStateProperties;
use std::sync::Arc;

/// One block in the scene. Its root object holds one child per variant the
/// current state resolves to.
///
/// Concurrent `set_state` calls on one block are not coordinated; the last
/// one to finish wins.
pub struct BlockObject {
    session: RenderSession,
    name: String,
    definition: Option<BlockstateDefinition>,
    properties: BlockStateProperties,
    variants: Vec<ModelVariant>,
    root: Arc<SceneObject>,
}

impl BlockObject {
    /// Load `name`'s blockstate and build it in its default state overlaid
    /// with `properties`.
    pub async fn new(session: RenderSession, name: &str, properties: BlockStateProperties) -> Result<Self> {
        let definition = session.blockstate(name).await?;
        let mut initial = match &definition {
            Some(definition) => session.default_properties(name, definition),
            None => BlockStateProperties::new(),
        };
        initial.extend(properties);

        let mut block = Self {
            root: Arc::new(SceneObject::new(name)),
            name: name.to_string(),
            definition,
            properties: initial,
            variants: Vec::new(),
            session,
        };
        let (variants, children) = block.build_children(&block.properties).await?;
        block.commit(variants, children);
        Ok(block)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BlockStateProperties {
        &self.properties
    }

    /// Variants the current state resolved to.
    pub fn variants(&self) -> &[ModelVariant] {
        &self.variants
    }

    pub fn root(&self) -> &Arc<SceneObject> {
        &self.root
    }

    /// Merge `properties` into the current state and rebuild every child.
    ///
    /// On error the block keeps its previous state and children.
    pub async fn set_state(&mut self, properties: BlockStateProperties) -> Result<()> {
        let mut next = self.properties.clone();
        next.extend(properties);
        let (variants, children) = self.build_children(&next).await?;
        self.properties = next;
        self.commit(variants, children);
        Ok(())
    }

    async fn build_children(
        &self,
        properties: &BlockStateProperties,
    ) -> Result<(Vec<ModelVariant>, Vec<Arc<SceneObject>>)> {
        let Some(definition) = &self.definition else {
            log::warn!("No blockstate for {}, using placeholder", self.name);
            let placeholder = Arc::new(SceneObject::placeholder(self.name.clone()));
            return Ok((Vec::new(), vec![placeholder]));
        };

        let variants = self.session.states().map_state_to_variant(definition, properties);
        if variants.is_empty() {
            log::warn!("No variant of {} matches {:?}", self.name, properties);
        }
        let mut children = Vec::with_capacity(variants.len());
        for variant in &variants {
            match self.session.variant(variant).await {
                Ok(child) => children.push(child),
                Err(e) => {
                    for child in children {
                        child.dispose();
                    }
                    return Err(e);
                }
            }
        }
        Ok((variants, children))
    }

    fn commit(&mut self, variants: Vec<ModelVariant>, children: Vec<Arc<SceneObject>>) {
        for child in self.root.clear_children() {
            child.dispose();
        }
        for child in children {
            self.root.add_child(child);
        }
        self.variants = variants;
    }
}
