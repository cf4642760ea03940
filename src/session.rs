//! Rendering sessions: one asset host, one set of caches.

use crate::atlas::{create_atlas, TextureAtlas, TextureProvider};
use crate::error::Result;
use crate::resolver::{ModelMerger, StateDefaults, StateResolver, VariantSelector};
use crate::resource_pack::{
    AssetCache, AssetKey, AssetLoader, BlockModel, BlockStateParser, BlockstateDefinition, CacheConfig, Fetcher,
    ImageParser, KeyValueStore, McmetaParser, ModelVariant, TextureData, ThrottledFetcher, DEFAULT_ROOT,
};
use crate::scene::{BlockObject, InstanceManager, InstanceRef, Material, Mesh, SceneObject};
use crate::types::{BlockStateProperties, BlockTransform, InputBlock};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;

/// Settings for a [`RenderSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Asset host every key is resolved against.
    pub root: String,
    /// Host that absent assets are retried against.
    pub fallback_root: String,
    /// Expiry settings shared by every cache of the session.
    pub cache: CacheConfig,
    /// Minimum interval between two asset requests. Zero disables throttling.
    pub throttle: Duration,
    /// Maximum live slots per instanced object.
    pub max_instances: Option<usize>,
    /// How a variant is picked from a weighted list.
    pub selector: VariantSelector,
    /// Explicit initial properties per block type.
    pub state_defaults: StateDefaults,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            fallback_root: DEFAULT_ROOT.to_string(),
            cache: CacheConfig::default(),
            throttle: Duration::from_millis(10),
            max_instances: None,
            selector: VariantSelector::First,
            state_defaults: StateDefaults::new(),
        }
    }
}

impl SessionConfig {
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        let root: String = root.into();
        self.root = root.trim_end_matches('/').to_string();
        self
    }

    /// Retry absent assets against `root` instead of the default host.
    pub fn with_fallback_root(mut self, root: impl Into<String>) -> Self {
        let root: String = root.into();
        self.fallback_root = root.trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = Some(max_instances);
        self
    }

    pub fn with_selector(mut self, selector: VariantSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_state_defaults(mut self, state_defaults: StateDefaults) -> Self {
        self.state_defaults = state_defaults;
        self
    }
}

/// A merged model with atlas UVs written into its elements, plus its atlas.
#[derive(Debug, Clone)]
pub struct MappedModel {
    pub model: BlockModel,
    pub atlas: Option<TextureAtlas>,
}

struct SessionInner {
    config: SessionConfig,
    loader: AssetLoader,
    models: ModelMerger,
    blockstates: AssetCache<BlockstateDefinition>,
    textures: AssetCache<TextureData>,
    mapped: AssetCache<MappedModel>,
    states: StateResolver,
    instances: InstanceManager,
}

/// Everything needed to turn block names into scene objects: the loader, the
/// caches, the state resolver and the instance manager.
///
/// Sessions share nothing with each other. Cloning a session is cheap and
/// shares its caches.
#[derive(Clone)]
pub struct RenderSession {
    inner: Arc<SessionInner>,
}

impl RenderSession {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: SessionConfig) -> Self {
        Self::build(fetcher, None, config)
    }

    /// A session that consults `store` before the network and persists what
    /// it fetches.
    pub fn with_store(fetcher: Arc<dyn Fetcher>, store: Arc<dyn KeyValueStore>, config: SessionConfig) -> Self {
        Self::build(fetcher, Some(store), config)
    }

    /// A session talking to the configured asset host over HTTP.
    #[cfg(feature = "http")]
    pub fn http(config: SessionConfig) -> Self {
        Self::new(Arc::new(crate::resource_pack::HttpFetcher::new()), config)
    }

    fn build(fetcher: Arc<dyn Fetcher>, store: Option<Arc<dyn KeyValueStore>>, config: SessionConfig) -> Self {
        let fetcher: Arc<dyn Fetcher> = if config.throttle.is_zero() {
            fetcher
        } else {
            Arc::new(ThrottledFetcher::new(fetcher, config.throttle))
        };
        let mut loader = AssetLoader::new(fetcher).with_default_root(config.fallback_root.clone());
        if let Some(store) = store {
            loader = loader.with_store(store);
        }

        log::info!("Starting render session for {}", config.root);
        let inner = SessionInner {
            models: ModelMerger::new(loader.clone(), config.cache),
            blockstates: AssetCache::new("blockstate", config.cache),
            textures: AssetCache::new("texture", config.cache),
            mapped: AssetCache::new("atlas", config.cache),
            states: StateResolver::new(config.selector),
            instances: InstanceManager::new(config.max_instances),
            loader,
            config,
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn loader(&self) -> &AssetLoader {
        &self.inner.loader
    }

    pub fn models(&self) -> &ModelMerger {
        &self.inner.models
    }

    pub fn states(&self) -> &StateResolver {
        &self.inner.states
    }

    pub fn instances(&self) -> &InstanceManager {
        &self.inner.instances
    }

    fn rooted(&self, key: AssetKey) -> AssetKey {
        key.with_root(self.inner.config.root.clone())
    }

    /// Block-state definition of `block`, e.g. `minecraft:oak_stairs`.
    pub async fn blockstate(&self, block: &str) -> Result<Option<BlockstateDefinition>> {
        let key = self.rooted(AssetKey::blockstate(block)?);
        let loader = self.inner.loader.clone();
        let k = key.clone();
        self.inner
            .blockstates
            .get_or_load(&key, move || loader.load_with_fallback(&k, BlockStateParser))
            .await
    }

    /// Decoded texture, with its `.mcmeta` animation if it is a strip.
    pub async fn texture(&self, path: &str) -> Result<Option<TextureData>> {
        let key = self.rooted(AssetKey::texture(path)?);
        let loader = self.inner.loader.clone();
        let k = key.clone();
        self.inner
            .textures
            .get_or_load(&key, move || async move {
                let Some(texture) = loader.load_with_fallback(&k, ImageParser).await? else {
                    return Ok(None);
                };
                if !texture.is_animated() {
                    return Ok(Some(texture));
                }
                let animation = loader.load_with_fallback(&k.mcmeta(), McmetaParser).await?.flatten();
                Ok(Some(texture.with_animation(animation)))
            })
            .await
    }

    /// The model at `location` merged with its parents.
    pub async fn merged_model(&self, location: &str) -> Result<Option<BlockModel>> {
        let key = self.rooted(AssetKey::model(location)?);
        self.inner.models.resolve(&key).await
    }

    /// The merged model at `key` with its atlas built and UVs mapped.
    pub async fn mapped_model(&self, key: &AssetKey) -> Result<Option<MappedModel>> {
        let session = self.clone();
        let k = key.clone();
        self.inner
            .mapped
            .get_or_load(key, move || async move {
                let Some(mut model) = session.inner.models.resolve(&k).await? else {
                    return Ok(None);
                };
                let atlas = create_atlas(&mut model, &session).await?;
                Ok(Some(MappedModel { model, atlas }))
            })
            .await
    }

    /// Build a scene object for the model at `key`, rotated by `transform`.
    ///
    /// A model that is absent, or whose parent chain cannot be resolved,
    /// becomes a placeholder object. Transport failures propagate.
    pub async fn build_model(&self, key: &AssetKey, transform: BlockTransform) -> Result<Arc<SceneObject>> {
        let key = self.rooted(key.clone());
        let object = match self.mapped_model(&key).await {
            Ok(Some(mapped)) => {
                let mesh = Mesh::from_model(&mapped.model);
                let material = match mapped.atlas {
                    Some(atlas) => Material::from_atlas(atlas),
                    None => Material::missing(),
                };
                SceneObject::with_mesh(key.location(), mesh, material)
            }
            Ok(None) => {
                log::warn!("Model {} not found, using placeholder", key.location());
                SceneObject::placeholder(key.location())
            }
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                log::warn!("Failed to resolve model {}: {}", key.location(), e);
                SceneObject::placeholder(key.location())
            }
        };
        if !transform.is_identity() {
            object.set_rotation(transform.rotation());
        }
        Ok(Arc::new(object))
    }

    /// Scene object for one model reference such as `block/stone`.
    pub async fn model(&self, location: &str) -> Result<Arc<SceneObject>> {
        let key = AssetKey::model(location)?;
        self.build_model(&key, BlockTransform::default()).await
    }

    /// Scene object for one blockstate variant.
    pub async fn variant(&self, variant: &ModelVariant) -> Result<Arc<SceneObject>> {
        let key = AssetKey::model(&variant.model_location())?;
        self.build_model(&key, variant.transform()).await
    }

    /// Variants to render for `block` in state `properties`.
    /// An unknown block has none.
    pub async fn variants(&self, block: &str, properties: &BlockStateProperties) -> Result<Vec<ModelVariant>> {
        match self.blockstate(block).await? {
            Some(definition) => Ok(self.inner.states.map_state_to_variant(&definition, properties)),
            None => Ok(Vec::new()),
        }
    }

    /// Initial properties of `block` under this session's defaults table.
    pub fn default_properties(&self, block: &str, definition: &BlockstateDefinition) -> BlockStateProperties {
        self.inner.config.state_defaults.default_properties(block, definition)
    }

    /// A new, non-shared block object.
    pub async fn block(&self, name: &str, properties: BlockStateProperties) -> Result<BlockObject> {
        BlockObject::new(self.clone(), name, properties).await
    }

    /// An instance slot on the shared object for this exact block state.
    pub async fn instanced_block(&self, name: &str, properties: BlockStateProperties) -> Result<InstanceRef> {
        let key = InputBlock::new(name).with_properties(properties.clone()).state_key();
        let session = self.clone();
        let name = name.to_string();
        self.inner
            .instances
            .get_or_create(&key, move || async move {
                let block = session.block(&name, properties).await?;
                Ok(block.root().clone())
            })
            .await
    }

    /// Names of everything of `asset_type` (and optional sub-type) on the
    /// asset host.
    pub async fn list(&self, asset_type: &str, kind: Option<&str>) -> Result<Vec<String>> {
        self.inner.loader.list(&self.inner.config.root, asset_type, kind).await
    }

    /// Drop every cached asset and every instanced object entry.
    pub fn reset(&self) {
        log::info!("Resetting render session caches");
        self.inner.models.clear();
        self.inner.blockstates.clear();
        self.inner.textures.clear();
        self.inner.mapped.clear();
        self.inner.instances.reset();
    }
}

impl TextureProvider for RenderSession {
    fn texture(&self, path: &str) -> BoxFuture<'static, Result<Option<TextureData>>> {
        let session = self.clone();
        let path = path.to_string();
        async move { RenderSession::texture(&session, &path).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_pack::MemoryFetcher;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    const ROOT: &str = "https://assets.test";

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn session(fetcher: &Arc<MemoryFetcher>) -> RenderSession {
        let config = SessionConfig::default().with_root(ROOT).with_throttle(Duration::ZERO);
        RenderSession::new(fetcher.clone(), config)
    }

    fn host() -> Arc<MemoryFetcher> {
        host_at(ROOT)
    }

    fn host_at(root: &str) -> Arc<MemoryFetcher> {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert_json(
            format!("{root}/assets/minecraft/blockstates/stone.json"),
            &json!({ "variants": { "": { "model": "block/stone" } } }),
        );
        fetcher.insert_json(
            format!("{root}/assets/minecraft/models/block/stone.json"),
            &json!({ "parent": "block/cube_all", "textures": { "all": "block/stone" } }),
        );
        fetcher.insert_json(
            format!("{root}/assets/minecraft/models/block/cube_all.json"),
            &json!({
                "textures": { "particle": "#all" },
                "elements": [{
                    "from": [0, 0, 0], "to": [16, 16, 16],
                    "faces": {
                        "down": { "texture": "#all" }, "up": { "texture": "#all" },
                        "north": { "texture": "#all" }, "south": { "texture": "#all" },
                        "west": { "texture": "#all" }, "east": { "texture": "#all" }
                    }
                }]
            }),
        );
        fetcher.insert(
            format!("{root}/assets/minecraft/textures/block/stone.png"),
            png(16, 16, [128, 128, 128, 255]),
        );
        fetcher
    }

    #[tokio::test]
    async fn test_mirror_falls_back_to_default_host() {
        let fetcher = host_at(DEFAULT_ROOT);
        let config = SessionConfig::default()
            .with_root("https://mirror.test/")
            .with_throttle(Duration::ZERO);
        let session = RenderSession::new(fetcher.clone(), config);

        let merged = session.merged_model("block/stone").await.unwrap().unwrap();
        assert_eq!(merged.elements().len(), 1);
        let object = session.model("block/stone").await.unwrap();
        assert!(!object.is_placeholder());

        let mirror = "https://mirror.test/assets/minecraft/models/block/stone.json";
        assert_eq!(fetcher.request_count(mirror), 1);
        let stone = format!("{DEFAULT_ROOT}/assets/minecraft/models/block/stone.json");
        assert_eq!(fetcher.request_count(&stone), 1);
    }

    #[tokio::test]
    async fn test_model_object_has_textured_mesh() {
        let fetcher = host();
        let session = session(&fetcher);

        let object = session.model("block/stone").await.unwrap();
        assert!(!object.is_placeholder());
        let mesh = object.mesh().unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.uvs_flat().iter().all(|c| (0.0..=1.0).contains(c)));

        let material = object.material().unwrap();
        assert!(!material.is_transparent());
        assert!(!material.image_png().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_model_is_placeholder() {
        let fetcher = host();
        let session = session(&fetcher);
        let object = session.model("block/nothing").await.unwrap();
        assert!(object.is_placeholder());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let fetcher = host();
        fetcher.insert_status(format!("{ROOT}/assets/minecraft/models/block/broken.json"), 503);
        let session = session(&fetcher);

        let err = session.model("block/broken").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_assets_are_fetched_once() {
        let fetcher = host();
        let session = session(&fetcher);

        session.model("block/stone").await.unwrap();
        session.model("block/stone").await.unwrap();
        session.block("minecraft:stone", BlockStateProperties::new()).await.unwrap();

        let texture_url = format!("{ROOT}/assets/minecraft/textures/block/stone.png");
        assert_eq!(fetcher.request_count(&texture_url), 1);
        let model_url = format!("{ROOT}/assets/minecraft/models/block/cube_all.json");
        assert_eq!(fetcher.request_count(&model_url), 1);
    }

    #[tokio::test]
    async fn test_animated_texture_loads_mcmeta() {
        let fetcher = host();
        fetcher.insert(
            format!("{ROOT}/assets/minecraft/textures/block/fire.png"),
            png(16, 32, [255, 128, 0, 255]),
        );
        fetcher.insert_json(
            format!("{ROOT}/assets/minecraft/textures/block/fire.png.mcmeta"),
            &json!({ "animation": { "frametime": 2 } }),
        );
        let session = session(&fetcher);

        let fire = session.texture("block/fire").await.unwrap().unwrap();
        assert_eq!(fire.animation.map(|a| a.frametime), Some(2));

        let stone = session.texture("block/stone").await.unwrap().unwrap();
        assert!(stone.animation.is_none());
        let sidecar = format!("{ROOT}/assets/minecraft/textures/block/stone.png.mcmeta");
        assert_eq!(fetcher.request_count(&sidecar), 0);
    }

    #[tokio::test]
    async fn test_reset_refetches() {
        let fetcher = host();
        let session = session(&fetcher);
        let url = format!("{ROOT}/assets/minecraft/blockstates/stone.json");

        session.blockstate("minecraft:stone").await.unwrap();
        session.reset();
        session.blockstate("minecraft:stone").await.unwrap();
        assert_eq!(fetcher.request_count(&url), 2);
    }

    #[tokio::test]
    async fn test_unknown_block_has_no_variants() {
        let fetcher = host();
        let session = session(&fetcher);
        let variants = session
            .variants("minecraft:nothing", &BlockStateProperties::new())
            .await
            .unwrap();
        assert!(variants.is_empty());
    }
}
