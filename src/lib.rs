//! # minerender
//!
//! Resolve Minecraft blocks into engine-neutral scene objects.
//!
//! ## Overview
//!
//! This library takes a block name and its state properties, looks up the
//! blockstate on an asset host, merges the referenced models with their
//! parents, packs their textures into an atlas, and produces scene objects
//! with mesh geometry, a material image and (optionally instanced)
//! transforms for a rendering engine to draw.
//!
//! ## Quick Start
//!
//! ```ignore
//! use minerender::{RenderSession, SessionConfig};
//!
//! let session = RenderSession::http(SessionConfig::default());
//!
//! // One block with its own object
//! let stairs = session
//!     .block("minecraft:oak_stairs", [("facing".into(), "north".into())].into())
//!     .await?;
//!
//! // Many copies of one block state share one instanced object
//! let stone = session.instanced_block("minecraft:stone", Default::default()).await?;
//! stone.set_position(glam::Vec3::new(1.0, 0.0, 0.0))?;
//! ```
//!
//! ## Offline Packs
//!
//! A resource-pack ZIP or directory can stand in for the asset host:
//!
//! ```ignore
//! let session = minerender::open_resource_pack("path/to/pack.zip", Default::default())?;
//! let lever = session.model("block/lever").await?;
//! ```

pub mod atlas;
pub mod error;
pub mod resolver;
pub mod resource_pack;
pub mod scene;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use atlas::{create_atlas, TextureAtlas};
pub use error::{RenderError, Result};
pub use resolver::{ModelMerger, StateDefaults, StateResolver, VariantSelector};
pub use resource_pack::{
    ArchiveFetcher, AssetCache, AssetKey, AssetLoader, BlockModel, BlockstateDefinition, CacheConfig, Fetcher,
    MemoryFetcher, ModelElement, ModelVariant, TextureData,
};
pub use scene::{BlockObject, InstanceManager, InstanceRef, Material, Mesh, Scene, SceneObject, Vertex};
pub use session::{RenderSession, SessionConfig};
pub use types::{Axis, BlockStateProperties, BlockTransform, Direction, InputBlock};

/// Open a session over a local resource pack (ZIP or directory). Absent
/// assets are not retried against any remote host.
pub fn open_resource_pack<P: AsRef<std::path::Path>>(path: P, config: SessionConfig) -> Result<RenderSession> {
    let fetcher = ArchiveFetcher::from_path(config.root.clone(), path)?;
    let root = config.root.clone();
    let config = config
        .with_fallback_root(root)
        .with_throttle(std::time::Duration::ZERO);
    Ok(RenderSession::new(std::sync::Arc::new(fetcher), config))
}
