//! Asset fetching, caching and parsing.
//!
//! This module locates Minecraft assets on a remote (or local) asset host and
//! parses their contents, including blockstates, models, and textures.

pub mod archive;
pub mod blockstate;
pub mod cache;
pub mod fetch;
pub mod key;
pub mod loader;
pub mod model;
pub mod parser;
pub mod store;
pub mod texture;

pub use archive::ArchiveFetcher;
pub use blockstate::{BlockstateDefinition, ConditionMap, ModelVariant, MultipartCase, MultipartCondition};
pub use cache::{AssetCache, CacheConfig};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{FetchResponse, Fetcher, MemoryFetcher, Request, RequestKind, ResponseType, ThrottledFetcher};
pub use key::{AssetKey, DEFAULT_NAMESPACE, DEFAULT_ROOT};
pub use loader::AssetLoader;
pub use model::{BlockModel, ModelElement, ModelFace, TextureMap};
pub use parser::{AssetParser, BlockStateParser, ImageParser, JsonParser, ListParser, McmetaParser, ModelParser};
pub use store::{KeyValueStore, MemoryStore};
pub use texture::{AnimationFrame, AnimationMeta, TextureData};
