//! Texture atlas building.
//!
//! This module packs the textures of one model into a single atlas image
//! and remaps the model's face UVs accordingly.

mod animation;
mod builder;

pub use animation::AtlasAnimator;
pub use builder::{create_atlas, AtlasBuilder, AtlasEntry, TextureAtlas, TextureProvider};
