//! Per-asset-kind response parsers.
//!
//! A parser tells the loader how to request an asset and turns the raw
//! response body into the typed value.

use super::texture::parse_mcmeta;
use super::{AnimationMeta, AssetKey, BlockModel, BlockstateDefinition, ResponseType, TextureData};
use crate::error::Result;
use serde_json::Value;

/// Converts a successful response body into a typed asset.
pub trait AssetParser: Send + Sync {
    type Output: Send + 'static;

    /// How the request for this asset should be issued.
    fn response_type(&self) -> ResponseType {
        ResponseType::Json
    }

    fn parse(&self, key: &AssetKey, body: &[u8]) -> Result<Self::Output>;
}

/// models/*.json
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelParser;

impl AssetParser for ModelParser {
    type Output = BlockModel;

    fn parse(&self, _key: &AssetKey, body: &[u8]) -> Result<BlockModel> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// blockstates/*.json
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockStateParser;

impl AssetParser for BlockStateParser {
    type Output = BlockstateDefinition;

    fn parse(&self, _key: &AssetKey, body: &[u8]) -> Result<BlockstateDefinition> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Raw image bytes decoded to RGBA.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageParser;

impl AssetParser for ImageParser {
    type Output = TextureData;

    fn response_type(&self) -> ResponseType {
        ResponseType::Binary
    }

    fn parse(&self, _key: &AssetKey, body: &[u8]) -> Result<TextureData> {
        TextureData::from_bytes(body)
    }
}

/// `.mcmeta` animation sidecars. A sidecar without an `animation` block
/// parses to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct McmetaParser;

impl AssetParser for McmetaParser {
    type Output = Option<AnimationMeta>;

    fn parse(&self, _key: &AssetKey, body: &[u8]) -> Result<Option<AnimationMeta>> {
        parse_mcmeta(body)
    }
}

/// Any JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl AssetParser for JsonParser {
    type Output = Value;

    fn parse(&self, _key: &AssetKey, body: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// `_list` pseudo-assets: a JSON array of names. Non-string entries are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListParser;

impl AssetParser for ListParser {
    type Output = Vec<String>;

    fn parse(&self, _key: &AssetKey, body: &[u8]) -> Result<Vec<String>> {
        let entries: Vec<Value> = serde_json::from_slice(body)?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect())
    }
}
