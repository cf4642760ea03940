//! Block model parsing.
//!
//! Block models define the 3D geometry of blocks using cuboid elements.

use crate::types::{Direction, ElementRotation};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Texture variables of a model, in declaration order.
///
/// A value starting with `#` aliases another entry of the same map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureMap(Vec<(String, String)>);

impl TextureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set `name`, keeping its position if it already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TextureMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = TextureMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for TextureMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TextureMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TextureMapVisitor;

        impl<'de> Visitor<'de> for TextureMapVisitor {
            type Value = TextureMap;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of texture variables")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TextureMap, A::Error> {
                let mut map = TextureMap::new();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    // Newer packs allow {"sprite": "..."} objects.
                    let texture = match value {
                        Value::String(s) => s,
                        Value::Object(obj) => match obj.get("sprite") {
                            Some(Value::String(s)) => s.clone(),
                            _ => continue,
                        },
                        _ => continue,
                    };
                    map.insert(key, texture);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(TextureMapVisitor)
    }
}

/// A parsed block model from models/*.json.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockModel {
    /// Parent model to inherit from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Whether to use ambient occlusion.
    #[serde(default, rename = "ambientocclusion", skip_serializing_if = "Option::is_none")]
    pub ambient_occlusion: Option<bool>,

    /// Texture variable definitions.
    #[serde(default, skip_serializing_if = "TextureMap::is_empty")]
    pub textures: TextureMap,

    /// Model elements (cuboids). `None` when the model does not declare any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<ModelElement>>,

    /// Display transforms per context (gui, ground, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<Value>,

    /// Parent chain traversed while merging, nearest parent first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hierarchy: Vec<String>,

    /// Keys this crate does not interpret (gui_light, texture_size, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if this model declares elements.
    pub fn has_elements(&self) -> bool {
        self.elements.as_ref().map(|e| !e.is_empty()).unwrap_or(false)
    }

    pub fn elements(&self) -> &[ModelElement] {
        self.elements.as_deref().unwrap_or(&[])
    }

    /// Merge `other` over `self`: scalars and arrays from `other` replace,
    /// maps merge key by key with `other` winning.
    pub fn overlay(&mut self, other: &BlockModel) {
        for (key, value) in other.textures.iter() {
            self.textures.insert(key, value);
        }
        if let Some(elements) = &other.elements {
            self.elements = Some(elements.clone());
        }
        if other.ambient_occlusion.is_some() {
            self.ambient_occlusion = other.ambient_occlusion;
        }
        if let Some(display) = &other.display {
            match &mut self.display {
                Some(existing) => deep_merge(existing, display),
                None => self.display = Some(display.clone()),
            }
        }
        for (key, value) in &other.extra {
            match self.extra.get_mut(key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
        self.parent = None;
    }

    /// Resolve a texture reference (e.g., "#side") through alias chains.
    /// Returns None if the chain ends at an unknown variable or loops.
    pub fn resolve_texture(&self, reference: &str) -> Option<String> {
        resolve_texture_chain(reference, &self.textures, 0)
    }
}

const MAX_TEXTURE_ALIAS_DEPTH: usize = 16;

/// Follow `#alias` references until a plain texture path is reached.
pub fn resolve_texture_chain(reference: &str, textures: &TextureMap, depth: usize) -> Option<String> {
    if depth >= MAX_TEXTURE_ALIAS_DEPTH {
        return None;
    }
    match reference.strip_prefix('#') {
        None => Some(reference.to_string()),
        Some(name) => {
            let value = textures.get(name)?;
            resolve_texture_chain(value, textures, depth + 1)
        }
    }
}

/// Recursively merge JSON objects; any other value in `overlay` replaces.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// A cuboid element within a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelElement {
    /// Minimum corner (0-16 range).
    pub from: [f32; 3],
    /// Maximum corner (0-16 range).
    pub to: [f32; 3],
    /// Optional rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<ElementRotation>,
    /// Whether this element receives shade.
    #[serde(default = "default_shade")]
    pub shade: bool,
    /// Face definitions.
    #[serde(default)]
    pub faces: BTreeMap<Direction, ModelFace>,
    /// Atlas-space UVs per face, indexed by [`Direction::index`]. Filled in by
    /// the atlas builder: four corners, each `[u, v]` in 0-1 with V pointing up.
    #[serde(skip)]
    pub mapped_uv: Option<[[[f32; 2]; 4]; 6]>,
}

fn default_shade() -> bool {
    true
}

impl ModelElement {
    /// Full unit cube with every face mapped to `texture`.
    pub fn cube(texture: &str) -> Self {
        Self {
            from: [0.0, 0.0, 0.0],
            to: [16.0, 16.0, 16.0],
            rotation: None,
            shade: true,
            faces: Direction::ALL
                .iter()
                .map(|d| (*d, ModelFace::new(texture)))
                .collect(),
            mapped_uv: None,
        }
    }

    /// Atlas UVs of one face, if the element was mapped.
    pub fn face_uv(&self, direction: Direction) -> Option<[[f32; 2]; 4]> {
        self.mapped_uv.map(|uvs| uvs[direction.index()])
    }
}

/// A face of a model element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFace {
    /// UV coordinates [u1, v1, u2, v2] in 0-16 range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv: Option<[f32; 4]>,
    /// Texture reference (e.g., "#side" or "block/stone").
    pub texture: String,
    /// Face direction for culling (if adjacent block is opaque, hide this face).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cullface: Option<Direction>,
    /// UV rotation in degrees (0, 90, 180, 270).
    #[serde(default)]
    pub rotation: i32,
    /// Tint index for biome coloring (-1 = no tint).
    #[serde(default = "default_tint_index")]
    pub tintindex: i32,
}

fn default_tint_index() -> i32 {
    -1
}

impl ModelFace {
    pub fn new(texture: impl Into<String>) -> Self {
        Self {
            uv: None,
            texture: texture.into(),
            cullface: None,
            rotation: 0,
            tintindex: -1,
        }
    }
}
