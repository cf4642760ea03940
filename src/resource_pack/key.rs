//! Identity of a remote asset.

use crate::error::{RenderError, Result};

/// Namespace used when a resource location omits one.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Asset host used when a key does not name a root.
pub const DEFAULT_ROOT: &str = "https://assets.mcasset.cloud/1.13";

/// Top-level directory for client assets.
pub const ROOT_TYPE_ASSETS: &str = "assets";

/// Field separator of the canonical serialization.
const SEPARATOR: char = '|';

/// Identity of a remote asset.
///
/// Keys are values: every `with_*` method returns a new key, so a key that
/// has been used for a cache lookup can never change underneath the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    namespace: String,
    path: String,
    asset_type: Option<String>,
    kind: Option<String>,
    root_type: String,
    extension: Option<String>,
    root: String,
}

impl AssetKey {
    /// Create a key in `namespace` with the default root.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
            asset_type: None,
            kind: None,
            root_type: ROOT_TYPE_ASSETS.to_string(),
            extension: None,
            root: DEFAULT_ROOT.to_string(),
        }
    }

    /// Parse the compact form `namespace:type/path`.
    ///
    /// The namespace defaults to `minecraft`; the first path segment becomes
    /// the sub-category when the path contains a slash.
    /// "minecraft:block/stone" -> (minecraft, block, stone)
    /// "stone" -> (minecraft, -, stone)
    pub fn parse(location: &str) -> Result<Self> {
        let (namespace, rest) = match location.split_once(':') {
            Some((namespace, rest)) => (namespace, rest),
            None => (DEFAULT_NAMESPACE, location),
        };
        if rest.is_empty() || namespace.is_empty() {
            return Err(RenderError::InvalidKey(location.to_string()));
        }
        let key = match rest.split_once('/') {
            Some((kind, path)) if !kind.is_empty() && !path.is_empty() => {
                AssetKey::new(namespace, path).with_kind(kind)
            }
            Some(_) => return Err(RenderError::InvalidKey(location.to_string())),
            None => AssetKey::new(namespace, rest),
        };
        Ok(key)
    }

    /// Model key from a model reference such as `block/cube_all`.
    pub fn model(location: &str) -> Result<Self> {
        Ok(Self::parse(location)?.with_defaults("models", ".json"))
    }

    /// Block-state key from a block name such as `minecraft:oak_stairs`.
    pub fn blockstate(block: &str) -> Result<Self> {
        let (namespace, path) = block.split_once(':').unwrap_or((DEFAULT_NAMESPACE, block));
        if path.is_empty() || namespace.is_empty() {
            return Err(RenderError::InvalidKey(block.to_string()));
        }
        Ok(AssetKey::new(namespace, path).with_defaults("blockstates", ".json"))
    }

    /// Texture key from a texture reference such as `block/oak_planks`.
    pub fn texture(location: &str) -> Result<Self> {
        Ok(Self::parse(location)?.with_defaults("textures", ".png"))
    }

    /// Animation metadata sidecar for a texture key.
    pub fn mcmeta(&self) -> Self {
        let extension = format!("{}.mcmeta", self.extension.as_deref().unwrap_or(".png"));
        self.clone().with_extension(extension)
    }

    /// The `_list` pseudo-asset naming everything of `asset_type`/`kind`.
    pub fn listing(asset_type: &str, kind: Option<&str>) -> Self {
        let key = AssetKey::new(DEFAULT_NAMESPACE, "_list")
            .with_asset_type(asset_type)
            .with_extension(".json");
        match kind {
            Some(kind) => key.with_kind(kind),
            None => key,
        }
    }

    /// Fill in `asset_type` and `extension` where unset, returning a new key.
    pub fn with_defaults(self, asset_type: &str, extension: &str) -> Self {
        Self {
            asset_type: self.asset_type.or_else(|| Some(asset_type.to_string())),
            extension: self.extension.or_else(|| Some(extension.to_string())),
            ..self
        }
    }

    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..self
        }
    }

    pub fn with_root(self, root: impl Into<String>) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
            ..self
        }
    }

    pub fn with_asset_type(self, asset_type: impl Into<String>) -> Self {
        Self {
            asset_type: Some(asset_type.into()),
            ..self
        }
    }

    pub fn with_kind(self, kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..self
        }
    }

    pub fn with_extension(self, extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
            ..self
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn asset_type(&self) -> Option<&str> {
        self.asset_type.as_deref()
    }

    /// Sub-category such as `block`, `item` or `entity`.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Whether the key points at the default asset host.
    pub fn has_default_root(&self) -> bool {
        self.root == DEFAULT_ROOT
    }

    /// Canonical serialization; equal keys serialize identically.
    pub fn serialize(&self) -> String {
        let fields = [
            self.root.as_str(),
            self.root_type.as_str(),
            self.namespace.as_str(),
            self.asset_type.as_deref().unwrap_or(""),
            self.kind.as_deref().unwrap_or(""),
            self.path.as_str(),
            self.extension.as_deref().unwrap_or(""),
        ];
        let mut out = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                out.push(SEPARATOR);
            }
            out.push_str(field);
        }
        out
    }

    /// Location of this asset on its host:
    /// `{root}/{rootType}/{namespace}/{assetType}/{type/}{path}{extension}`.
    pub fn url(&self) -> String {
        let mut url = format!("{}/{}/{}/", self.root, self.root_type, self.namespace);
        if let Some(asset_type) = &self.asset_type {
            url.push_str(asset_type);
            url.push('/');
        }
        if let Some(kind) = &self.kind {
            url.push_str(kind);
            url.push('/');
        }
        url.push_str(&self.path);
        if let Some(extension) = &self.extension {
            url.push_str(extension);
        }
        url
    }

    /// Compact `namespace:type/path` form.
    pub fn location(&self) -> String {
        match &self.kind {
            Some(kind) => format!("{}:{}/{}", self.namespace, kind, self.path),
            None => format!("{}:{}", self.namespace, self.path),
        }
    }

    /// Last path segment, e.g. `water` for `block/water`.
    pub fn base_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.location())
    }
}
