//! Materials handed to the rendering engine.

use crate::atlas::TextureAtlas;
use crate::error::{RenderError, Result};
use crate::resource_pack::TextureData;
use image::{ImageEncoder, RgbaImage};

/// Image source plus blend mode for one mesh.
///
/// A material without an atlas samples the missing-texture checker.
#[derive(Debug, Clone)]
pub struct Material {
    atlas: Option<TextureAtlas>,
    transparent: bool,
}

impl Material {
    pub fn from_atlas(atlas: TextureAtlas) -> Self {
        Self {
            transparent: atlas.transparent,
            atlas: Some(atlas),
        }
    }

    /// The solid missing-texture material used for placeholders.
    pub fn missing() -> Self {
        Self {
            atlas: None,
            transparent: false,
        }
    }

    pub fn atlas(&self) -> Option<&TextureAtlas> {
        self.atlas.as_ref()
    }

    pub fn is_missing(&self) -> bool {
        self.atlas.is_none()
    }

    /// Whether the engine should alpha-blend this material.
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn is_animated(&self) -> bool {
        self.atlas.as_ref().map(|atlas| atlas.animated).unwrap_or(false)
    }

    /// The material image as PNG bytes.
    pub fn image_png(&self) -> Result<Vec<u8>> {
        match &self.atlas {
            Some(atlas) => atlas.to_png(),
            None => encode_png(&TextureData::missing().image),
        }
    }

    /// Advance atlas animations by one game tick.
    pub fn tick(&mut self) -> bool {
        match self.atlas.as_mut() {
            Some(atlas) if atlas.animated => atlas.tick(),
            _ => false,
        }
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(std::io::Cursor::new(&mut bytes))
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| RenderError::AtlasBuild(format!("Failed to encode PNG: {}", e)))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_material_png() {
        let material = Material::missing();
        assert!(material.is_missing());
        assert!(!material.is_transparent());

        let png = material.image_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert_eq!(decoded, TextureData::missing().image);
    }

    #[test]
    fn test_missing_material_does_not_tick() {
        let mut material = Material::missing();
        assert!(!material.tick());
        assert!(!material.is_animated());
    }
}
