//! Texture atlas builder using a square grid of uniform cells.

use super::animation::AtlasAnimator;
use crate::error::{RenderError, Result};
use crate::resource_pack::model::resolve_texture_chain;
use crate::resource_pack::{BlockModel, ModelElement, TextureData, TextureMap};
use crate::types::Direction;
use futures::future::{join_all, BoxFuture};
use image::{ImageEncoder, Rgba, RgbaImage};
use std::collections::HashMap;

/// Cell size used when no texture could be loaded.
const DEFAULT_CELL_SIZE: u32 = 16;

/// Supplies decoded textures by texture path (e.g. `block/oak_planks`).
pub trait TextureProvider: Send + Sync {
    fn texture(&self, path: &str) -> BoxFuture<'static, Result<Option<TextureData>>>;
}

/// Pixel rectangle of one texture inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasEntry {
    /// Top-left corner in pixels.
    pub position: [u32; 2],
    /// Width and height in pixels.
    pub size: [u32; 2],
}

impl AtlasEntry {
    /// Map a 0-16 texture coordinate to atlas pixels.
    pub fn pixel(&self, u: f32, v: f32) -> [f32; 2] {
        [
            self.position[0] as f32 + u / 16.0 * self.size[0] as f32,
            self.position[1] as f32 + v / 16.0 * self.size[1] as f32,
        ]
    }
}

/// A built texture atlas.
#[derive(Debug, Clone)]
pub struct TextureAtlas {
    /// Atlas pixels.
    pub image: RgbaImage,
    /// Side length of one cell in pixels.
    pub cell_size: u32,
    /// Cells per side.
    pub grid: u32,
    /// Whether any source texture is an animation strip.
    pub animated: bool,
    /// Whether any source pixel has alpha below 255.
    pub transparent: bool,
    /// Entries by texture variable name, aliases included.
    entries: HashMap<String, AtlasEntry>,
    /// Entries by texture path.
    paths: HashMap<String, AtlasEntry>,
    missing: AtlasEntry,
    blank: AtlasEntry,
    animators: Vec<AtlasAnimator>,
}

impl TextureAtlas {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Entry for a texture variable name (`side`) or reference (`#side`).
    pub fn entry(&self, name: &str) -> Option<&AtlasEntry> {
        match name.strip_prefix('#') {
            Some(variable) => self.entries.get(variable),
            None => self.entries.get(name).or_else(|| self.paths.get(name)),
        }
    }

    /// Cell holding the missing-texture pattern.
    pub fn missing_entry(&self) -> AtlasEntry {
        self.missing
    }

    /// Fully transparent cell used for faces with no definition.
    pub fn blank_entry(&self) -> AtlasEntry {
        self.blank
    }

    pub fn animators(&self) -> &[AtlasAnimator] {
        &self.animators
    }

    /// Advance every animation by one game tick. Returns whether any pixels
    /// changed.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;
        for animator in &mut self.animators {
            changed |= animator.tick(&mut self.image);
        }
        changed
    }

    /// Atlas-space UVs of one face: four `[u, v]` corners in 0-1, V up,
    /// in the order (u1,v1), (u1,v2), (u2,v2), (u2,v1) after rotation.
    pub fn map_face(&self, element: &ModelElement, direction: Direction) -> [[f32; 2]; 4] {
        let Some(face) = element.faces.get(&direction) else {
            return self.normalize(&self.blank, [0.0, 0.0, 16.0, 16.0], 0);
        };
        let entry = self.entry(&face.texture).copied().unwrap_or_else(|| {
            log::debug!("No atlas entry for {}, using missing texture", face.texture);
            self.missing
        });
        let uv = face.uv.unwrap_or_else(|| direction.projected_uv(element.from, element.to));
        self.normalize(&entry, uv, face.rotation)
    }

    fn normalize(&self, entry: &AtlasEntry, uv: [f32; 4], rotation: i32) -> [[f32; 2]; 4] {
        let [u1, v1, u2, v2] = uv;
        let corners = [[u1, v1], [u1, v2], [u2, v2], [u2, v1]];
        let steps = (rotation / 90).rem_euclid(4) as usize;
        let (width, height) = (self.width() as f32, self.height() as f32);

        let mut mapped = [[0.0; 2]; 4];
        for (i, slot) in mapped.iter_mut().enumerate() {
            let [u, v] = corners[(i + steps) % 4];
            let [x, y] = entry.pixel(u, v);
            *slot = [x / width, 1.0 - y / height];
        }
        mapped
    }

    /// Fill `mapped_uv` of every element of `model`.
    pub fn map_model(&self, model: &mut BlockModel) {
        if let Some(elements) = model.elements.as_mut() {
            for element in elements {
                let mut mapped = [[[0.0; 2]; 4]; 6];
                for direction in Direction::ALL {
                    mapped[direction.index()] = self.map_face(element, direction);
                }
                element.mapped_uv = Some(mapped);
            }
        }
    }

    /// Export the atlas as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(std::io::Cursor::new(&mut bytes));

        encoder
            .write_image(
                self.image.as_raw(),
                self.width(),
                self.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| RenderError::AtlasBuild(format!("Failed to encode PNG: {}", e)))?;

        Ok(bytes)
    }
}

/// Builder for the atlas of one model's texture map.
///
/// Alias entries (`#other`) are not loaded; they share the entry of the
/// texture they end up at. Each distinct texture path gets one cell, filled
/// row-major in declaration order after the missing-texture cell.
pub struct AtlasBuilder {
    variables: TextureMap,
    paths: Vec<String>,
    textures: HashMap<String, TextureData>,
}

impl AtlasBuilder {
    pub fn new(variables: &TextureMap) -> Self {
        let mut paths: Vec<String> = Vec::new();
        for (_, value) in variables.iter() {
            if !value.starts_with('#') && !paths.iter().any(|p| p == value) {
                paths.push(value.to_string());
            }
        }
        Self {
            variables: variables.clone(),
            paths,
            textures: HashMap::new(),
        }
    }

    /// Texture paths that need loading, in declaration order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Provide the decoded texture for `path`. Paths never provided render
    /// with the missing texture.
    pub fn add_texture(&mut self, path: impl Into<String>, texture: TextureData) {
        self.textures.insert(path.into(), texture);
    }

    pub fn build(self) -> TextureAtlas {
        let loaded: Vec<(&String, &TextureData)> = self
            .paths
            .iter()
            .filter_map(|path| self.textures.get(path).map(|t| (path, t)))
            .collect();

        let cell_size = loaded
            .iter()
            .map(|(_, t)| t.width())
            .max()
            .unwrap_or(DEFAULT_CELL_SIZE)
            .max(1);
        let count = loaded.len() as u32;
        // Normally ceil(sqrt(count + 1)) cells per side. When that grid is
        // filled exactly by the missing cell and the textures, one more row
        // and column are added so the blank placeholder gets a cell of its own.
        let mut grid = ((count + 1) as f64).sqrt().ceil() as u32;
        if grid * grid <= count + 1 {
            grid += 1;
        }

        let side = grid * cell_size;
        let mut image = RgbaImage::new(side, side);
        let cell = |index: u32| [(index % grid) * cell_size, (index / grid) * cell_size];

        let missing = AtlasEntry {
            position: cell(0),
            size: [cell_size, cell_size],
        };
        draw_missing(&mut image, missing.position, cell_size);

        let mut paths = HashMap::new();
        let mut animators = Vec::new();
        let mut animated = false;
        let mut transparent = false;

        for (i, (path, texture)) in loaded.iter().enumerate() {
            let position = cell(i as u32 + 1);
            let mut frame = texture.first_frame();
            let size = [frame.width().min(cell_size), frame.height().min(cell_size)];
            if [frame.width(), frame.height()] != size {
                frame = image::imageops::crop_imm(&frame, 0, 0, size[0], size[1]).to_image();
            }
            image::imageops::replace(&mut image, &frame, position[0] as i64, position[1] as i64);

            animated |= texture.is_animated();
            transparent |= texture.has_transparency();
            if texture.is_animated() {
                animators.push(AtlasAnimator::new(path.to_string(), texture, position, size));
            }
            paths.insert(path.to_string(), AtlasEntry { position, size });
        }

        let blank = AtlasEntry {
            position: cell(count + 1),
            size: [cell_size, cell_size],
        };

        let mut entries = HashMap::new();
        for (name, value) in self.variables.iter() {
            let reference = format!("#{}", name);
            let entry = resolve_texture_chain(&reference, &self.variables, 0)
                .and_then(|path| paths.get(&path).copied())
                .unwrap_or_else(|| {
                    log::debug!("Texture {} ({}) has no atlas cell", name, value);
                    missing
                });
            entries.insert(name.to_string(), entry);
        }

        TextureAtlas {
            image,
            cell_size,
            grid,
            animated,
            transparent,
            entries,
            paths,
            missing,
            blank,
            animators,
        }
    }
}

/// Magenta/black checkerboard filling one cell.
fn draw_missing(image: &mut RgbaImage, position: [u32; 2], cell_size: u32) {
    let half = (cell_size / 2).max(1);
    for y in 0..cell_size {
        for x in 0..cell_size {
            let pixel = if ((x / half) + (y / half)) % 2 == 0 {
                Rgba([248, 0, 248, 255])
            } else {
                Rgba([0, 0, 0, 255])
            };
            image.put_pixel(position[0] + x, position[1] + y, pixel);
        }
    }
}

/// Build the atlas for `model` and write `mapped_uv` into its elements.
///
/// Returns `None` when the model has no textures. Textures load concurrently;
/// a texture that is absent or fails to load renders as the missing texture.
pub async fn create_atlas<P>(model: &mut BlockModel, provider: &P) -> Result<Option<TextureAtlas>>
where
    P: TextureProvider + ?Sized,
{
    if model.textures.is_empty() {
        return Ok(None);
    }

    let mut builder = AtlasBuilder::new(&model.textures);
    let loads = builder.paths().iter().map(|path| provider.texture(path));
    let results = join_all(loads).await;

    let paths = builder.paths().to_vec();
    for (path, result) in paths.into_iter().zip(results) {
        match result {
            Ok(Some(texture)) => builder.add_texture(path, texture),
            Ok(None) => log::warn!("Texture {} not found", path),
            Err(e) => log::warn!("Failed to load texture {}: {}", path, e),
        }
    }

    let atlas = builder.build();
    atlas.map_model(model);
    Ok(Some(atlas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_pack::ModelFace;
    use futures::future::{ready, FutureExt};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> TextureData {
        TextureData::new(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    struct MapProvider(HashMap<String, TextureData>);

    impl TextureProvider for MapProvider {
        fn texture(&self, path: &str) -> BoxFuture<'static, Result<Option<TextureData>>> {
            ready(Ok(self.0.get(path).cloned())).boxed()
        }
    }

    fn two_texture_model() -> BlockModel {
        serde_json::from_value(serde_json::json!({
            "textures": { "top": "block/a", "side": "block/b", "particle": "#side" },
            "elements": [{
                "from": [0, 0, 0], "to": [16, 8, 16],
                "faces": {
                    "up": { "texture": "#top" },
                    "north": { "texture": "#side", "rotation": 90 },
                    "east": { "texture": "#particle", "uv": [0, 8, 16, 16] }
                }
            }]
        }))
        .unwrap()
    }

    fn cell_bounds(atlas: &TextureAtlas, entry: &AtlasEntry) -> [f32; 4] {
        let (w, h) = (atlas.width() as f32, atlas.height() as f32);
        [
            entry.position[0] as f32 / w,
            1.0 - (entry.position[1] + entry.size[1]) as f32 / h,
            (entry.position[0] + entry.size[0]) as f32 / w,
            1.0 - entry.position[1] as f32 / h,
        ]
    }

    fn within(uvs: &[[f32; 2]; 4], bounds: [f32; 4]) -> bool {
        let eps = 1e-5;
        uvs.iter().all(|[u, v]| {
            *u >= bounds[0] - eps && *u <= bounds[2] + eps && *v >= bounds[1] - eps && *v <= bounds[3] + eps
        })
    }

    #[test]
    fn test_layout_and_aliases() {
        let model = two_texture_model();
        let mut builder = AtlasBuilder::new(&model.textures);
        assert_eq!(builder.paths(), ["block/a", "block/b"]);
        builder.add_texture("block/a", solid(16, 16, [255, 0, 0, 255]));
        builder.add_texture("block/b", solid(16, 16, [0, 255, 0, 255]));

        let atlas = builder.build();
        // ceil(sqrt(3)) = 2 cells per side, all cells in use (missing + 2 + blank).
        assert_eq!(atlas.grid, 2);
        assert_eq!(atlas.width(), 32);

        let a = *atlas.entry("#top").unwrap();
        let b = *atlas.entry("#side").unwrap();
        assert_ne!(a.position, b.position);
        assert_ne!(a.position, atlas.missing_entry().position);
        assert_ne!(b.position, atlas.blank_entry().position);
        assert_eq!(atlas.entry("#particle"), Some(&b));
        assert_eq!(atlas.entry("block/a"), Some(&a));

        assert_eq!(atlas.image.get_pixel(a.position[0], a.position[1]).0, [255, 0, 0, 255]);
        assert_eq!(atlas.image.get_pixel(b.position[0] + 15, b.position[1] + 15).0, [0, 255, 0, 255]);
        assert!(!atlas.transparent);
        assert!(!atlas.animated);
    }

    #[test]
    fn test_grid_grows_for_blank_cell() {
        let textures: TextureMap = [("all", "block/a")].into_iter().collect();
        let mut builder = AtlasBuilder::new(&textures);
        builder.add_texture("block/a", solid(16, 16, [1, 2, 3, 255]));
        let atlas = builder.build();
        assert_eq!(atlas.grid, 2);

        let textures: TextureMap = [("a", "block/a"), ("b", "block/b"), ("c", "block/c")]
            .into_iter()
            .collect();
        let mut builder = AtlasBuilder::new(&textures);
        for path in ["block/a", "block/b", "block/c"] {
            builder.add_texture(path, solid(16, 16, [1, 2, 3, 255]));
        }
        let atlas = builder.build();
        // ceil(sqrt(4)) = 2 would leave no cell for the blank placeholder.
        assert_eq!(atlas.grid, 3);
        assert_eq!(atlas.blank_entry().position, [16, 16]);
        assert_eq!(atlas.image.get_pixel(atlas.blank_entry().position[0], atlas.blank_entry().position[1]).0[3], 0);
    }

    #[tokio::test]
    async fn test_face_uvs_stay_in_their_cells() {
        let mut model = two_texture_model();
        let provider = MapProvider(HashMap::from([
            ("block/a".to_string(), solid(16, 16, [255, 0, 0, 255])),
            ("block/b".to_string(), solid(16, 16, [0, 255, 0, 128])),
        ]));

        let atlas = create_atlas(&mut model, &provider).await.unwrap().unwrap();
        assert!(atlas.transparent);

        let element = &model.elements()[0];
        let up = element.face_uv(Direction::Up).unwrap();
        let north = element.face_uv(Direction::North).unwrap();
        let east = element.face_uv(Direction::East).unwrap();
        let south = element.face_uv(Direction::South).unwrap();

        assert!(within(&up, cell_bounds(&atlas, atlas.entry("#top").unwrap())));
        assert!(within(&north, cell_bounds(&atlas, atlas.entry("#side").unwrap())));
        assert!(within(&east, cell_bounds(&atlas, atlas.entry("#side").unwrap())));
        assert!(within(&south, cell_bounds(&atlas, &atlas.blank_entry())));
        for face in element.mapped_uv.unwrap().iter() {
            assert!(face.iter().flatten().all(|c| (0.0..=1.0).contains(c)));
        }
    }

    #[test]
    fn test_rotation_cycles_corners() {
        let textures: TextureMap = [("all", "block/a")].into_iter().collect();
        let mut builder = AtlasBuilder::new(&textures);
        builder.add_texture("block/a", solid(16, 16, [0, 0, 0, 255]));
        let atlas = builder.build();

        let mut element = ModelElement::cube("#all");
        let plain = atlas.map_face(&element, Direction::Up);
        element.faces.insert(Direction::Up, ModelFace { rotation: 90, ..ModelFace::new("#all") });
        let rotated = atlas.map_face(&element, Direction::Up);

        for i in 0..4 {
            assert_eq!(rotated[i], plain[(i + 1) % 4]);
        }
    }

    #[tokio::test]
    async fn test_missing_texture_uses_missing_cell() {
        let mut model: BlockModel = serde_json::from_value(serde_json::json!({
            "textures": { "all": "block/gone" },
            "elements": [{ "from": [0, 0, 0], "to": [16, 16, 16], "faces": { "up": { "texture": "#all" } } }]
        }))
        .unwrap();
        let provider = MapProvider(HashMap::new());

        let atlas = create_atlas(&mut model, &provider).await.unwrap().unwrap();
        assert_eq!(atlas.entry("#all"), Some(&atlas.missing_entry()));
        assert_eq!(atlas.cell_size, 16);
    }

    #[tokio::test]
    async fn test_no_textures_no_atlas() {
        let mut model = BlockModel::new();
        let provider = MapProvider(HashMap::new());
        assert!(create_atlas(&mut model, &provider).await.unwrap().is_none());
    }

    #[test]
    fn test_to_png() {
        let textures: TextureMap = [("all", "block/a")].into_iter().collect();
        let atlas = AtlasBuilder::new(&textures).build();
        let png = atlas.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (atlas.width(), atlas.height()));
    }
}
