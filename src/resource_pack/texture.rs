//! Texture decoding and animation metadata.

use crate::error::Result;
use image::RgbaImage;
use serde::Deserialize;

/// A decoded texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    /// RGBA8 pixels. Animation strips keep every frame stacked vertically.
    pub image: RgbaImage,
    /// Animation metadata from the `.mcmeta` sidecar, if any.
    pub animation: Option<AnimationMeta>,
}

impl TextureData {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            animation: None,
        }
    }

    /// Decode PNG (or any enabled image format) bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data)?.to_rgba8();
        Ok(Self::new(image))
    }

    pub fn with_animation(mut self, animation: Option<AnimationMeta>) -> Self {
        self.animation = animation;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Magenta/black checkerboard used for textures that failed to load.
    pub fn missing() -> Self {
        let size = 16;
        let image = RgbaImage::from_fn(size, size, |x, y| {
            if ((x / 8) + (y / 8)) % 2 == 0 {
                image::Rgba([248, 0, 248, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        Self::new(image)
    }

    /// Whether this is a vertical animation strip: taller than wide, with a
    /// height that is an exact multiple of the width.
    pub fn is_animated(&self) -> bool {
        let (w, h) = self.image.dimensions();
        w > 0 && h > w && h % w == 0
    }

    /// Number of frames in the strip (1 when not animated).
    pub fn frame_count(&self) -> u32 {
        if self.is_animated() {
            self.height() / self.width()
        } else {
            1
        }
    }

    /// Size of a single frame.
    pub fn frame_size(&self) -> (u32, u32) {
        if self.is_animated() {
            (self.width(), self.width())
        } else {
            self.image.dimensions()
        }
    }

    /// Check if any pixel is not fully opaque.
    pub fn has_transparency(&self) -> bool {
        self.image.pixels().any(|p| p.0[3] < 255)
    }

    /// Copy out frame `index` (wrapping) of an animation strip.
    pub fn frame(&self, index: u32) -> RgbaImage {
        let (w, h) = self.frame_size();
        let index = index % self.frame_count();
        image::imageops::crop_imm(&self.image, 0, index * h, w, h).to_image()
    }

    /// First frame of an animated texture, or the whole texture.
    pub fn first_frame(&self) -> RgbaImage {
        self.frame(0)
    }
}

/// Contents of a texture's `.mcmeta` sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AnimationMeta {
    /// Game ticks each frame stays on screen.
    #[serde(default = "default_frametime")]
    pub frametime: u32,
    /// Explicit frame order; strip order when absent.
    #[serde(default)]
    pub frames: Option<Vec<AnimationFrame>>,
    #[serde(default)]
    pub interpolate: bool,
}

fn default_frametime() -> u32 {
    1
}

/// An entry of the `frames` list: a bare index or `{index, time}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AnimationFrame {
    Index(u32),
    Timed {
        index: u32,
        #[serde(default)]
        time: Option<u32>,
    },
}

impl AnimationFrame {
    pub fn index(&self) -> u32 {
        match self {
            AnimationFrame::Index(index) => *index,
            AnimationFrame::Timed { index, .. } => *index,
        }
    }

    fn time(&self) -> Option<u32> {
        match self {
            AnimationFrame::Index(_) => None,
            AnimationFrame::Timed { time, .. } => *time,
        }
    }
}

impl AnimationMeta {
    /// Frame schedule as `(frame index, ticks)` pairs.
    pub fn schedule(&self, frame_count: u32) -> Vec<(u32, u32)> {
        let frametime = self.frametime.max(1);
        match &self.frames {
            Some(frames) if !frames.is_empty() => frames
                .iter()
                .map(|f| (f.index() % frame_count.max(1), f.time().unwrap_or(frametime).max(1)))
                .collect(),
            _ => (0..frame_count.max(1)).map(|i| (i, frametime)).collect(),
        }
    }
}

#[derive(Deserialize)]
struct McmetaFile {
    animation: Option<AnimationMeta>,
}

/// Parse a `.mcmeta` document. Files without an `animation` block yield None.
pub fn parse_mcmeta(data: &[u8]) -> Result<Option<AnimationMeta>> {
    let file: McmetaFile = serde_json::from_slice(data)?;
    Ok(file.animation)
}
