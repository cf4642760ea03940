//! Frame stepping for animated atlas cells.

use crate::resource_pack::TextureData;
use image::RgbaImage;

/// Plays one animation strip inside its atlas cell.
#[derive(Debug, Clone)]
pub struct AtlasAnimator {
    path: String,
    frames: Vec<RgbaImage>,
    /// `(frame index, ticks)` in play order.
    schedule: Vec<(u32, u32)>,
    position: [u32; 2],
    size: [u32; 2],
    step: usize,
    elapsed: u32,
}

impl AtlasAnimator {
    pub fn new(path: String, texture: &TextureData, position: [u32; 2], size: [u32; 2]) -> Self {
        let frame_count = texture.frame_count();
        let frames = (0..frame_count).map(|i| texture.frame(i)).collect();
        let schedule = match &texture.animation {
            Some(meta) => meta.schedule(frame_count),
            None => (0..frame_count).map(|i| (i, 1)).collect(),
        };
        Self {
            path,
            frames,
            schedule,
            position,
            size,
            step: 0,
            elapsed: 0,
        }
    }

    /// Texture path being animated.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Strip index of the frame currently shown.
    pub fn current_frame(&self) -> u32 {
        self.schedule.get(self.step).map(|(frame, _)| *frame).unwrap_or(0)
    }

    /// Advance one game tick, drawing the next frame into `atlas` when the
    /// current one has run its time. Returns whether anything was drawn.
    pub fn tick(&mut self, atlas: &mut RgbaImage) -> bool {
        let Some(&(_, ticks)) = self.schedule.get(self.step) else {
            return false;
        };
        self.elapsed += 1;
        if self.elapsed < ticks {
            return false;
        }
        self.elapsed = 0;
        let previous = self.current_frame();
        self.step = (self.step + 1) % self.schedule.len();
        let frame = self.current_frame();
        if frame == previous {
            return false;
        }
        self.draw(atlas, frame);
        true
    }

    fn draw(&self, atlas: &mut RgbaImage, frame: u32) {
        let Some(image) = self.frames.get(frame as usize) else {
            return;
        };
        let visible = image::imageops::crop_imm(image, 0, 0, self.size[0], self.size[1]).to_image();
        image::imageops::replace(atlas, &visible, self.position[0] as i64, self.position[1] as i64);
    }
}
