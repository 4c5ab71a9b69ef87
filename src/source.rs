use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::error::{FlowError, Result};
use crate::image::ColorImage;

/// Ordered, indexable supply of decoded frames.
pub trait FrameSource {
    fn frame_count(&self) -> usize;

    fn get_frame(&mut self, index: usize) -> Result<ColorImage>;
}

/// Frames held in memory
pub struct MemorySource {
    frames: Vec<ColorImage>,
}

impl MemorySource {
    pub fn new(frames: Vec<ColorImage>) -> Self {
        Self { frames }
    }
}

impl FrameSource for MemorySource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn get_frame(&mut self, index: usize) -> Result<ColorImage> {
        self.frames.get(index).cloned().ok_or(FlowError::Decode {
            index,
            reason: format!("only {} frames available", self.frames.len()),
        })
    }
}

/// A bright square sliding over a dark background at constant speed.
/// Frame `i` is always rendered the same way, whatever order frames are read in.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    pub width: usize,
    pub height: usize,
    pub frame_count: usize,
    pub background: u8,
    pub foreground: u8,
    pub square_size: usize,
    /// top-left corner of the square on frame 0
    pub start: (i32, i32),
    /// pixels per frame
    pub velocity: (i32, i32),
    /// amplitude of uniform per-pixel noise, 0 disables it
    pub noise: u8,
    pub seed: u64,
}

impl SyntheticSource {
    pub fn new(frame_count: usize, velocity: (i32, i32)) -> Self {
        Self {
            width: 320,
            height: 240,
            frame_count,
            background: 40,
            foreground: 210,
            square_size: 80,
            start: (100, 80),
            velocity,
            noise: 0,
            seed: 0,
        }
    }

    pub fn with_noise(mut self, noise: u8, seed: u64) -> Self {
        self.noise = noise;
        self.seed = seed;
        self
    }

    /// Top-left corner of the square on a given frame
    pub fn square_origin(&self, index: usize) -> (i32, i32) {
        (
            self.start.0 + self.velocity.0 * index as i32,
            self.start.1 + self.velocity.1 * index as i32,
        )
    }
}

impl FrameSource for SyntheticSource {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn get_frame(&mut self, index: usize) -> Result<ColorImage> {
        if index >= self.frame_count {
            return Err(FlowError::Decode {
                index,
                reason: format!("synthetic video has {} frames", self.frame_count),
            });
        }
        let bg = self.background;
        let fg = self.foreground;
        let mut frame = ColorImage::filled(self.width, self.height, [bg, bg, bg]);
        let (x, y) = self.square_origin(index);
        frame.fill_rect(x, y, self.square_size, self.square_size, [fg, fg, fg]);

        if self.noise > 0 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed.wrapping_add(index as u64));
            let amplitude = self.noise as i16;
            for value in frame.data.iter_mut() {
                let n = rng.gen_range(-amplitude..=amplitude);
                *value = (*value as i16 + n).clamp(0, 255) as u8;
            }
        }
        Ok(frame)
    }
}
