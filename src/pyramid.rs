use anyhow::{bail, Result};

use crate::image::Image;

/// Smallest side a pyramid level is allowed to have
const MIN_LEVEL_SIZE: usize = 8;

#[derive(Debug)]
pub struct Pyramid {
    /// levels[0] is half the parent resolution, levels[1] a quarter, ...
    pub levels: Vec<Image>,
    pub parent_size: [usize; 2],
}

impl Pyramid {
    pub fn empty() -> Self {
        Self {
            levels: vec![],
            parent_size: [0; 2],
        }
    }

    /// Compute up to `level_count` downscaled levels. Levels that would be
    /// smaller than a few pixels are not built, so `levels.len()` may end up
    /// below `level_count` for tiny frames.
    pub fn compute(&mut self, frame: &Image, level_count: usize) -> Result<()> {
        if frame.is_empty() {
            bail!("cannot build a pyramid from an empty image");
        }
        let level_count = usable_level_count(frame.width, frame.height, level_count);
        self.compute_levels(frame, level_count)?;
        self.parent_size = [frame.width, frame.height];
        Ok(())
    }

    fn compute_levels(&mut self, frame: &Image, level_count: usize) -> Result<()> {
        self.levels.truncate(level_count);
        while self.levels.len() < level_count {
            self.levels.push(Image::empty())
        }
        if level_count == 0 {
            return Ok(());
        }
        downscale(frame, &mut self.levels[0])?;
        for i in 0..(level_count - 1) {
            let rest = &mut self.levels[i..];
            if let Some((parent, rest)) = rest.split_first_mut() {
                downscale(parent, &mut rest[0])?;
            }
        }
        Ok(())
    }
}

fn usable_level_count(width: usize, height: usize, wanted: usize) -> usize {
    let mut count = 0;
    let (mut w, mut h) = (width, height);
    while count < wanted {
        w = (w + 1) / 2;
        h = (h + 1) / 2;
        if w < MIN_LEVEL_SIZE || h < MIN_LEVEL_SIZE {
            break;
        }
        count += 1;
    }
    count
}

/// downscale the parent image and store the result in child
fn downscale(parent: &Image, child: &mut Image) -> Result<()> {
    let w = parent.width as i32;
    let h = parent.height as i32;
    if w == 0 || h == 0 {
        bail!("cannot downscale image with shape {w} x {h}");
    }

    let w_half = (w + 1) / 2;
    let h_half = (h + 1) / 2;
    child.data.clear();
    child.width = w_half as usize;
    child.height = h_half as usize;

    // clamp to the border
    let v = |x: i32, y: i32| -> u16 {
        parent.value(x.clamp(0, w - 1) as usize, y.clamp(0, h - 1) as usize) as u16
    };

    for y in 0..h_half {
        let y2 = 2 * y;
        for x in 0..w_half {
            let x2 = 2 * x;
            // 3x3 binomial kernel
            let value = (4 * v(x2, y2)
                + 2 * (v(x2 + 1, y2) + v(x2 - 1, y2) + v(x2, y2 + 1) + v(x2, y2 - 1))
                + v(x2 + 1, y2 + 1)
                + v(x2 - 1, y2 - 1)
                + v(x2 - 1, y2 + 1)
                + v(x2 + 1, y2 - 1)
                + 8)
                / 16;
            child.data.push(value as u8);
        }
    }
    Ok(())
}
