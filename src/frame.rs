use crate::error::{FlowError, Result};
use crate::image::{ColorImage, Image};
use crate::pyramid::Pyramid;

#[derive(Debug)]
pub struct PyramidFrame {
    /// original image
    pub image: Image,
    /// downsized images
    pub pyramid: Pyramid,
}

impl PyramidFrame {
    pub fn get_image_at_level(&self, level: usize) -> &Image {
        if level == 0 {
            &self.image
        } else {
            &self.pyramid.levels[level - 1]
        }
    }

    /// Number of levels above the original image
    pub fn level_count(&self) -> usize {
        self.pyramid.levels.len()
    }
}

/// A decoded video frame together with its grayscale pyramid.
#[derive(Debug)]
pub struct Frame {
    pub index: usize,
    pub color: ColorImage,
    pub pyramid_frame: PyramidFrame,
}

impl Frame {
    pub fn new(
        index: usize,
        color: ColorImage,
        lk_levels: usize,
        unused_frame: Option<Frame>,
    ) -> Result<Frame> {
        // Move the buffers of an old frame into the new one to avoid allocation
        let mut pyramid_frame = if let Some(unused_frame) = unused_frame {
            unused_frame.pyramid_frame
        } else {
            PyramidFrame {
                image: Image::empty(),
                pyramid: Pyramid::empty(),
            }
        };

        color.to_gray_into(&mut pyramid_frame.image);
        pyramid_frame
            .pyramid
            .compute(&pyramid_frame.image, lk_levels)
            .map_err(|e| FlowError::Image(format!("frame {index}: {e}")))?;

        Ok(Frame {
            index,
            color,
            pyramid_frame,
        })
    }

    pub fn gray(&self) -> &Image {
        &self.pyramid_frame.image
    }
}
