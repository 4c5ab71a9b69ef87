use ndarray as nd;

use crate::error::{FlowError, Result};
use crate::my_types::*;

/// Row-major grayscale image storage
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Image {
    /// Create an empty image
    pub fn empty() -> Image {
        Image {
            data: vec![],
            width: 0,
            height: 0,
        }
    }

    /// Create an image filled with a single value
    pub fn filled(width: usize, height: usize, value: u8) -> Image {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get the size for a chosen dimension
    pub fn size(&self, dim: usize) -> usize {
        if dim == 0 {
            self.width
        } else {
            self.height
        }
    }

    #[inline(always)]
    pub fn value(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline(always)]
    pub fn value_i32(&self, x: i32, y: i32) -> u8 {
        self.data[y as usize * self.width + x as usize]
    }

    #[inline(always)]
    pub fn set_value(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Copy `patch` so that its top-left corner lands on (x, y). Pixels that
    /// fall outside the image are skipped.
    pub fn set_sub_image_i32(&mut self, x: i32, y: i32, patch: &Image) {
        for py in 0..patch.height as i32 {
            for px in 0..patch.width as i32 {
                let (tx, ty) = (x + px, y + py);
                if tx < 0 || ty < 0 || tx >= self.width as i32 || ty >= self.height as i32 {
                    continue;
                }
                self.set_value(tx as usize, ty as usize, patch.value_i32(px, py));
            }
        }
    }
}

/// Sample the image at a sub-pixel position. The caller keeps the position
/// inside the image, neighbours past the last row or column are clamped.
pub fn bilinear(image: &Image, p: Vector2d) -> f64 {
    let x0 = p.x.floor();
    let y0 = p.y.floor();
    let ax = p.x - x0;
    let ay = p.y - y0;
    let x0 = x0 as usize;
    let y0 = y0 as usize;
    let x1 = usize::min(x0 + 1, image.width - 1);
    let y1 = usize::min(y0 + 1, image.height - 1);

    let v00 = image.value(x0, y0) as f64;
    let v10 = image.value(x1, y0) as f64;
    let v01 = image.value(x0, y1) as f64;
    let v11 = image.value(x1, y1) as f64;

    (1. - ay) * ((1. - ax) * v00 + ax * v10) + ay * ((1. - ax) * v01 + ax * v11)
}

/// Row-major 8-bit color image, channels interleaved in BGR order the way
/// video decoders hand them out.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorImage {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl ColorImage {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Result<ColorImage> {
        if data.len() != width * height * 3 {
            return Err(FlowError::Image(format!(
                "expected {} bytes for a {width} x {height} BGR image, got {}",
                width * height * 3,
                data.len()
            )));
        }
        Ok(ColorImage {
            data,
            width,
            height,
        })
    }

    pub fn filled(width: usize, height: usize, bgr: [u8; 3]) -> ColorImage {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&bgr);
        }
        ColorImage {
            data,
            width,
            height,
        }
    }

    /// Build a BGR image from interleaved decoder output with 1, 3 or 4
    /// channels. Gray is replicated and a trailing alpha channel is dropped.
    pub fn from_interleaved(bytes: &[u8], width: usize, height: usize) -> Result<ColorImage> {
        let pixels = width * height;
        if pixels == 0 || bytes.len() % pixels != 0 {
            return Err(FlowError::Image(format!(
                "{} bytes do not fit a {width} x {height} image",
                bytes.len()
            )));
        }
        match bytes.len() / pixels {
            1 => Ok(ColorImage::from_gray(&Image {
                data: bytes.to_vec(),
                width,
                height,
            })),
            3 => ColorImage::new(bytes.to_vec(), width, height),
            4 => {
                let data = bytes
                    .chunks_exact(4)
                    .flat_map(|bgra| [bgra[0], bgra[1], bgra[2]])
                    .collect();
                ColorImage::new(data, width, height)
            }
            channels => Err(FlowError::Image(format!(
                "unsupported channel count {channels}"
            ))),
        }
    }

    /// Replicate a grayscale image into three channels
    pub fn from_gray(gray: &Image) -> ColorImage {
        let mut data = Vec::with_capacity(gray.data.len() * 3);
        for &v in gray.data.iter() {
            data.extend_from_slice(&[v, v, v]);
        }
        ColorImage {
            data,
            width: gray.width,
            height: gray.height,
        }
    }

    #[inline(always)]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = 3 * (y * self.width + x);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline(always)]
    pub fn set_pixel(&mut self, x: usize, y: usize, bgr: [u8; 3]) {
        let i = 3 * (y * self.width + x);
        self.data[i..i + 3].copy_from_slice(&bgr);
    }

    /// Fill an axis aligned rectangle, clipped to the image
    pub fn fill_rect(&mut self, x: i32, y: i32, width: usize, height: usize, bgr: [u8; 3]) {
        let x_begin = x.max(0) as usize;
        let y_begin = y.max(0) as usize;
        let x_end = (x + width as i32).clamp(0, self.width as i32) as usize;
        let y_end = (y + height as i32).clamp(0, self.height as i32) as usize;
        for yy in y_begin..y_end {
            for xx in x_begin..x_end {
                self.set_pixel(xx, yy, bgr);
            }
        }
    }

    /// Convert to grayscale into `out`, reusing its buffer.
    /// Uses the ITU-R BT.601 luma weights.
    pub fn to_gray_into(&self, out: &mut Image) {
        out.data.clear();
        out.data.reserve(self.width * self.height);
        for bgr in self.data.chunks_exact(3) {
            let luma = 0.114 * bgr[0] as f64 + 0.587 * bgr[1] as f64 + 0.299 * bgr[2] as f64;
            out.data.push(luma.round().clamp(0., 255.) as u8);
        }
        out.width = self.width;
        out.height = self.height;
    }

    pub fn to_gray(&self) -> Image {
        let mut out = Image::empty();
        self.to_gray_into(&mut out);
        out
    }

    /// RGB view with shape (height, width, 3), as image loggers expect
    pub fn to_rgb_array(&self) -> Result<nd::Array3<u8>> {
        let mut rgb = Vec::with_capacity(self.data.len());
        for bgr in self.data.chunks_exact(3) {
            rgb.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
        }
        nd::Array3::from_shape_vec((self.height, self.width, 3), rgb)
            .map_err(|e| FlowError::Image(e.to_string()))
    }
}
