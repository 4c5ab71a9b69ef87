use std::cmp::Ordering;

use tracing::trace;

use crate::config::Config;
use crate::error::Result;
use crate::feature::PointSet;
use crate::image::Image;
use crate::my_types::*;

/// Anything that can pick trackable points out of a grayscale frame.
pub trait FeatureDetector {
    /// An empty point set is a valid answer.
    fn detect(&mut self, image: &Image) -> Result<PointSet>;
}

/// Shi-Tomasi corner detector ("good features to track").
/// ref https://docs.opencv.org/4.x/d4/d8c/tutorial_py_shi_tomasi.html
pub struct Detector {
    max_corners: usize,
    quality_level: f64,
    min_distance: f64,
    block_size: usize,
    /// integral images of the gradient products, (w + 1) x (h + 1)
    sum_xx: Vec<f64>,
    sum_xy: Vec<f64>,
    sum_yy: Vec<f64>,
    response: Vec<f64>,
}

impl Detector {
    pub fn new(config: &Config) -> Self {
        Self::with_params(
            config.max_corners,
            config.quality_level,
            config.min_distance,
            config.block_size,
        )
    }

    pub fn with_params(
        max_corners: usize,
        quality_level: f64,
        min_distance: f64,
        block_size: usize,
    ) -> Self {
        Detector {
            max_corners,
            quality_level,
            min_distance,
            block_size,
            sum_xx: vec![],
            sum_xy: vec![],
            sum_yy: vec![],
            response: vec![],
        }
    }

    /// Minimum eigenvalue of the structure tensor for every pixel
    fn compute_response(&mut self, image: &Image) {
        let w = image.width;
        let h = image.height;
        let stride = w + 1;
        for sum in [&mut self.sum_xx, &mut self.sum_xy, &mut self.sum_yy] {
            sum.clear();
            sum.resize(stride * (h + 1), 0.);
        }

        let v = |x: i32, y: i32| -> f64 {
            image.value(x.clamp(0, w as i32 - 1) as usize, y.clamp(0, h as i32 - 1) as usize)
                as f64
        };

        for y in 0..h {
            let (mut row_xx, mut row_xy, mut row_yy) = (0., 0., 0.);
            for x in 0..w {
                let (xi, yi) = (x as i32, y as i32);
                // 3x3 Sobel
                let dx = v(xi + 1, yi - 1) + 2. * v(xi + 1, yi) + v(xi + 1, yi + 1)
                    - v(xi - 1, yi - 1)
                    - 2. * v(xi - 1, yi)
                    - v(xi - 1, yi + 1);
                let dy = v(xi - 1, yi + 1) + 2. * v(xi, yi + 1) + v(xi + 1, yi + 1)
                    - v(xi - 1, yi - 1)
                    - 2. * v(xi, yi - 1)
                    - v(xi + 1, yi - 1);
                row_xx += dx * dx;
                row_xy += dx * dy;
                row_yy += dy * dy;
                let i = (y + 1) * stride + x + 1;
                let above = y * stride + x + 1;
                self.sum_xx[i] = self.sum_xx[above] + row_xx;
                self.sum_xy[i] = self.sum_xy[above] + row_xy;
                self.sum_yy[i] = self.sum_yy[above] + row_yy;
            }
        }

        let r = self.block_size / 2;
        self.response.clear();
        self.response.reserve(w * h);
        for y in 0..h {
            let y0 = y.saturating_sub(r);
            let y1 = usize::min(y + r + 1, h);
            for x in 0..w {
                let x0 = x.saturating_sub(r);
                let x1 = usize::min(x + r + 1, w);
                let box_sum = |sum: &[f64]| {
                    sum[y1 * stride + x1] - sum[y0 * stride + x1] - sum[y1 * stride + x0]
                        + sum[y0 * stride + x0]
                };
                let a = box_sum(self.sum_xx.as_slice());
                let b = box_sum(self.sum_xy.as_slice());
                let c = box_sum(self.sum_yy.as_slice());
                let min_eig = 0.5 * ((a + c) - ((a - c).powi(2) + 4. * b * b).sqrt());
                self.response.push(f64::max(min_eig, 0.));
            }
        }
    }

    fn is_local_max(&self, w: usize, x: usize, y: usize) -> bool {
        let value = self.response[y * w + x];
        for ny in (y - 1)..=(y + 1) {
            for nx in (x - 1)..=(x + 1) {
                if self.response[ny * w + nx] > value {
                    return false;
                }
            }
        }
        true
    }
}

impl FeatureDetector for Detector {
    fn detect(&mut self, image: &Image) -> Result<PointSet> {
        let w = image.width;
        let h = image.height;
        if w < 3 || h < 3 {
            return Ok(PointSet::empty());
        }
        self.compute_response(image);

        let max_response = self.response.iter().cloned().fold(0., f64::max);
        if max_response <= 0. {
            return Ok(PointSet::empty());
        }
        let threshold = self.quality_level * max_response;

        let mut candidates = vec![];
        for y in 1..(h - 1) {
            for x in 1..(w - 1) {
                let value = self.response[y * w + x];
                if value > 0. && value >= threshold && self.is_local_max(w, x, y) {
                    candidates.push((value, x, y));
                }
            }
        }
        // strongest first, raster order among equals
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut grid = DistanceGrid::new(w, h, self.min_distance);
        let mut corners = vec![];
        for (_, x, y) in candidates {
            let point = Vector2d::new(x as f64, y as f64);
            if !grid.try_insert(point) {
                continue;
            }
            corners.push(point);
            if self.max_corners > 0 && corners.len() >= self.max_corners {
                break;
            }
        }
        trace!("detected {} corners", corners.len());
        Ok(PointSet::new(corners))
    }
}

/// Buckets accepted corners into cells of side `min_distance` so that a new
/// candidate only needs to be compared against its neighbouring cells.
struct DistanceGrid {
    min_distance2: f64,
    cell: f64,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Vector2d>>,
}

impl DistanceGrid {
    fn new(width: usize, height: usize, min_distance: f64) -> Self {
        let cell = f64::max(min_distance, 1.);
        let cols = (width as f64 / cell).ceil() as usize;
        let rows = (height as f64 / cell).ceil() as usize;
        Self {
            min_distance2: min_distance * min_distance,
            cell,
            cols,
            rows,
            cells: vec![vec![]; cols * rows],
        }
    }

    fn try_insert(&mut self, p: Vector2d) -> bool {
        let cx = (p.x / self.cell) as usize;
        let cy = (p.y / self.cell) as usize;
        if self.min_distance2 > 0. {
            for ny in cy.saturating_sub(1)..usize::min(cy + 2, self.rows) {
                for nx in cx.saturating_sub(1)..usize::min(cx + 2, self.cols) {
                    if self.cells[ny * self.cols + nx]
                        .iter()
                        .any(|q| (q - p).norm_squared() < self.min_distance2)
                    {
                        return false;
                    }
                }
            }
        }
        self.cells[cy * self.cols + cx].push(p);
        true
    }
}
