use nalgebra as na;

use crate::config::Config;
use crate::error::{FlowError, Result};
use crate::feature::{FlowMatch, FlowResult};
use crate::frame::PyramidFrame;
use crate::image::*;
use crate::my_types::*;

type Range = [[i16; 2]; 2];

/// Anything that can follow points from one frame into the next.
pub trait FlowEstimator {
    /// Returns exactly one match per entry of `points`, in the same order.
    fn estimate(
        &mut self,
        frame0: &PyramidFrame,
        frame1: &PyramidFrame,
        points: &[Vector2d],
    ) -> Result<FlowResult>;
}

/// Sparse pyramidal Lucas-Kanade tracker.
pub struct OpticalFlow {
    lk_iters: usize,
    lk_levels: usize,
    lk_win_size: usize,
    lk_term: f64,
    lk_min_eig: f64,
    ix: Matrixd,
    iy: Matrixd,
    it: Matrixd,
    grid: Matrixd,
}

impl OpticalFlow {
    pub fn new(config: &Config) -> Result<OpticalFlow> {
        Self::with_params(
            config.window_size,
            config.max_pyramid_level,
            config.convergence_iterations,
            config.convergence_epsilon,
            config.min_eigen_threshold,
        )
    }

    pub fn with_params(
        lk_win_size: usize,
        lk_levels: usize,
        lk_iters: usize,
        lk_term: f64,
        lk_min_eig: f64,
    ) -> Result<OpticalFlow> {
        if lk_win_size < 3 || lk_win_size % 2 == 0 {
            return Err(FlowError::InvalidConfig(format!(
                "window size must be odd and at least 3, got {lk_win_size}"
            )));
        }

        Ok(OpticalFlow {
            lk_iters,
            lk_levels,
            lk_win_size,
            lk_term,
            lk_min_eig,
            ix: na::DMatrix::zeros(lk_win_size, lk_win_size),
            iy: na::DMatrix::zeros(lk_win_size, lk_win_size),
            it: na::DMatrix::zeros(lk_win_size, lk_win_size),
            grid: na::DMatrix::zeros(lk_win_size, lk_win_size),
        })
    }

    /// ref http://robots.stanford.edu/cs223b04/algo_tracking.pdf
    fn process_point(
        &mut self,
        pyramid_frame0: &PyramidFrame,
        pyramid_frame1: &PyramidFrame,
        point0: Vector2d,
    ) -> Option<FlowMatch> {
        let lk_term2 = self.lk_term.powi(2);
        let r = (self.lk_win_size - 1) / 2;
        let levels = self
            .lk_levels
            .min(pyramid_frame0.level_count())
            .min(pyramid_frame1.level_count());

        // guess carried down the pyramid
        let mut g = Vector2d::zeros();
        let mut d = Vector2d::zeros();
        let mut range = [[0, 0], [0, 0]];
        for level in (0..levels + 1).rev() {
            let level0 = pyramid_frame0.get_image_at_level(level);
            let level1 = pyramid_frame1.get_image_at_level(level);
            let u = point0 / u32::pow(2, level as u32) as f64;
            range = integration_range(level0, u, r, 1)?;
            // compute the derivative
            scharr(
                level0,
                u,
                range,
                &mut self.ix,
                &mut self.iy,
                &mut self.grid,
            );
            let gradient = spatial_gradient(&self.ix, &self.iy);
            let area = (self.ix.nrows() * self.ix.ncols()) as f64;
            if min_eigenvalue(&gradient) / area < self.lk_min_eig {
                return None;
            }
            // running out of iterations still keeps the estimate
            let mut nu = Vector2d::zeros();
            for _ in 0..self.lk_iters {
                image_difference(range, r, &self.grid, &mut self.it, level1, u + g + nu)?;
                let eta = flow_vector(&gradient, &self.ix, &self.iy, &self.it)?;
                nu += eta;
                if eta.norm_squared() < lk_term2 {
                    break;
                }
            }

            d = nu;
            if level > 0 {
                g = 2. * (g + d)
            }
        }

        // residual at the final position, also rejects points that drifted out
        let level1 = pyramid_frame1.get_image_at_level(0);
        image_difference(range, r, &self.grid, &mut self.it, level1, point0 + g + d)?;
        let error = self.it.abs().mean();

        Some(FlowMatch {
            point: point0 + g + d,
            valid: true,
            error,
        })
    }
}

impl FlowEstimator for OpticalFlow {
    fn estimate(
        &mut self,
        frame0: &PyramidFrame,
        frame1: &PyramidFrame,
        points: &[Vector2d],
    ) -> Result<FlowResult> {
        let matches = points
            .iter()
            .map(|&p| {
                self.process_point(frame0, frame1, p)
                    .unwrap_or_else(|| FlowMatch::lost(p))
            })
            .collect();
        FlowResult::new(points.len(), matches)
    }
}

fn min_eigenvalue(m: &Matrix2d) -> f64 {
    let half_trace = 0.5 * (m[(0, 0)] + m[(1, 1)]);
    let half_diff = 0.5 * (m[(0, 0)] - m[(1, 1)]);
    half_trace - (half_diff * half_diff + m[(0, 1)] * m[(1, 0)]).sqrt()
}

fn flow_vector(gradient: &Matrix2d, ix: &Matrixd, iy: &Matrixd, it: &Matrixd) -> Option<Vector2d> {
    let mut b = Vector2d::zeros();

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            b[0] += it[(y, x)] * ix[(y, x)];
            b[1] += it[(y, x)] * iy[(y, x)];
        }
    }

    gradient.try_inverse().map(|inv_g| inv_g * b)
}

fn image_difference(
    prev_range: Range,
    r: usize,
    i0: &Matrixd,
    it: &mut Matrixd,
    level: &Image,
    center: Vector2d,
) -> Option<()> {
    let range = integration_range(level, center, r, 0)?;
    if range != prev_range {
        return None;
    }
    fill_grid(level, range, center, it);
    *it *= -1.;
    *it += i0.view((1, 1), (it.nrows(), it.ncols()));
    Some(())
}

fn spatial_gradient(ix: &Matrixd, iy: &Matrixd) -> Matrix2d {
    assert_eq!(ix.nrows(), iy.nrows());
    assert_eq!(ix.ncols(), iy.ncols());

    let mut x2 = 0.;
    let mut y2 = 0.;
    let mut xy = 0.;

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            x2 += ix[(y, x)] * ix[(y, x)];
            y2 += iy[(y, x)] * iy[(y, x)];
            xy += ix[(y, x)] * iy[(y, x)];
        }
    }

    Matrix2d::new(x2, xy, xy, y2)
}

/// ref https://theailearner.com/tag/scharr-operator/
fn scharr(
    level: &Image,
    center: Vector2d,
    range: Range,
    out_x: &mut Matrixd,
    out_y: &mut Matrixd,
    grid: &mut Matrixd,
) {
    let grange = [
        [range[0][0] - 1, range[0][1] + 1],
        [range[1][0] - 1, range[1][1] + 1],
    ];
    fill_grid(level, grange, center, grid);

    *out_x = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    *out_y = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    for y in 1..(grid.nrows() - 1) {
        for x in 1..(grid.ncols() - 1) {
            out_x[(y - 1, x - 1)] =
                (10. * grid[(y, x + 1)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y - 1, x + 1)]
                    - 10. * grid[(y, x - 1)]
                    - 3. * grid[(y + 1, x - 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
            out_y[(y - 1, x - 1)] =
                (10. * grid[(y + 1, x)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y + 1, x - 1)]
                    - 10. * grid[(y - 1, x)]
                    - 3. * grid[(y - 1, x + 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
        }
    }
}

fn fill_grid(level: &Image, range: Range, center: Vector2d, grid: &mut Matrixd) {
    *grid = na::DMatrix::zeros(
        (range[1][1] - range[1][0] + 1) as usize,
        (range[0][1] - range[0][0] + 1) as usize,
    );

    for (y_ind, y) in (range[1][0]..=range[1][1]).enumerate() {
        for (x_ind, x) in (range[0][0]..=range[0][1]).enumerate() {
            grid[(y_ind, x_ind)] = bilinear(level, center + Vector2d::new(x as f64, y as f64));
        }
    }
}

/// Returns closed range of integer steps that can be taken without going outside
/// the image borders. Returns None if the center point is outside the level
/// boundaries.
fn integration_range(level: &Image, center: Vector2d, r: usize, padding: i16) -> Option<Range> {
    let r = r as i16;
    let mut range = [[0, 0], [0, 0]];
    for i in 0..2 {
        let s = level.size(i);
        if !(center[i] >= 0. && center[i] <= (s - 1) as f64) {
            return None;
        }
        let n = center[i] as i16;
        let fract = if center[i].fract() > 0. { 1 } else { 0 };
        range[i] = [
            i16::max(-r, -n + padding),
            i16::min(r, s as i16 - n - padding - 1 - fract),
        ];
        if range[i][0] > range[i][1] {
            return None;
        }
    }
    Some(range)
}
