use std::path::Path;

use rerun::{RecordingStream, RecordingStreamBuilder};

use crate::config::Config;
use crate::error::{FlowError, Result};
use crate::image::ColorImage;
use crate::my_types::*;
use crate::tracker::{StepObserver, StepReport};
use crate::velocity::SmoothedVelocity;

/// What gets drawn on top of one frame.
#[derive(Clone, Debug)]
pub struct Overlay<'a> {
    pub frame_index: usize,
    pub velocity: SmoothedVelocity,
    /// points matched into this frame
    pub points: &'a [Vector2d],
    pub tracked: usize,
    pub valid: usize,
}

pub trait Renderer {
    fn render(&mut self, frame: &ColorImage, overlay: &Overlay) -> Result<ColorImage>;
}

/// Fixed placement of the overlay elements.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayLayout {
    pub anchor: (i32, i32),
    pub arrow_scale: f64,
    pub text_origin: (i32, i32),
    pub line_height: i32,
}

impl OverlayLayout {
    pub fn new(config: &Config) -> Self {
        Self {
            anchor: config.arrow_anchor(),
            arrow_scale: config.arrow_scale,
            text_origin: (10, 30),
            line_height: 30,
        }
    }

    /// Tip of the velocity arrow. Image rows grow downward, so v is flipped
    /// to make the arrow point the way the scene appears to move.
    pub fn arrow_endpoint(&self, velocity: &SmoothedVelocity) -> (i32, i32) {
        (
            self.anchor.0 + (self.arrow_scale * velocity.mean_u).round() as i32,
            self.anchor.1 - (self.arrow_scale * velocity.mean_v).round() as i32,
        )
    }

    /// Text lines with the bottom-left corner of each line
    pub fn text_lines(&self, overlay: &Overlay) -> Vec<((i32, i32), String)> {
        let lines = [
            format!("mean_u: {:.2} px/frame", overlay.velocity.mean_u),
            format!("mean_v: {:.2} px/frame", overlay.velocity.mean_v),
            format!("points: {}/{}", overlay.valid, overlay.tracked),
            format!("frame: {}", overlay.frame_index),
        ];
        lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                let y = self.text_origin.1 + i as i32 * self.line_height;
                ((self.text_origin.0, y), line)
            })
            .collect()
    }
}

#[cfg(feature = "opencv")]
pub use self::cv_render::*;

#[cfg(feature = "opencv")]
mod cv_render {
    use cv2::prelude::*;
    use opencv as cv2;

    use super::*;

    fn cv_err(e: cv2::Error) -> FlowError {
        FlowError::Visualization(e.to_string())
    }

    /// Deep copy of a BGR image into an owned `CV_8UC3` matrix
    pub fn color_to_cv_8uc3(img: &ColorImage) -> cv2::Result<cv2::core::Mat> {
        let view = unsafe {
            cv2::core::Mat::new_rows_cols_with_data(
                img.height as i32,
                img.width as i32,
                cv2::core::CV_8UC3,
                img.data.as_ptr() as *mut std::ffi::c_void,
                cv2::core::Mat_AUTO_STEP,
            )?
        };
        view.try_clone()
    }

    pub fn cv_8uc3_to_color(mat: &cv2::core::Mat) -> Result<ColorImage> {
        let size = mat.size().map_err(cv_err)?;
        let bytes = mat.data_bytes().map_err(cv_err)?;
        ColorImage::new(bytes.to_vec(), size.width as usize, size.height as usize)
    }

    /// Draws the overlay with OpenCV primitives
    pub struct CvRenderer {
        layout: OverlayLayout,
    }

    impl CvRenderer {
        pub fn new(config: &Config) -> Self {
            Self {
                layout: OverlayLayout::new(config),
            }
        }
    }

    impl Renderer for CvRenderer {
        fn render(&mut self, frame: &ColorImage, overlay: &Overlay) -> Result<ColorImage> {
            let mut color_mat = color_to_cv_8uc3(frame).map_err(cv_err)?;

            for point in overlay.points.iter() {
                let point_cv = cv2::core::Point {
                    x: point.x as i32,
                    y: point.y as i32,
                };
                cv2::imgproc::draw_marker(
                    &mut color_mat,
                    point_cv,
                    cv2::core::Scalar::new(0.0, 255.0, 0.0, 0.0),
                    cv2::imgproc::MARKER_CROSS,
                    8,
                    1,
                    cv2::imgproc::LINE_8,
                )
                .map_err(cv_err)?;
            }

            for ((x, y), line) in self.layout.text_lines(overlay) {
                cv2::imgproc::put_text(
                    &mut color_mat,
                    &line,
                    cv2::core::Point::new(x, y),
                    cv2::imgproc::FONT_HERSHEY_SIMPLEX,
                    0.7,
                    cv2::core::Scalar::new(255.0, 255.0, 255.0, 0.0),
                    2,
                    cv2::imgproc::LINE_8,
                    false,
                )
                .map_err(cv_err)?;
            }

            let (ax, ay) = self.layout.anchor;
            let (ex, ey) = self.layout.arrow_endpoint(&overlay.velocity);
            cv2::imgproc::arrowed_line(
                &mut color_mat,
                cv2::core::Point::new(ax, ay),
                cv2::core::Point::new(ex, ey),
                cv2::core::Scalar::new(0.0, 0.0, 255.0, 0.0),
                2,
                cv2::imgproc::LINE_8,
                0,
                0.2,
            )
            .map_err(cv_err)?;

            cv_8uc3_to_color(&color_mat)
        }
    }
}

fn vis_err<E: std::fmt::Display>(e: E) -> FlowError {
    FlowError::Visualization(e.to_string())
}

/// Streams annotated frames and the smoothed velocity into a rerun recording
pub struct Recorder {
    recorder: RecordingStream,
}

impl Recorder {
    pub fn save(path: &Path) -> anyhow::Result<Self> {
        let recorder = RecordingStreamBuilder::new("sparse_flow").save(path)?;
        Ok(Self { recorder })
    }
}

impl StepObserver for Recorder {
    fn observe(&mut self, report: &StepReport, annotated: &ColorImage) -> Result<()> {
        self.recorder
            .set_time_sequence("frame", report.frame_index as i64);
        let image = rerun::Image::try_from(annotated.to_rgb_array()?).map_err(vis_err)?;
        self.recorder
            .log("video/annotated", &image)
            .map_err(vis_err)?;
        self.recorder
            .log("velocity/mean_u", &rerun::Scalar::new(report.velocity.mean_u))
            .map_err(vis_err)?;
        self.recorder
            .log("velocity/mean_v", &rerun::Scalar::new(report.velocity.mean_v))
            .map_err(vis_err)?;
        self.recorder
            .log("points/valid", &rerun::Scalar::new(report.valid as f64))
            .map_err(vis_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_points_up_for_positive_v() {
        let layout = OverlayLayout::new(&Config::default());
        assert_eq!(layout.anchor, (100, 100));
        let tip = layout.arrow_endpoint(&SmoothedVelocity {
            mean_u: 2.,
            mean_v: 1.,
        });
        assert_eq!(tip, (110, 95));
        let tip = layout.arrow_endpoint(&SmoothedVelocity::default());
        assert_eq!(tip, layout.anchor);
    }

    #[test]
    fn test_text_lines_have_fixed_offsets() {
        let layout = OverlayLayout::new(&Config::default());
        let points = [Vector2d::new(1., 1.)];
        let overlay = Overlay {
            frame_index: 7,
            velocity: SmoothedVelocity {
                mean_u: 1.234,
                mean_v: -0.5,
            },
            points: &points,
            tracked: 4,
            valid: 1,
        };
        let lines = layout.text_lines(&overlay);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], ((10, 30), "mean_u: 1.23 px/frame".to_string()));
        assert_eq!(lines[1].0, (10, 60));
        assert_eq!(lines[2].1, "points: 1/4");
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_cv_renderer_keeps_shape() {
        let frame = ColorImage::filled(200, 150, [0, 0, 0]);
        let config = Config {
            arrow_anchor_x: 150,
            arrow_anchor_y: 140,
            ..Config::default()
        };
        let mut renderer = CvRenderer::new(&config);
        let overlay = Overlay {
            frame_index: 1,
            velocity: SmoothedVelocity {
                mean_u: 3.,
                mean_v: 0.,
            },
            points: &[],
            tracked: 0,
            valid: 0,
        };
        let annotated = renderer.render(&frame, &overlay).unwrap();
        assert_eq!((annotated.width, annotated.height), (200, 150));
        assert_ne!(annotated, frame);
        // arrow shaft drawn in red right of the anchor, below the text block
        assert_eq!(annotated.pixel(155, 140), [0, 0, 255]);
    }
}
