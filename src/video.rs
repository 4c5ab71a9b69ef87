use std::path::{Path, PathBuf};

use anyhow::{bail, Result as AnyResult};
use opencv as cv2;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoWriter};
use tracing::{debug, info};

use crate::error::{FlowError, Result};
use crate::image::ColorImage;
use crate::sink::FrameSink;
use crate::source::FrameSource;
use crate::visualization::color_to_cv_8uc3;

/// Frames decoded from a video file
pub struct VideoInput {
    capture: VideoCapture,
    frame_count: usize,
    next_index: usize,
    pub fps: f64,
}

impl VideoInput {
    pub fn new(path: &Path) -> AnyResult<Self> {
        info!("opening video {}", path.display());
        let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            bail!("failed to open video {}", path.display());
        }
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.) as usize;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        debug!(frame_count, fps, "video opened");
        Ok(Self {
            capture,
            frame_count,
            next_index: 0,
            fps,
        })
    }
}

impl FrameSource for VideoInput {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn get_frame(&mut self, index: usize) -> Result<ColorImage> {
        let decode_err = |reason: String| FlowError::Decode { index, reason };
        if index != self.next_index {
            self.capture
                .set(videoio::CAP_PROP_POS_FRAMES, index as f64)
                .map_err(|e| decode_err(e.to_string()))?;
        }
        let mut mat = cv2::core::Mat::default();
        let read = self
            .capture
            .read(&mut mat)
            .map_err(|e| decode_err(e.to_string()))?;
        let size = mat.size().map_err(|e| decode_err(e.to_string()))?;
        if !read || size.width <= 0 || size.height <= 0 {
            return Err(decode_err("no frame returned".into()));
        }
        self.next_index = index + 1;

        let bytes = mat.data_bytes().map_err(|e| decode_err(e.to_string()))?;
        ColorImage::from_interleaved(bytes, size.width as usize, size.height as usize)
            .map_err(|e| decode_err(e.to_string()))
    }
}

/// Encodes frames into an mp4 file. The writer is opened on the first
/// frame, which fixes the output resolution.
pub struct VideoOutput {
    path: PathBuf,
    fps: f64,
    writer: Option<VideoWriter>,
    size: (usize, usize),
    written: usize,
}

impl VideoOutput {
    pub fn new(path: &Path, fps: f64) -> Self {
        Self {
            path: path.to_path_buf(),
            fps,
            writer: None,
            size: (0, 0),
            written: 0,
        }
    }

    fn open(&mut self, width: usize, height: usize) -> Result<()> {
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v').map_err(encode_err)?;
        let writer = VideoWriter::new(
            &self.path.to_string_lossy(),
            fourcc,
            self.fps,
            cv2::core::Size::new(width as i32, height as i32),
            true,
        )
        .map_err(encode_err)?;
        if !writer.is_opened().map_err(encode_err)? {
            return Err(FlowError::Encode(format!(
                "cannot open {} for writing",
                self.path.display()
            )));
        }
        info!(width, height, fps = self.fps, "writing {}", self.path.display());
        self.writer = Some(writer);
        self.size = (width, height);
        Ok(())
    }
}

fn encode_err(e: cv2::Error) -> FlowError {
    FlowError::Encode(e.to_string())
}

impl FrameSink for VideoOutput {
    fn write(&mut self, frame: ColorImage) -> Result<()> {
        if self.writer.is_none() {
            self.open(frame.width, frame.height)?;
        }
        if (frame.width, frame.height) != self.size {
            return Err(FlowError::Encode(format!(
                "frame is {}x{}, output is {}x{}",
                frame.width, frame.height, self.size.0, self.size.1
            )));
        }
        let mat = color_to_cv_8uc3(&frame).map_err(encode_err)?;
        if let Some(writer) = self.writer.as_mut() {
            writer.write(&mat).map_err(encode_err)?;
        }
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.release().map_err(encode_err)?;
        }
        debug!(frames = self.written, "closed {}", self.path.display());
        Ok(())
    }
}

/// Read back every frame of a video, used to inspect written output
pub fn read_all(path: &Path) -> AnyResult<Vec<ColorImage>> {
    let mut input = VideoInput::new(path)?;
    let mut frames = vec![];
    loop {
        let mut mat = cv2::core::Mat::default();
        if !input.capture.read(&mut mat)? || mat.size()?.width <= 0 {
            break;
        }
        let size = mat.size()?;
        frames.push(ColorImage::from_interleaved(
            mat.data_bytes()?,
            size.width as usize,
            size.height as usize,
        )?);
    }
    Ok(frames)
}
