use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context as AnyhowContext, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Which frame feeds the periodic feature refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedetectOn {
    /// Detect on the frame the step started from. Reproduces the reference
    /// pipeline, where the refreshed points are one frame stale.
    Previous,
    /// Detect on the frame the step just tracked into.
    Current,
}

/// What survives from one flow estimate into the next step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CarryPolicy {
    /// Every estimated point, including the ones flagged invalid.
    Raw,
    /// Only the points the estimator matched.
    DropInvalid,
}

/// How the velocity filter reacts to a frame without a single valid match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyFramePolicy {
    /// Skip the update.
    Hold,
    /// Feed a zero displacement.
    Decay,
}

impl fmt::Display for RedetectOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedetectOn::Previous => write!(f, "previous"),
            RedetectOn::Current => write!(f, "current"),
        }
    }
}

impl fmt::Display for CarryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarryPolicy::Raw => write!(f, "raw"),
            CarryPolicy::DropInvalid => write!(f, "drop-invalid"),
        }
    }
}

impl fmt::Display for EmptyFramePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyFramePolicy::Hold => write!(f, "hold"),
            EmptyFramePolicy::Decay => write!(f, "decay"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[derive(clap::Parser)]
#[serde(default)]
pub struct Config {
    /// Upper bound on detected corners, 0 keeps all of them
    #[clap(long, default_value = "0")]
    pub max_corners: usize,

    /// Minimum corner response relative to the strongest corner
    #[clap(long, default_value = "0.05")]
    pub quality_level: f64,

    /// Minimum pixel distance between two detected corners
    #[clap(long, default_value = "50")]
    pub min_distance: f64,

    /// Side of the window the corner response is summed over
    #[clap(long, default_value = "7")]
    pub block_size: usize,

    /// Side of the Lucas-Kanade integration window, must be odd
    #[clap(long, default_value = "15")]
    pub window_size: usize,

    /// Number of pyramid levels above the full resolution image
    #[clap(long, default_value = "2")]
    pub max_pyramid_level: usize,

    #[clap(long, default_value = "10")]
    pub convergence_iterations: usize,

    /// Lucas-Kanade stops once an update moves less than this many pixels
    #[clap(long, default_value = "0.03")]
    pub convergence_epsilon: f64,

    /// Points whose gradient matrix has a smaller mean eigenvalue are dropped
    #[clap(long, default_value = "0.0001")]
    pub min_eigen_threshold: f64,

    /// Weight of the previous velocity estimate
    #[clap(long, default_value = "0.97")]
    pub alpha: f64,

    /// Re-detect features every `detect_interval` frames
    #[clap(long, default_value = "5")]
    pub detect_interval: usize,

    #[clap(long, default_value = "5.0")]
    pub arrow_scale: f64,

    #[clap(long, default_value = "100")]
    pub arrow_anchor_x: i32,

    #[clap(long, default_value = "100")]
    pub arrow_anchor_y: i32,

    /// Frame rate of the encoded output
    #[clap(long, default_value = "24.0")]
    pub fps: f64,

    /// Frames buffered between tracking and encoding, 0 encodes inline
    #[clap(long, default_value = "8")]
    pub queue_depth: usize,

    #[clap(long, value_enum, default_value_t = RedetectOn::Previous)]
    pub redetect_on: RedetectOn,

    #[clap(long, value_enum, default_value_t = CarryPolicy::Raw)]
    pub carry_policy: CarryPolicy,

    #[clap(long, value_enum, default_value_t = EmptyFramePolicy::Hold)]
    pub empty_frame_policy: EmptyFramePolicy,

    /// Seed of the synthetic video noise
    #[clap(long, default_value = "0")]
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_corners: 0,
            quality_level: 0.05,
            min_distance: 50.,
            block_size: 7,
            window_size: 15,
            max_pyramid_level: 2,
            convergence_iterations: 10,
            convergence_epsilon: 0.03,
            min_eigen_threshold: 1e-4,
            alpha: 0.97,
            detect_interval: 5,
            arrow_scale: 5.,
            arrow_anchor_x: 100,
            arrow_anchor_y: 100,
            fps: 24.,
            queue_depth: 8,
            redetect_on: RedetectOn::Previous,
            carry_policy: CarryPolicy::Raw,
            empty_frame_policy: EmptyFramePolicy::Hold,
            seed: 0,
        }
    }
}

impl Config {
    /// Load a config from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Config> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), FlowError> {
        let invalid = |msg: String| Err(FlowError::InvalidConfig(msg));
        if !(0. ..=1.).contains(&self.alpha) {
            return invalid(format!("alpha must lie in [0, 1], got {}", self.alpha));
        }
        if self.detect_interval == 0 {
            return invalid("detect_interval must be positive".into());
        }
        if self.window_size == 0 || self.window_size % 2 == 0 {
            return invalid(format!("window_size must be odd, got {}", self.window_size));
        }
        if self.block_size < 3 {
            return invalid(format!("block_size must be at least 3, got {}", self.block_size));
        }
        if !(self.quality_level > 0. && self.quality_level <= 1.) {
            return invalid(format!(
                "quality_level must lie in (0, 1], got {}",
                self.quality_level
            ));
        }
        if self.min_distance < 0. {
            return invalid(format!("min_distance must not be negative, got {}", self.min_distance));
        }
        if self.convergence_iterations == 0 {
            return invalid("convergence_iterations must be positive".into());
        }
        if self.fps <= 0. {
            return invalid(format!("fps must be positive, got {}", self.fps));
        }
        Ok(())
    }

    pub fn arrow_anchor(&self) -> (i32, i32) {
        (self.arrow_anchor_x, self.arrow_anchor_y)
    }
}
