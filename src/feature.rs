use crate::error::{FlowError, Result};
use crate::my_types::*;

/// Ordered set of tracked feature positions, in pixels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointSet {
    points: Vec<Vector2d>,
}

impl PointSet {
    pub fn new(points: Vec<Vector2d>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[Vector2d] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vector2d> {
        self.points.iter()
    }
}

impl From<Vec<Vector2d>> for PointSet {
    fn from(points: Vec<Vector2d>) -> Self {
        Self::new(points)
    }
}

/// Where one input point ended up in the next frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowMatch {
    pub point: Vector2d,
    pub valid: bool,
    /// mean absolute intensity difference over the tracking window
    pub error: f64,
}

impl FlowMatch {
    pub fn lost(point: Vector2d) -> Self {
        Self {
            point,
            valid: false,
            error: f64::INFINITY,
        }
    }
}

/// Per-point outcome of one flow estimation, parallel to the input points.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowResult {
    matches: Vec<FlowMatch>,
}

impl FlowResult {
    /// `matches` must hold exactly one entry per input point.
    pub fn new(input_len: usize, matches: Vec<FlowMatch>) -> Result<Self> {
        if matches.len() != input_len {
            return Err(FlowError::LengthMismatch {
                expected: input_len,
                got: matches.len(),
            });
        }
        Ok(Self { matches })
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn matches(&self) -> &[FlowMatch] {
        &self.matches
    }

    pub fn valid_count(&self) -> usize {
        self.matches.iter().filter(|m| m.valid).count()
    }

    /// Displacement of every valid match relative to its input point.
    pub fn velocity_samples(&self, previous: &PointSet) -> Result<Vec<Vector2d>> {
        if previous.len() != self.matches.len() {
            return Err(FlowError::LengthMismatch {
                expected: previous.len(),
                got: self.matches.len(),
            });
        }
        Ok(previous
            .iter()
            .zip(self.matches.iter())
            .filter(|(_, m)| m.valid)
            .map(|(p0, m)| m.point - p0)
            .collect())
    }

    /// Every estimated point, lost ones included
    pub fn raw_points(&self) -> PointSet {
        self.matches.iter().map(|m| m.point).collect::<Vec<_>>().into()
    }

    pub fn valid_points(&self) -> PointSet {
        self.matches
            .iter()
            .filter(|m| m.valid)
            .map(|m| m.point)
            .collect::<Vec<_>>()
            .into()
    }
}
