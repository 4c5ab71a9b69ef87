use serde::Serialize;

use crate::config::EmptyFramePolicy;
use crate::my_types::*;

/// Exponentially smoothed global velocity, in pixels per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SmoothedVelocity {
    pub mean_u: f64,
    pub mean_v: f64,
}

/// Mean displacement of one frame, None when nothing was matched
pub fn frame_mean(samples: &[Vector2d]) -> Option<Vector2d> {
    if samples.is_empty() {
        return None;
    }
    let sum = samples.iter().fold(Vector2d::zeros(), |acc, s| acc + s);
    Some(sum / samples.len() as f64)
}

/// Scalar recurrence `s = alpha * s + (1 - alpha) * x`, applied to u and v
/// independently of how many points produced `x`.
#[derive(Debug)]
pub struct VelocityFilter {
    alpha: f64,
    policy: EmptyFramePolicy,
    state: SmoothedVelocity,
}

impl VelocityFilter {
    pub fn new(alpha: f64, policy: EmptyFramePolicy) -> Self {
        Self {
            alpha,
            policy,
            state: SmoothedVelocity::default(),
        }
    }

    pub fn state(&self) -> SmoothedVelocity {
        self.state
    }

    pub fn update(&mut self, frame_mean: Option<Vector2d>) -> SmoothedVelocity {
        let x = match (frame_mean, self.policy) {
            (Some(x), _) if x.x.is_finite() && x.y.is_finite() => x,
            (_, EmptyFramePolicy::Hold) => return self.state,
            (_, EmptyFramePolicy::Decay) => Vector2d::zeros(),
        };
        self.state.mean_u = self.alpha * self.state.mean_u + (1. - self.alpha) * x.x;
        self.state.mean_v = self.alpha * self.state.mean_v + (1. - self.alpha) * x.y;
        self.state
    }
}
