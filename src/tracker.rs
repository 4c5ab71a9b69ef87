use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::config::*;
use crate::detector::FeatureDetector;
use crate::error::{FlowError, Result};
use crate::feature::PointSet;
use crate::frame::Frame;
use crate::image::ColorImage;
use crate::optical_flow::FlowEstimator;
use crate::sink::FrameSink;
use crate::source::FrameSource;
use crate::velocity::{frame_mean, SmoothedVelocity, VelocityFilter};
use crate::visualization::{Overlay, Renderer};

/// Shared flag that stops a running loop before its next frame.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of one frame transition.
#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub frame_index: usize,
    /// points handed to the flow estimator
    pub tracked: usize,
    pub valid: usize,
    /// the point set was re-detected during this step
    pub refreshed: bool,
    /// detector calls made during this step, 2 when an empty set is
    /// re-detected on a refresh frame
    pub detections: usize,
    pub velocity: SmoothedVelocity,
}

pub trait StepObserver {
    fn observe(&mut self, report: &StepReport, annotated: &ColorImage) -> Result<()>;
}

pub struct StepOutput {
    pub annotated: ColorImage,
    pub next_points: PointSet,
    pub report: StepReport,
    /// condition hit on this step, the run aborts unless it is recoverable
    pub condition: Option<FlowError>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunStats {
    pub frames_in: usize,
    pub frames_out: usize,
    /// detector calls, including the one seeding frame 0
    pub detections: usize,
    pub no_feature_frames: usize,
    pub all_invalid_frames: usize,
    pub valid_samples: usize,
    pub final_velocity: SmoothedVelocity,
    pub cancelled: bool,
}

/// Follows features from frame to frame and keeps the smoothed global
/// velocity. Owns every piece of per-run state.
pub struct Tracker {
    config: Config,
    detector: Box<dyn FeatureDetector>,
    optical_flow: Box<dyn FlowEstimator>,
    renderer: Box<dyn Renderer>,
    observers: Vec<Box<dyn StepObserver>>,
    velocity: VelocityFilter,
}

impl Tracker {
    pub fn new(
        config: Config,
        detector: Box<dyn FeatureDetector>,
        optical_flow: Box<dyn FlowEstimator>,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self> {
        config.validate()?;
        let velocity = VelocityFilter::new(config.alpha, config.empty_frame_policy);
        Ok(Self {
            config,
            detector,
            optical_flow,
            renderer,
            observers: vec![],
            velocity,
        })
    }

    pub fn with_observer(mut self, observer: Box<dyn StepObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn velocity(&self) -> SmoothedVelocity {
        self.velocity.state()
    }

    /// Track `prev_points` from `prev_frame` into `curr_frame`, update the
    /// velocity estimate and annotate `curr_frame`.
    pub fn advance(
        &mut self,
        prev_frame: &Frame,
        curr_frame: &Frame,
        prev_points: PointSet,
    ) -> Result<StepOutput> {
        let frame_index = curr_frame.index;
        let mut detections = 0;

        // flow over an empty set is undefined, look for new points first
        let prev_points = if prev_points.is_empty() {
            detections += 1;
            let points = self.detector.detect(prev_frame.gray())?;
            debug!(
                frame = frame_index,
                count = points.len(),
                "point set ran empty, re-detected"
            );
            points
        } else {
            prev_points
        };

        let mut condition = None;
        let (samples, raw_points, valid_points) = if prev_points.is_empty() {
            condition = Some(FlowError::NoFeaturesDetected {
                frame: prev_frame.index,
            });
            (vec![], PointSet::empty(), PointSet::empty())
        } else {
            let flow = self.optical_flow.estimate(
                &prev_frame.pyramid_frame,
                &curr_frame.pyramid_frame,
                prev_points.as_slice(),
            )?;
            let samples = flow.velocity_samples(&prev_points)?;
            if samples.is_empty() {
                condition = Some(FlowError::AllPointsInvalid {
                    frame: frame_index,
                    tracked: prev_points.len(),
                });
            }
            (samples, flow.raw_points(), flow.valid_points())
        };

        let velocity = self.velocity.update(frame_mean(&samples));

        let overlay = Overlay {
            frame_index,
            velocity,
            points: valid_points.as_slice(),
            tracked: prev_points.len(),
            valid: samples.len(),
        };
        let annotated = self.renderer.render(&curr_frame.color, &overlay)?;

        let mut next_points = match self.config.carry_policy {
            CarryPolicy::Raw => raw_points,
            CarryPolicy::DropInvalid => valid_points,
        };
        if frame_index % self.config.detect_interval == 0 {
            let source = match self.config.redetect_on {
                RedetectOn::Previous => prev_frame,
                RedetectOn::Current => curr_frame,
            };
            next_points = self.detector.detect(source.gray())?;
            detections += 1;
            debug!(
                frame = frame_index,
                source = source.index,
                count = next_points.len(),
                "refreshed features"
            );
        }

        debug!(
            frame = frame_index,
            tracked = prev_points.len(),
            valid = samples.len(),
            mean_u = velocity.mean_u,
            mean_v = velocity.mean_v,
        );

        Ok(StepOutput {
            annotated,
            next_points,
            report: StepReport {
                frame_index,
                tracked: prev_points.len(),
                valid: samples.len(),
                refreshed: detections > 0,
                detections,
                velocity,
            },
            condition,
        })
    }

    /// Process every frame of `source` and stream one annotated frame per
    /// transition into `sink`. Frame 0 only seeds the point set.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
    ) -> Result<RunStats> {
        let frame_count = source.frame_count();
        let lk_levels = self.config.max_pyramid_level;
        let mut stats = RunStats {
            frames_in: frame_count,
            ..RunStats::default()
        };
        info!(frame_count, "start tracking");

        if frame_count == 0 {
            sink.finish()?;
            return Ok(stats);
        }

        let mut prev_frame = Frame::new(0, source.get_frame(0)?, lk_levels, None)?;
        let mut points = self.detector.detect(prev_frame.gray())?;
        stats.detections += 1;
        if points.is_empty() {
            warn!("{}", FlowError::NoFeaturesDetected { frame: 0 });
        }
        let mut unused_frame = None;

        for index in 1..frame_count {
            if cancel.is_cancelled() {
                warn!(frame = index, "tracking cancelled");
                stats.cancelled = true;
                break;
            }

            let color = source.get_frame(index)?;
            let curr_frame = Frame::new(index, color, lk_levels, unused_frame.take())?;
            let mut step = self.advance(&prev_frame, &curr_frame, points)?;

            if let Some(condition) = step.condition.take() {
                if !condition.is_recoverable() {
                    return Err(condition);
                }
                warn!("{condition}");
                match condition {
                    FlowError::NoFeaturesDetected { .. } => stats.no_feature_frames += 1,
                    FlowError::AllPointsInvalid { .. } => stats.all_invalid_frames += 1,
                    _ => {}
                }
            }
            stats.detections += step.report.detections;
            stats.valid_samples += step.report.valid;

            for observer in self.observers.iter_mut() {
                observer.observe(&step.report, &step.annotated)?;
            }
            sink.write(step.annotated)?;
            stats.frames_out += 1;

            points = step.next_points;
            unused_frame = Some(std::mem::replace(&mut prev_frame, curr_frame));
            Span::current().pb_inc(1);
        }

        sink.finish()?;
        stats.final_velocity = self.velocity.state();
        info!(
            frames_out = stats.frames_out,
            detections = stats.detections,
            mean_u = stats.final_velocity.mean_u,
            mean_v = stats.final_velocity.mean_v,
            "done tracking"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::feature::{FlowMatch, FlowResult};
    use crate::frame::PyramidFrame;
    use crate::image::Image;
    use crate::my_types::*;
    use crate::sink::MemorySink;
    use crate::source::MemorySource;

    /// Returns a fixed point set and remembers the top-left pixel of every
    /// image it was asked about, which identifies the frame.
    struct FixedDetector {
        points: Vec<Vector2d>,
        seen: Rc<RefCell<Vec<u8>>>,
    }

    impl FeatureDetector for FixedDetector {
        fn detect(&mut self, image: &Image) -> Result<PointSet> {
            self.seen.borrow_mut().push(image.value(0, 0));
            Ok(PointSet::new(self.points.clone()))
        }
    }

    /// Moves every point by `shift`. Only the first `valid_calls` calls
    /// report matches, and within a call only indices accepted by `keep`.
    struct ShiftFlow {
        shift: Vector2d,
        valid_calls: usize,
        keep: fn(usize) -> bool,
        calls: Rc<Cell<usize>>,
    }

    impl FlowEstimator for ShiftFlow {
        fn estimate(
            &mut self,
            _frame0: &PyramidFrame,
            _frame1: &PyramidFrame,
            points: &[Vector2d],
        ) -> Result<FlowResult> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            let matches = points
                .iter()
                .enumerate()
                .map(|(i, p)| FlowMatch {
                    point: p + self.shift,
                    valid: call < self.valid_calls && (self.keep)(i),
                    error: 0.,
                })
                .collect();
            FlowResult::new(points.len(), matches)
        }
    }

    struct ShortFlow;

    impl FlowEstimator for ShortFlow {
        fn estimate(
            &mut self,
            _frame0: &PyramidFrame,
            _frame1: &PyramidFrame,
            _points: &[Vector2d],
        ) -> Result<FlowResult> {
            FlowResult::new(0, vec![])
        }
    }

    struct RecordingRenderer {
        velocities: Rc<RefCell<Vec<SmoothedVelocity>>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, frame: &ColorImage, overlay: &Overlay) -> Result<ColorImage> {
            self.velocities.borrow_mut().push(overlay.velocity);
            Ok(frame.clone())
        }
    }

    struct CountingObserver(Rc<Cell<usize>>);

    impl StepObserver for CountingObserver {
        fn observe(&mut self, _report: &StepReport, _annotated: &ColorImage) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    /// Frame k is a flat image of value 10 * k
    fn numbered_frames(count: usize) -> MemorySource {
        MemorySource::new(
            (0..count)
                .map(|k| {
                    let v = (10 * k) as u8;
                    ColorImage::filled(16, 16, [v, v, v])
                })
                .collect(),
        )
    }

    fn four_points() -> Vec<Vector2d> {
        vec![
            Vector2d::new(2., 2.),
            Vector2d::new(10., 2.),
            Vector2d::new(2., 10.),
            Vector2d::new(10., 10.),
        ]
    }

    struct Harness {
        tracker: Tracker,
        seen: Rc<RefCell<Vec<u8>>>,
        velocities: Rc<RefCell<Vec<SmoothedVelocity>>>,
        calls: Rc<Cell<usize>>,
    }

    fn harness(config: Config, points: Vec<Vector2d>, flow: ShiftFlow) -> Harness {
        let seen = Rc::new(RefCell::new(vec![]));
        let velocities = Rc::new(RefCell::new(vec![]));
        let calls = flow.calls.clone();
        let tracker = Tracker::new(
            config,
            Box::new(FixedDetector {
                points,
                seen: seen.clone(),
            }),
            Box::new(flow),
            Box::new(RecordingRenderer {
                velocities: velocities.clone(),
            }),
        )
        .unwrap();
        Harness {
            tracker,
            seen,
            velocities,
            calls,
        }
    }

    fn shift_flow(u: f64, v: f64) -> ShiftFlow {
        ShiftFlow {
            shift: Vector2d::new(u, v),
            valid_calls: usize::MAX,
            keep: |_| true,
            calls: Rc::new(Cell::new(0)),
        }
    }

    #[test]
    fn test_one_output_per_transition() {
        for (count, expected) in [(7, 6), (2, 1), (1, 0), (0, 0)] {
            let mut h = harness(Config::default(), four_points(), shift_flow(1., 0.));
            let mut sink = MemorySink::default();
            let stats = h
                .tracker
                .run(&mut numbered_frames(count), &mut sink, &CancelToken::new())
                .unwrap();
            assert_eq!(sink.frames.len(), expected);
            assert_eq!(stats.frames_out, expected);
            assert!(sink.finished);
        }
    }

    #[test]
    fn test_frame_zero_is_never_emitted() {
        let mut h = harness(Config::default(), four_points(), shift_flow(1., 0.));
        let mut sink = MemorySink::default();
        h.tracker
            .run(&mut numbered_frames(4), &mut sink, &CancelToken::new())
            .unwrap();
        let firsts: Vec<u8> = sink.frames.iter().map(|f| f.data[0]).collect();
        assert_eq!(firsts, vec![10, 20, 30]);
    }

    #[test]
    fn test_velocity_follows_recurrence() {
        let mut h = harness(Config::default(), four_points(), shift_flow(1., -0.5));
        let mut sink = MemorySink::default();
        h.tracker
            .run(&mut numbered_frames(4), &mut sink, &CancelToken::new())
            .unwrap();
        let velocities = h.velocities.borrow();
        assert_eq!(velocities.len(), 3);
        let (mut u, mut v) = (0., 0.);
        for state in velocities.iter() {
            u = 0.97 * u + 0.03 * 1.;
            v = 0.97 * v + 0.03 * -0.5;
            assert!((state.mean_u - u).abs() < 1e-12);
            assert!((state.mean_v - v).abs() < 1e-12);
        }
        assert!((velocities[0].mean_u - 0.03).abs() < 1e-12);
        assert!((velocities[1].mean_u - 0.0591).abs() < 1e-12);
        assert_eq!(h.tracker.velocity(), velocities[2]);
    }

    #[test]
    fn test_all_points_invalid_with_hold() {
        let config = Config {
            alpha: 0.5,
            ..Config::default()
        };
        let flow = ShiftFlow {
            valid_calls: 1,
            ..shift_flow(2., 0.)
        };
        let mut h = harness(config, four_points(), flow);
        let mut sink = MemorySink::default();
        let stats = h
            .tracker
            .run(&mut numbered_frames(5), &mut sink, &CancelToken::new())
            .unwrap();
        assert_eq!(stats.all_invalid_frames, 3);
        let us: Vec<f64> = h.velocities.borrow().iter().map(|s| s.mean_u).collect();
        assert_eq!(us, vec![1., 1., 1., 1.]);
    }

    #[test]
    fn test_all_points_invalid_with_decay() {
        let config = Config {
            alpha: 0.5,
            empty_frame_policy: EmptyFramePolicy::Decay,
            ..Config::default()
        };
        let flow = ShiftFlow {
            valid_calls: 1,
            ..shift_flow(2., 0.)
        };
        let mut h = harness(config, four_points(), flow);
        let mut sink = MemorySink::default();
        h.tracker
            .run(&mut numbered_frames(5), &mut sink, &CancelToken::new())
            .unwrap();
        let us: Vec<f64> = h.velocities.borrow().iter().map(|s| s.mean_u).collect();
        assert_eq!(us, vec![1., 0.5, 0.25, 0.125]);
    }

    #[test]
    fn test_empty_detector_is_tolerated() {
        let mut h = harness(Config::default(), vec![], shift_flow(1., 1.));
        let mut sink = MemorySink::default();
        let stats = h
            .tracker
            .run(&mut numbered_frames(8), &mut sink, &CancelToken::new())
            .unwrap();
        assert_eq!(stats.frames_out, 7);
        assert_eq!(stats.no_feature_frames, 7);
        assert_eq!(h.calls.get(), 0);
        assert!(h
            .velocities
            .borrow()
            .iter()
            .all(|s| s.mean_u == 0. && s.mean_v == 0.));
    }

    #[test]
    fn test_empty_point_set_is_redetected_before_flow() {
        let mut h = harness(Config::default(), four_points(), shift_flow(1., 0.));
        let mut source = numbered_frames(3);
        let prev = Frame::new(1, source.get_frame(1).unwrap(), 2, None).unwrap();
        let curr = Frame::new(2, source.get_frame(2).unwrap(), 2, None).unwrap();
        let step = h.tracker.advance(&prev, &curr, PointSet::empty()).unwrap();
        assert!(step.report.refreshed);
        assert_eq!(step.report.tracked, 4);
        assert_eq!(step.report.valid, 4);
        assert!(step.condition.is_none());
        assert_eq!(*h.seen.borrow(), vec![10]);
        assert_eq!(h.calls.get(), 1);
    }

    #[test]
    fn test_refresh_replaces_point_set() {
        let detected = vec![Vector2d::new(3., 3.); 3];
        let mut h = harness(Config::default(), detected, shift_flow(1., 0.));
        let mut source = numbered_frames(6);
        let frames: Vec<Frame> = (0..6)
            .map(|k| Frame::new(k, source.get_frame(k).unwrap(), 2, None).unwrap())
            .collect();
        let five = PointSet::new(vec![Vector2d::new(8., 8.); 5]);

        let step = h.tracker.advance(&frames[3], &frames[4], five.clone()).unwrap();
        assert!(!step.report.refreshed);
        assert_eq!(step.next_points.len(), 5);

        let step = h.tracker.advance(&frames[4], &frames[5], five).unwrap();
        assert!(step.report.refreshed);
        assert_eq!(step.next_points.len(), 3);
        assert_eq!(step.report.tracked, 5);
    }

    #[test]
    fn test_refresh_to_nothing_is_valid() {
        let mut h = harness(Config::default(), vec![], shift_flow(1., 0.));
        let mut source = numbered_frames(6);
        let prev = Frame::new(4, source.get_frame(4).unwrap(), 2, None).unwrap();
        let curr = Frame::new(5, source.get_frame(5).unwrap(), 2, None).unwrap();
        let step = h
            .tracker
            .advance(&prev, &curr, PointSet::new(four_points()))
            .unwrap();
        assert_eq!(step.report.valid, 4);
        assert!(step.next_points.is_empty());
    }

    #[test]
    fn test_redetect_uses_previous_frame_by_default() {
        let mut h = harness(Config::default(), four_points(), shift_flow(1., 0.));
        h.tracker
            .run(&mut numbered_frames(11), &mut MemorySink::default(), &CancelToken::new())
            .unwrap();
        // frame 0 seeds, steps 5 and 10 refresh from frames 4 and 9
        assert_eq!(*h.seen.borrow(), vec![0, 40, 90]);
    }

    #[test]
    fn test_redetect_on_current_frame() {
        let config = Config {
            redetect_on: RedetectOn::Current,
            ..Config::default()
        };
        let mut h = harness(config, four_points(), shift_flow(1., 0.));
        let stats = h
            .tracker
            .run(&mut numbered_frames(11), &mut MemorySink::default(), &CancelToken::new())
            .unwrap();
        assert_eq!(*h.seen.borrow(), vec![0, 50, 100]);
        assert_eq!(stats.detections, 3);
    }

    #[test]
    fn test_carry_policy() {
        let mut results = vec![];
        for policy in [CarryPolicy::Raw, CarryPolicy::DropInvalid] {
            let config = Config {
                carry_policy: policy,
                ..Config::default()
            };
            let flow = ShiftFlow {
                keep: |i| i % 2 == 0,
                ..shift_flow(1., 0.)
            };
            let mut h = harness(config, four_points(), flow);
            let mut source = numbered_frames(3);
            let prev = Frame::new(1, source.get_frame(1).unwrap(), 2, None).unwrap();
            let curr = Frame::new(2, source.get_frame(2).unwrap(), 2, None).unwrap();
            let step = h
                .tracker
                .advance(&prev, &curr, PointSet::new(four_points()))
                .unwrap();
            assert_eq!(step.report.valid, 2);
            results.push(step.next_points);
        }
        assert_eq!(results[0].len(), 4);
        assert_eq!(results[1].len(), 2);
        assert_eq!(results[1].as_slice()[1], Vector2d::new(3., 10.));
    }

    #[test]
    fn test_cancel_stops_before_next_frame() {
        let mut h = harness(Config::default(), four_points(), shift_flow(1., 0.));
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut sink = MemorySink::default();
        let stats = h
            .tracker
            .run(&mut numbered_frames(5), &mut sink, &cancel)
            .unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.frames_out, 0);
        assert!(sink.frames.is_empty());
        assert!(sink.finished);
    }

    struct CancelAt {
        frame_index: usize,
        token: CancelToken,
    }

    impl StepObserver for CancelAt {
        fn observe(&mut self, report: &StepReport, _annotated: &ColorImage) -> Result<()> {
            if report.frame_index == self.frame_index {
                self.token.cancel();
            }
            Ok(())
        }
    }

    #[test]
    fn test_cancel_mid_run_keeps_emitted_frames() {
        let cancel = CancelToken::new();
        let h = harness(Config::default(), four_points(), shift_flow(1., 0.));
        let mut tracker = h.tracker.with_observer(Box::new(CancelAt {
            frame_index: 3,
            token: cancel.clone(),
        }));
        let mut sink = MemorySink::default();
        let stats = tracker
            .run(&mut numbered_frames(10), &mut sink, &cancel)
            .unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.frames_out, 3);
        assert_eq!(sink.frames.len(), 3);
        assert!(sink.finished);
        assert_eq!(stats.final_velocity, tracker.velocity());
    }

    #[test]
    fn test_empty_set_on_refresh_frame_counts_both_detections() {
        let mut h = harness(Config::default(), vec![], shift_flow(1., 0.));
        let mut source = numbered_frames(6);
        let prev = Frame::new(4, source.get_frame(4).unwrap(), 2, None).unwrap();
        let curr = Frame::new(5, source.get_frame(5).unwrap(), 2, None).unwrap();
        let step = h.tracker.advance(&prev, &curr, PointSet::empty()).unwrap();
        assert!(step.report.refreshed);
        assert_eq!(step.report.detections, 2);
        assert_eq!(*h.seen.borrow(), vec![40, 40]);

        let mut h = harness(Config::default(), vec![], shift_flow(1., 0.));
        let stats = h
            .tracker
            .run(&mut numbered_frames(6), &mut MemorySink::default(), &CancelToken::new())
            .unwrap();
        // seed, one empty re-detect per step, one extra refresh at frame 5
        assert_eq!(stats.detections, 1 + 5 + 1);
        assert_eq!(stats.detections, h.seen.borrow().len());
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let mut tracker = Tracker::new(
            Config::default(),
            Box::new(FixedDetector {
                points: four_points(),
                seen: Rc::new(RefCell::new(vec![])),
            }),
            Box::new(ShortFlow),
            Box::new(RecordingRenderer {
                velocities: Rc::new(RefCell::new(vec![])),
            }),
        )
        .unwrap();
        let result = tracker.run(
            &mut numbered_frames(3),
            &mut MemorySink::default(),
            &CancelToken::new(),
        );
        match result {
            Err(FlowError::LengthMismatch { expected: 4, got: 0 }) => {}
            other => panic!("unexpected {:?}", other.map(|s| s.frames_out)),
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            detect_interval: 0,
            ..Config::default()
        };
        let result = Tracker::new(
            config,
            Box::new(FixedDetector {
                points: vec![],
                seen: Rc::new(RefCell::new(vec![])),
            }),
            Box::new(shift_flow(0., 0.)),
            Box::new(RecordingRenderer {
                velocities: Rc::new(RefCell::new(vec![])),
            }),
        );
        assert!(matches!(result, Err(FlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_observers_see_every_step() {
        let count = Rc::new(Cell::new(0));
        let h = harness(Config::default(), four_points(), shift_flow(1., 0.));
        let mut tracker = h
            .tracker
            .with_observer(Box::new(CountingObserver(count.clone())));
        tracker
            .run(&mut numbered_frames(6), &mut MemorySink::default(), &CancelToken::new())
            .unwrap();
        assert_eq!(count.get(), 5);
    }
}
