//! Per-move and per-segment numeric parameters.
//!
//! Moves arrive as absolute millimetre targets. The geometry model turns
//! each one into a direction, an acceleration limit and a nominal duration,
//! and turns every sub-segment produced by the splitter into a queued
//! [`Segment`] with step counts and squared-speed limits.

use crate::config::{AxisConstraints, Millimeters, Steps};
use crate::error::{MotionError, Result};

use super::linear::{SegmentData, SegmentState};

/// One linear move toward an absolute target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest<const AXES: usize> {
    /// Absolute target per axis in millimetres.
    pub target: [f32; AXES],
    /// Requested path speed in mm/s.
    pub feed_rate: f32,
    /// Optional path acceleration cap in mm/s².
    pub acceleration: Option<f32>,
}

impl<const AXES: usize> MoveRequest<AXES> {
    /// Move to `target` at `feed_rate` with the machine's acceleration limits.
    pub fn new(target: [f32; AXES], feed_rate: f32) -> Self {
        Self {
            target,
            feed_rate,
            acceleration: None,
        }
    }

    /// Cap the path acceleration of this move.
    pub fn with_acceleration(mut self, acceleration: f32) -> Self {
        self.acceleration = Some(acceleration);
        self
    }

    /// Check that every number is usable.
    pub fn validate(&self) -> Result<()> {
        if let Some(axis) = self.target.iter().position(|t| !t.is_finite()) {
            return Err(MotionError::InvalidTarget { axis }.into());
        }
        if !(self.feed_rate > 0.0 && self.feed_rate.is_finite()) {
            return Err(MotionError::InvalidFeedRate(self.feed_rate).into());
        }
        if let Some(a) = self.acceleration {
            if !(a > 0.0 && a.is_finite()) {
                return Err(MotionError::InvalidAcceleration(a).into());
            }
        }
        Ok(())
    }
}

/// Resolved parameters of a move being split.
#[derive(Debug, Clone, Copy)]
pub struct MoveGeometry<const AXES: usize> {
    /// Start position in millimetres.
    pub start: [f32; AXES],
    /// Target position in millimetres.
    pub end: [f32; AXES],
    /// Signed travel per axis in millimetres.
    pub delta: [f32; AXES],
    /// Euclidean length in millimetres.
    pub distance: f32,
    /// Signed direction cosines.
    pub unit: [f32; AXES],
    /// Path acceleration limit in mm/s².
    pub accel: f32,
    /// Shortest time the whole move may take at the feed rate, in seconds.
    pub base_max_v_rec: f32,
    /// Timer ticks per millimetre at the feed rate.
    pub time_freq_by_max_speed: f32,
}

/// A queued sub-segment of a move.
#[derive(Debug, Clone, Copy)]
pub struct Segment<const AXES: usize> {
    /// Planner limits.
    pub data: SegmentData,
    /// Planner scratch.
    pub state: SegmentState,
    /// Signed step count per axis.
    pub steps: [i64; AXES],
    /// Path length in millimetres.
    pub distance: f32,
}

impl<const AXES: usize> Default for Segment<AXES> {
    fn default() -> Self {
        Self {
            data: SegmentData::default(),
            state: SegmentState::default(),
            steps: [0; AXES],
            distance: 0.0,
        }
    }
}

/// Converts moves and split checkpoints into segments.
#[derive(Debug, Clone)]
pub struct SegmentGeometryModel<const AXES: usize> {
    axes: [AxisConstraints; AXES],
    junction_speed: f32,
    clock_frequency_hz: f32,
    planned_steps: [i64; AXES],
    last_unit: [f32; AXES],
}

impl<const AXES: usize> SegmentGeometryModel<AXES> {
    /// Create a model for the given axes.
    pub fn new(axes: [AxisConstraints; AXES], junction_speed: f32, clock_frequency_hz: u32) -> Self {
        Self {
            axes,
            junction_speed,
            clock_frequency_hz: clock_frequency_hz as f32,
            planned_steps: [0; AXES],
            last_unit: [0.0; AXES],
        }
    }

    /// Per-axis constraints.
    #[inline]
    pub fn axes(&self) -> &[AxisConstraints; AXES] {
        &self.axes
    }

    /// Absolute step position at the end of the last emitted segment.
    #[inline]
    pub fn planned_steps(&self) -> [i64; AXES] {
        self.planned_steps
    }

    /// Resynchronize with a known machine position, forgetting the last
    /// direction of travel.
    pub fn reset(&mut self, steps: [i64; AXES]) {
        self.planned_steps = steps;
        self.last_unit = [0.0; AXES];
    }

    /// Resolve a move starting at `start`. Returns `None` for a zero-length
    /// move.
    pub fn begin_move(&self, start: [f32; AXES], request: &MoveRequest<AXES>) -> Option<MoveGeometry<AXES>> {
        let mut delta = [0.0; AXES];
        let mut sum = 0.0;
        for i in 0..AXES {
            delta[i] = request.target[i] - start[i];
            sum += delta[i] * delta[i];
        }
        let distance = libm::sqrtf(sum);
        if distance <= 0.0 {
            return None;
        }

        let distance_rec = 1.0 / distance;
        let mut unit = [0.0; AXES];
        let mut accel_rec = request.acceleration.map_or(0.0, |a| 1.0 / a);
        for i in 0..AXES {
            unit[i] = delta[i] * distance_rec;
            accel_rec = accel_rec.max(libm::fabsf(unit[i]) * self.axes[i].max_accel_rec);
        }

        Some(MoveGeometry {
            start,
            end: request.target,
            delta,
            distance,
            unit,
            accel: 1.0 / accel_rec,
            base_max_v_rec: distance / request.feed_rate,
            time_freq_by_max_speed: self.clock_frequency_hz / request.feed_rate,
        })
    }

    /// Squared speed limit at the junction into a move.
    ///
    /// Each axis's velocity may jump by at most the junction speed, so the
    /// axis whose direction cosine changes most sets the limit. A reversal
    /// counts both cosines.
    pub fn junction_limit(&self, unit: &[f32; AXES]) -> f32 {
        let mut max_dm = 0.0f32;
        for i in 0..AXES {
            max_dm = max_dm.max(libm::fabsf(unit[i] - self.last_unit[i]));
        }
        if max_dm > 0.0 {
            let v = self.junction_speed / max_dm;
            v * v
        } else {
            f32::INFINITY
        }
    }

    /// Build the sub-segment of `mv` between `prev_frac` and `frac`.
    ///
    /// `prev_max_v` is the cruise limit of the preceding segment, zero when
    /// the machine is at rest. `first` marks the first sub-segment of the
    /// move, the only one with a junction limit.
    pub fn segment(
        &mut self,
        mv: &MoveGeometry<AXES>,
        prev_frac: f64,
        frac: f64,
        rel_max_v_rec: f32,
        prev_max_v: f32,
        first: bool,
    ) -> Segment<AXES> {
        let span = frac - prev_frac;
        let distance = (mv.distance as f64 * span) as f32;

        let mut steps = [0i64; AXES];
        let mut min_time = rel_max_v_rec;
        for i in 0..AXES {
            let axis = &self.axes[i];
            let target = if frac >= 1.0 {
                Steps::from_mm(Millimeters::new(mv.end[i]), axis.steps_per_mm).value()
            } else {
                let mm = mv.start[i] as f64 + mv.delta[i] as f64 * frac;
                libm::round(mm * axis.steps_per_mm as f64) as i64
            };
            steps[i] = target - self.planned_steps[i];
            self.planned_steps[i] = target;

            let axis_mm = (libm::fabs(mv.delta[i] as f64 * span)) as f32;
            min_time = min_time.max(axis_mm * axis.max_speed_rec);
        }

        let speed = distance / min_time;
        let max_v = speed * speed;
        let max_start_v = if first {
            let limit = self.junction_limit(&mv.unit);
            self.last_unit = mv.unit;
            limit
        } else {
            max_v
        };
        let a_x = 2.0 * mv.accel * distance;

        Segment {
            data: SegmentData::new(prev_max_v, max_start_v, max_v, a_x),
            state: SegmentState::default(),
            steps,
            distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{MmPerSec, MmPerSecSquared};
    use crate::config::AxisConfig;

    fn axis(max_speed: f32, max_accel: f32) -> AxisConstraints {
        AxisConstraints::from_config(&AxisConfig {
            steps_per_mm: 100.0,
            max_speed: MmPerSec(max_speed),
            max_acceleration: MmPerSecSquared(max_accel),
            invert_direction: false,
            enable_active_high: false,
            dir_setup_ticks: 1,
        })
    }

    fn model() -> SegmentGeometryModel<2> {
        SegmentGeometryModel::new([axis(100.0, 1000.0), axis(50.0, 500.0)], 5.0, 1_000_000)
    }

    #[test]
    fn test_request_validation() {
        assert!(MoveRequest::new([1.0, 2.0], 10.0).validate().is_ok());
        assert!(matches!(
            MoveRequest::new([1.0, f32::NAN], 10.0).validate(),
            Err(crate::Error::Motion(MotionError::InvalidTarget { axis: 1 }))
        ));
        assert!(MoveRequest::new([1.0, 2.0], 0.0).validate().is_err());
        assert!(MoveRequest::new([1.0, 2.0], 5.0)
            .with_acceleration(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_zero_length_move() {
        let m = model();
        assert!(m.begin_move([3.0, 4.0], &MoveRequest::new([3.0, 4.0], 10.0)).is_none());
    }

    #[test]
    fn test_acceleration_from_most_constrained_axis() {
        let m = model();
        let mv = m.begin_move([0.0, 0.0], &MoveRequest::new([3.0, 4.0], 10.0)).unwrap();
        assert!((mv.distance - 5.0).abs() < 1e-5);
        // X allows 1000 / 0.6, Y allows 500 / 0.8 = 625.
        assert!((mv.accel - 625.0).abs() < 0.01);
        assert!((mv.base_max_v_rec - 0.5).abs() < 1e-6);
        assert!((mv.time_freq_by_max_speed - 100_000.0).abs() < 0.5);

        let capped = m
            .begin_move([0.0, 0.0], &MoveRequest::new([3.0, 4.0], 10.0).with_acceleration(100.0))
            .unwrap();
        assert!((capped.accel - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_segment_steps_sum_to_delta() {
        let mut m = model();
        let mv = m.begin_move([0.0, 0.0], &MoveRequest::new([1.0, -0.333], 10.0)).unwrap();

        let mut total = [0i64; 2];
        let mut prev = 0.0;
        for k in 1..=3 {
            let frac = if k == 3 { 1.0 } else { k as f64 / 3.0 };
            let seg = m.segment(&mv, prev, frac, 1.0, 0.0, k == 1);
            total[0] += seg.steps[0];
            total[1] += seg.steps[1];
            prev = frac;
        }
        assert_eq!(total, [100, -33]);
        assert_eq!(m.planned_steps(), [100, -33]);
    }

    #[test]
    fn test_speed_limited_by_axis() {
        let mut m = model();
        // Pure Y move at 1000 mm/s is capped by Y's 50 mm/s.
        let mv = m.begin_move([0.0, 0.0], &MoveRequest::new([0.0, 10.0], 1000.0)).unwrap();
        let seg = m.segment(&mv, 0.0, 1.0, mv.base_max_v_rec, 1e9, true);
        assert!((seg.data.max_v - 2500.0).abs() < 0.5);
        assert!((seg.data.a_x - 2.0 * 500.0 * 10.0).abs() < 0.5);
        assert_eq!(seg.steps, [0, 1000]);
    }

    #[test]
    fn test_close_checkpoints_keep_positive_headroom() {
        let mut m = model();
        let mv = m.begin_move([0.0, 0.0], &MoveRequest::new([2000.0, 0.0], 1.0)).unwrap();
        let count = 20_000_000u32;
        let mut prev = (count - 40) as f64 / count as f64;
        for k in count - 39..=count {
            let frac = if k == count { 1.0 } else { k as f64 / count as f64 };
            let seg = m.segment(&mv, prev, frac, 1.0 / count as f32, 0.0, false);
            assert!(seg.data.a_x > 0.0);
            assert!(seg.distance > 0.0);
            prev = frac;
        }
        assert_eq!(m.planned_steps(), [200_000, 0]);
    }

    #[test]
    fn test_junction_limit_on_reversal() {
        let mut m = model();
        let forward = m.begin_move([0.0, 0.0], &MoveRequest::new([10.0, 0.0], 10.0)).unwrap();
        let _ = m.segment(&forward, 0.0, 1.0, 1.0, 0.0, true);

        // Straight continuation has no junction limit.
        assert_eq!(m.junction_limit(&forward.unit), f32::INFINITY);

        // Reversal changes the X cosine by 2.
        let back = m.begin_move([10.0, 0.0], &MoveRequest::new([0.0, 0.0], 10.0)).unwrap();
        assert!((m.junction_limit(&back.unit) - 6.25).abs() < 1e-4);

        // Right angle changes each cosine by 1.
        let turn = m.begin_move([10.0, 0.0], &MoveRequest::new([10.0, 10.0], 10.0)).unwrap();
        assert!((m.junction_limit(&turn.unit) - 25.0).abs() < 1e-4);
    }
}
