//! Conversion of planned segments into timed step blocks.
//!
//! A planned segment accelerates over its first `const_start`, cruises and
//! decelerates over its last `const_end`. Each non-empty phase becomes one
//! [`StepBlock`] whose duration follows from the phase length and its
//! boundary speeds.

use heapless::Vec;

use crate::planning::{Segment, SegmentResult};
use crate::stepping::math::round_to_u32;
use crate::stepping::{AxisPhase, StepBlock};

/// Current phase of a planned segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    /// Speeding up toward the plateau.
    Accelerating,
    /// Moving at the plateau speed.
    Cruising,
    /// Slowing down toward the end speed.
    Decelerating,
}

/// Timing of one phase of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseTiming {
    /// Which phase this is.
    pub phase: MotionPhase,
    /// Fraction of the segment length.
    pub fraction: f32,
    /// Speed at the start of the phase in mm/s.
    pub start_speed: f32,
    /// Speed at the end of the phase in mm/s.
    pub end_speed: f32,
    /// Duration in seconds.
    pub seconds: f32,
}

/// Split a planned segment into its timed phases.
///
/// `start_v` and `end_v` are the squared junction speeds resolved by the
/// planner. Phases of zero length are omitted.
pub fn phase_timings<const AXES: usize>(
    segment: &Segment<AXES>,
    result: &SegmentResult,
    start_v: f32,
    end_v: f32,
) -> Vec<PhaseTiming, 3> {
    let vs = libm::sqrtf(start_v);
    let vc = libm::sqrtf(result.const_v);
    let ve = libm::sqrtf(end_v);

    let phases = [
        (MotionPhase::Accelerating, result.const_start, vs, vc),
        (MotionPhase::Cruising, result.cruise_fraction(), vc, vc),
        (MotionPhase::Decelerating, result.const_end, vc, ve),
    ];

    let mut out = Vec::new();
    for (phase, fraction, u, w) in phases {
        if fraction <= 0.0 {
            continue;
        }
        let length = fraction * segment.distance;
        // Velocity is linear in time within a phase: t = 2L / (u + w).
        let sum = u + w;
        let seconds = if sum > 0.0 { 2.0 * length / sum } else { 0.0 };
        // Capacity is exactly the number of phases.
        let _ = out.push(PhaseTiming {
            phase,
            fraction,
            start_speed: u,
            end_speed: w,
            seconds,
        });
    }
    out
}

/// Split per-axis step counts between the phases of a segment.
///
/// Counts are rounded from the phase fractions; the cruise phase takes the
/// remainder so the phases add up to the segment's count exactly.
fn split_steps(total: u32, const_start: f32, const_end: f32) -> [u32; 3] {
    let x0 = round_to_u32(const_start * total as f32).min(total);
    let x2 = round_to_u32(const_end * total as f32).min(total - x0);
    [x0, total - x0 - x2, x2]
}

/// Turn a planned segment into step blocks at the given timer frequency.
pub fn segment_blocks<const AXES: usize>(
    segment: &Segment<AXES>,
    result: &SegmentResult,
    start_v: f32,
    end_v: f32,
    clock_frequency_hz: f32,
) -> Vec<StepBlock<AXES>, 3> {
    let mut per_axis = [[0u32; 3]; AXES];
    for (counts, steps) in per_axis.iter_mut().zip(segment.steps.iter()) {
        let total = steps.unsigned_abs().min(u32::MAX as u64) as u32;
        *counts = split_steps(total, result.const_start, result.const_end);
    }

    let mut blocks = Vec::new();
    for timing in phase_timings(segment, result, start_v, end_v) {
        let slot = match timing.phase {
            MotionPhase::Accelerating => 0,
            MotionPhase::Cruising => 1,
            MotionPhase::Decelerating => 2,
        };

        let mut block = StepBlock::dwell(round_to_u32(timing.seconds * clock_frequency_hz));
        for i in 0..AXES {
            let x = per_axis[i][slot];
            let dir = segment.steps[i] >= 0;
            block.axes[i] = match timing.phase {
                MotionPhase::Cruising => AxisPhase::cruise(dir, x),
                _ => AxisPhase::ramp(dir, x, timing.start_speed, timing.end_speed),
            };
        }

        if block.max_steps() > 0 {
            block.ticks = block.ticks.max(1);
        } else if block.ticks == 0 {
            continue;
        }
        let _ = blocks.push(block);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::{pull, push, SegmentData};

    fn planned(distance: f32, accel: f32, max_speed: f32, steps: [i64; 2]) -> (Segment<2>, SegmentResult, f32) {
        let max_v = max_speed * max_speed;
        let mut segment = Segment {
            data: SegmentData::new(0.0, 0.0, max_v, 2.0 * accel * distance),
            steps,
            distance,
            ..Segment::default()
        };
        let _ = push(&segment.data, &mut segment.state, 0.0);
        let (end_v, result) = pull(&segment.data, &segment.state, 0.0);
        (segment, result, end_v)
    }

    #[test]
    fn test_trapezoid_timings() {
        // 100 mm at up to 50 mm/s with 100 mm/s²: 0.5 s ramps of 12.5 mm.
        let (segment, result, end_v) = planned(100.0, 100.0, 50.0, [1000, 0]);
        let t = phase_timings(&segment, &result, 0.0, end_v);

        assert_eq!(t.len(), 3);
        assert!((t[0].seconds - 0.5).abs() < 1e-4);
        assert!((t[1].seconds - 1.5).abs() < 1e-4);
        assert!((t[2].seconds - 0.5).abs() < 1e-4);
        assert!((t[1].start_speed - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_triangle_has_no_cruise() {
        // 1 mm at 100 mm/s² peaks at 10 mm/s after 0.1 s.
        let (segment, result, end_v) = planned(1.0, 100.0, 500.0, [80, -80]);
        let t = phase_timings(&segment, &result, 0.0, end_v);

        assert_eq!(t.len(), 2);
        assert_eq!(t[0].phase, MotionPhase::Accelerating);
        assert_eq!(t[1].phase, MotionPhase::Decelerating);
        assert!((t[0].seconds - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_blocks_preserve_step_counts() {
        let (segment, result, end_v) = planned(100.0, 100.0, 50.0, [1001, -333]);
        let blocks = segment_blocks(&segment, &result, 0.0, end_v, 1_000_000.0);

        assert_eq!(blocks.len(), 3);
        let x: u32 = blocks.iter().map(|b| b.axes[0].x).sum();
        let y: u32 = blocks.iter().map(|b| b.axes[1].x).sum();
        assert_eq!((x, y), (1001, 333));
        assert!(blocks.iter().all(|b| b.axes[0].dir && !b.axes[1].dir));

        // Starts from rest, cruises, stops.
        assert_eq!(blocks[0].axes[0].a, blocks[0].axes[0].x as i32);
        assert_eq!(blocks[1].axes[0].a, 0);
        assert_eq!(blocks[2].axes[0].a, -(blocks[2].axes[0].x as i32));

        let ticks: u32 = blocks.iter().map(|b| b.ticks).sum();
        assert!((ticks as i64 - 2_500_000).abs() < 10);
    }

    #[test]
    fn test_split_steps_sums_exactly() {
        assert_eq!(split_steps(10, 0.26, 0.26), [3, 4, 3]);
        assert_eq!(split_steps(3, 0.5, 0.5), [2, 0, 1]);
        assert_eq!(split_steps(0, 0.3, 0.3), [0, 0, 0]);
    }
}
