//! Two-pass junction velocity planning over a chain of linear segments.
//!
//! Velocities here are squared speeds, so that velocity is linear in
//! position under constant acceleration. A segment of length `d` planned at
//! acceleration `A` has a headroom of `a_x = 2 * A * d`: the largest change
//! of squared speed achievable across it.
//!
//! Planning a chain is done in two sweeps. [`push`] walks from a known
//! boundary (the future stop) back toward the oldest segment, recording the
//! highest end velocity each segment may have. [`pull`] then walks forward
//! from the current velocity and resolves every segment into acceleration,
//! cruise and deceleration fractions.

/// Kinematic limits of one segment, fixed when the segment is queued.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentData {
    /// Squared-speed change achievable over the segment.
    pub a_x: f32,
    /// Squared cruise speed limit.
    pub max_v: f32,
    /// Squared speed limit at the start junction.
    pub max_start_v: f32,
    /// Reciprocal of `a_x`.
    pub a_x_rec: f32,
}

impl SegmentData {
    /// Build segment limits.
    ///
    /// `prev_max_v` is the cruise limit of the preceding segment (zero when
    /// starting from rest) and `max_start_v` the junction limit derived from
    /// the change in direction. The effective start limit is the smallest of
    /// the three velocity arguments.
    ///
    /// # Panics
    ///
    /// Panics if `a_x` is not positive or any velocity is negative.
    pub fn new(prev_max_v: f32, max_start_v: f32, max_v: f32, a_x: f32) -> Self {
        assert!(a_x > 0.0, "segment acceleration headroom must be positive");
        assert!(prev_max_v >= 0.0 && max_start_v >= 0.0 && max_v >= 0.0);

        Self {
            a_x,
            max_v,
            max_start_v: prev_max_v.min(max_start_v).min(max_v),
            a_x_rec: 1.0 / a_x,
        }
    }
}

/// Per-segment scratch written by [`push`] and read by [`pull`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentState {
    end_v: Option<f32>,
}

impl SegmentState {
    /// End velocity recorded by the last backward pass, if any.
    #[inline]
    pub fn end_v(&self) -> Option<f32> {
        self.end_v
    }

    /// Forget the recorded end velocity.
    #[inline]
    pub fn reset(&mut self) {
        self.end_v = None;
    }
}

/// Phase breakdown of one planned segment.
///
/// The segment accelerates over `[0, const_start)`, cruises at `const_v`
/// and decelerates over the last `const_end` of its length. Both fractions
/// are relative to the segment length.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentResult {
    /// Fraction of the segment spent accelerating.
    pub const_start: f32,
    /// Fraction of the segment spent decelerating.
    pub const_end: f32,
    /// Squared plateau speed.
    pub const_v: f32,
}

impl SegmentResult {
    /// Fraction of the segment spent at constant speed.
    #[inline]
    pub fn cruise_fraction(&self) -> f32 {
        (1.0 - self.const_start - self.const_end).max(0.0)
    }
}

/// Backward pass over one segment.
///
/// Records `min(end_v, max_v)` as the segment's permitted end velocity and
/// returns the highest velocity the predecessor may end at: the segment
/// must still be able to slow down to its recorded end velocity, and may
/// not start faster than its own start limit.
pub fn push(segment: &SegmentData, state: &mut SegmentState, end_v: f32) -> f32 {
    debug_assert!(segment.max_start_v <= segment.max_v);
    assert!(end_v >= 0.0, "end velocity must be non-negative");

    let end_v = end_v.min(segment.max_v);
    state.end_v = Some(end_v);
    segment.max_start_v.min(end_v + segment.a_x)
}

/// Forward pass over one segment.
///
/// Given the velocity the segment starts at, returns the velocity it ends
/// at and its phase breakdown.
///
/// # Panics
///
/// Panics if [`push`] has not run on this segment, or if `start_v` exceeds
/// what the backward pass allowed.
pub fn pull(segment: &SegmentData, state: &SegmentState, start_v: f32) -> (f32, SegmentResult) {
    let pushed_end_v = match state.end_v {
        Some(v) => v,
        None => panic!("segment pulled before push"),
    };
    assert!(start_v >= 0.0, "start velocity must be non-negative");
    assert!(start_v <= segment.max_start_v, "start velocity above junction limit");
    assert!(
        start_v <= pushed_end_v + segment.a_x,
        "start velocity cannot be decelerated within the segment"
    );

    let start_v_plus_a_x = start_v + segment.a_x;

    if pushed_end_v > start_v_plus_a_x {
        // Accelerating over the whole segment still falls short.
        let end_v = start_v_plus_a_x;
        return (
            end_v,
            SegmentResult {
                const_start: 1.0,
                const_end: 0.0,
                const_v: end_v,
            },
        );
    }

    let end_v = pushed_end_v;
    let half = (start_v_plus_a_x + end_v) * 0.5;

    let result = if half > segment.max_v {
        SegmentResult {
            const_start: (segment.max_v - start_v) * segment.a_x_rec,
            const_end: (segment.max_v - end_v) * segment.a_x_rec,
            const_v: segment.max_v,
        }
    } else {
        let const_start = ((half - start_v) * segment.a_x_rec).clamp(0.0, 1.0);
        SegmentResult {
            const_start,
            const_end: 1.0 - const_start,
            const_v: half,
        }
    };

    (end_v, result)
}
