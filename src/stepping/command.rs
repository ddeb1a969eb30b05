//! Stepper command blocks and the per-axis pulse time solver.
//!
//! A [`StepBlock`] covers a span of `ticks` timer ticks shared by all axes.
//! Within it each axis runs one [`AxisPhase`]: `x` steps whose position over
//! normalized time `f ∈ [0, 1]` follows
//!
//! `p(f) = (x - a) f + a f²`, with `-x <= a <= x`.
//!
//! `a = 0` is constant speed, `a = x` starts from rest and `a = -x` ends at
//! rest. Step `n` fires where `p(f) = n`, i.e. at
//!
//! `t * 2n / (v0 + sqrt(v0² + 4 a n))`, with `v0 = x - a`.

use super::math::IntSqrt;

/// Fractional bits carried through the square root.
pub const FRAC_BITS: u32 = 8;

/// Largest step count of one phase the solver handles without overflow.
pub const MAX_COMMAND_STEPS: u32 = 1 << (29 - FRAC_BITS);

/// Motion of one axis within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisPhase {
    /// Travel direction, `true` toward positive positions.
    pub dir: bool,
    /// Number of steps.
    pub x: u32,
    /// Acceleration coefficient in steps, within `[-x, x]`.
    pub a: i32,
}

impl AxisPhase {
    /// No motion.
    pub const IDLE: Self = Self {
        dir: true,
        x: 0,
        a: 0,
    };

    /// Create a phase, clamping `a` into `[-x, x]`.
    pub fn new(dir: bool, x: u32, a: i32) -> Self {
        let limit = x.min(i32::MAX as u32) as i32;
        Self {
            dir,
            x,
            a: a.clamp(-limit, limit),
        }
    }

    /// Constant speed phase.
    #[inline]
    pub fn cruise(dir: bool, x: u32) -> Self {
        Self { dir, x, a: 0 }
    }

    /// Phase moving linearly in velocity from speed `u` to speed `w`.
    ///
    /// Start and end speeds are proportional to `x - a` and `x + a`, which
    /// gives `a = x (w - u) / (w + u)`.
    pub fn ramp(dir: bool, x: u32, u: f32, w: f32) -> Self {
        let sum = u + w;
        let a = if sum > 0.0 {
            super::math::round_to_i32(x as f32 * (w - u) / sum)
        } else {
            x.min(i32::MAX as u32) as i32
        };
        Self::new(dir, x, a)
    }

    /// Whether this phase has no steps.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.x == 0
    }

    /// Signed step count.
    #[inline]
    pub fn signed_steps(&self) -> i64 {
        if self.dir {
            self.x as i64
        } else {
            -(self.x as i64)
        }
    }
}

/// A span of time with one phase per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBlock<const AXES: usize> {
    /// Duration in timer ticks.
    pub ticks: u32,
    /// Per-axis motion.
    pub axes: [AxisPhase; AXES],
}

impl<const AXES: usize> StepBlock<AXES> {
    /// A block during which no axis moves.
    pub fn dwell(ticks: u32) -> Self {
        Self {
            ticks,
            axes: [AxisPhase::IDLE; AXES],
        }
    }

    /// Largest step count of any axis.
    pub fn max_steps(&self) -> u32 {
        self.axes.iter().map(|p| p.x).max().unwrap_or(0)
    }
}

impl<const AXES: usize> Default for StepBlock<AXES> {
    fn default() -> Self {
        Self::dwell(0)
    }
}

/// Computes the pulse times of one axis within one block.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimer {
    x: u32,
    a: i64,
    v0: i64,
    ticks: u32,
    done: u32,
    last: u32,
}

impl PhaseTimer {
    /// Start timing `phase` over `ticks`.
    ///
    /// # Panics
    ///
    /// Panics if the phase exceeds [`MAX_COMMAND_STEPS`].
    pub fn new(phase: &AxisPhase, ticks: u32) -> Self {
        assert!(phase.x <= MAX_COMMAND_STEPS, "phase exceeds command range");
        let a = phase.a as i64;
        Self {
            x: phase.x,
            a,
            v0: phase.x as i64 - a,
            ticks,
            done: 0,
            last: 0,
        }
    }

    /// Steps not yet issued.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.x - self.done
    }

    /// Steps already issued.
    #[inline]
    pub fn done(&self) -> u32 {
        self.done
    }

    /// Offset from the block start of the next step, or `None` when the
    /// phase is complete. Offsets never decrease and never exceed the block
    /// length.
    pub fn next_offset(&self) -> Option<u32> {
        if self.done >= self.x {
            return None;
        }
        let n = (self.done + 1) as i64;

        // Rounding can push the discriminant below zero near the end of a
        // decelerating phase; the remaining steps then fire at the end.
        let disc = self.v0 * self.v0 + 4 * self.a * n;
        let offset = if disc < 0 {
            self.ticks
        } else {
            let root = IntSqrt::isqrt((disc as u64) << (2 * FRAC_BITS));
            let den = ((self.v0 as u64) << FRAC_BITS) + root;
            if den == 0 {
                self.ticks
            } else {
                let num = (self.ticks as u64 * 2 * n as u64) << FRAC_BITS;
                (num / den).min(self.ticks as u64) as u32
            }
        };
        Some(offset.max(self.last))
    }

    /// Mark the next step as issued.
    pub fn advance(&mut self) {
        if let Some(offset) = self.next_offset() {
            self.last = offset;
            self.done += 1;
        }
    }

    /// Abandon the remaining steps.
    pub fn finish(&mut self) {
        self.done = self.x;
    }
}
