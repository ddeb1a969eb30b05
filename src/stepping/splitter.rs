//! Splitting of blocks that exceed the command range.

use super::command::{AxisPhase, StepBlock, MAX_COMMAND_STEPS};
use super::math::mul_div_u32;

/// Splits one block into equal-time pieces that each fit the pulse solver.
///
/// Piece `i` covers normalized time `[i/k, (i+1)/k]`. Its step count is the
/// difference of the rounded parent positions at the piece boundaries, so
/// the pieces of each axis add up exactly to the parent count, and its
/// acceleration coefficient is the parent's scaled by the squared piece
/// length.
#[derive(Debug, Clone)]
pub struct AxisSplitter<const AXES: usize> {
    block: StepBlock<AXES>,
    pieces: u32,
    index: u32,
    emitted_steps: [u32; AXES],
    emitted_ticks: u32,
}

impl<const AXES: usize> AxisSplitter<AXES> {
    /// Prepare to split `block`.
    pub fn new(block: StepBlock<AXES>) -> Self {
        Self {
            pieces: Self::pieces_for(block.max_steps()),
            block,
            index: 0,
            emitted_steps: [0; AXES],
            emitted_ticks: 0,
        }
    }

    /// Number of pieces a block whose busiest axis takes `max_steps` steps
    /// is split into.
    pub fn pieces_for(max_steps: u32) -> u32 {
        // A piece covers at most 2x/k steps, the peak rate over a 1/k span.
        let max = max_steps as u64;
        let limit = MAX_COMMAND_STEPS as u64;
        if max <= limit {
            1
        } else {
            ((2 * max + limit - 1) / limit) as u32
        }
    }

    /// Total number of pieces.
    #[inline]
    pub fn pieces(&self) -> u32 {
        self.pieces
    }

    /// Pieces not yet produced.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.pieces - self.index
    }

    fn piece(&mut self) -> StepBlock<AXES> {
        if self.pieces == 1 {
            return self.block;
        }

        let k = self.pieces as f64;
        let f_end = (self.index + 1) as f64 / k;
        let df = 1.0 / k;
        let last = self.index + 1 == self.pieces;

        let ticks_end = if last {
            self.block.ticks
        } else {
            mul_div_u32(self.block.ticks, self.index + 1, self.pieces)
        };
        let ticks = ticks_end - self.emitted_ticks;
        self.emitted_ticks = ticks_end;

        let mut axes = [AxisPhase::IDLE; AXES];
        for (i, parent) in self.block.axes.iter().enumerate() {
            if parent.is_idle() {
                axes[i] = AxisPhase { dir: parent.dir, ..AxisPhase::IDLE };
                continue;
            }
            let x = parent.x as f64;
            let a = parent.a as f64;
            let pos_end = if last {
                parent.x
            } else {
                let p = (x - a) * f_end + a * f_end * f_end;
                (libm::round(p) as u32).min(parent.x)
            };
            let steps = pos_end.saturating_sub(self.emitted_steps[i]);
            self.emitted_steps[i] = self.emitted_steps[i].max(pos_end);

            let sub_a = libm::round(a * df * df) as i32;
            axes[i] = AxisPhase::new(parent.dir, steps, sub_a);
        }

        StepBlock { ticks, axes }
    }
}

impl<const AXES: usize> Iterator for AxisSplitter<AXES> {
    type Item = StepBlock<AXES>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.pieces {
            return None;
        }
        let piece = self.piece();
        self.index += 1;
        Some(piece)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.remaining() as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_block_passes_through() {
        let block = StepBlock {
            ticks: 1000,
            axes: [AxisPhase::new(true, 10, 3), AxisPhase::IDLE],
        };
        let mut splitter = AxisSplitter::new(block);
        assert_eq!(splitter.pieces(), 1);
        assert_eq!(splitter.next(), Some(block));
        assert_eq!(splitter.next(), None);
    }

    #[test]
    fn test_large_block_split_exactly() {
        let x = MAX_COMMAND_STEPS * 3 + 17;
        let block = StepBlock {
            ticks: 4_000_000_001,
            axes: [AxisPhase::new(true, x, x as i32), AxisPhase::cruise(false, 1000)],
        };
        let splitter = AxisSplitter::new(block);
        assert_eq!(splitter.pieces(), 7);
        assert_eq!(AxisSplitter::<2>::pieces_for(x), 7);
        assert_eq!(AxisSplitter::<2>::pieces_for(MAX_COMMAND_STEPS), 1);

        let mut steps = [0u64; 2];
        let mut ticks = 0u64;
        let mut prev_end_rate = 0.0f64;
        for piece in splitter {
            ticks += piece.ticks as u64;
            for (i, phase) in piece.axes.iter().enumerate() {
                assert!(phase.x <= MAX_COMMAND_STEPS);
                assert_eq!(phase.dir, block.axes[i].dir);
                steps[i] += phase.x as u64;
            }
            // Accelerating parent: each piece starts where the last ended.
            let p = piece.axes[0];
            let start_rate = (p.x as f64 - p.a as f64) / piece.ticks as f64;
            assert!(start_rate + 1e-3 >= prev_end_rate * 0.99);
            prev_end_rate = (p.x as f64 + p.a as f64) / piece.ticks as f64;
        }
        assert_eq!(steps, [x as u64, 1000]);
        assert_eq!(ticks, 4_000_000_001);
    }
}
