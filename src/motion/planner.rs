//! Move intake and lookahead planning.
//!
//! Moves are split into segments as room frees up in the lookahead queue.
//! Whenever the lookahead is full, or a flush was requested, the planner
//! runs the backward pass over every queued segment and commits the oldest
//! ones: they are resolved by the forward pass, turned into step blocks and
//! published to the block channel.
//!
//! A segment is committed all at once or not at all. Its blocks are only
//! published when the channel has room for every one of them, so the
//! channel never holds part of a segment whose end speed the planner has
//! not yet adopted.

use crate::config::{AxisConstraints, Millimeters, PlannerConfig, SplitterConfig, Steps};
use crate::error::{MotionError, Result};
use crate::planning::splitter::MAX_SPLIT_COUNT;
use crate::planning::{
    pull, push, DistanceSplitter, MoveGeometry, MoveRequest, PlannerQueue, Segment,
    SegmentGeometryModel,
};
use crate::stepping::{AxisSplitter, BlockWriter};

use super::profile::segment_blocks;

/// Outcome of offering a move to the planner.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// The move was accepted.
    Queued,
    /// An earlier move is still being split; offer this one again later.
    Full,
}

#[derive(Debug, Clone, Copy)]
struct ActiveMove<const AXES: usize> {
    geometry: MoveGeometry<AXES>,
    prev_frac: f64,
    first: bool,
}

/// Lookahead planner over `L - 1` queued segments.
pub struct MotionPlanner<const AXES: usize, const L: usize> {
    geometry: SegmentGeometryModel<AXES>,
    splitter: DistanceSplitter,
    active: Option<ActiveMove<AXES>>,
    lookahead: PlannerQueue<Segment<AXES>, L>,
    position_mm: [f32; AXES],
    target_steps: [i64; AXES],
    last_max_v: f32,
    carry_v: f32,
    commit_count: usize,
    clock_frequency_hz: f32,
    flushing: bool,
    committed: u32,
}

impl<const AXES: usize, const L: usize> MotionPlanner<AXES, L> {
    /// Create a planner at the origin.
    ///
    /// `planner.commit_count` must already be within `1..L`.
    pub fn new(
        axes: [AxisConstraints; AXES],
        planner: &PlannerConfig,
        splitter: &SplitterConfig,
    ) -> Self {
        debug_assert!(planner.commit_count >= 1 && planner.commit_count < L);
        Self {
            geometry: SegmentGeometryModel::new(
                axes,
                planner.junction_speed.value(),
                planner.clock_frequency_hz,
            ),
            splitter: DistanceSplitter::new(splitter, planner.clock_frequency_hz),
            active: None,
            lookahead: PlannerQueue::new(),
            position_mm: [0.0; AXES],
            target_steps: [0; AXES],
            last_max_v: 0.0,
            carry_v: 0.0,
            commit_count: planner.commit_count,
            clock_frequency_hz: planner.clock_frequency_hz as f32,
            flushing: false,
            committed: 0,
        }
    }

    /// Accept a move if no earlier move is still being split.
    ///
    /// Zero-length moves are accepted and produce no segments.
    ///
    /// # Errors
    ///
    /// Rejects invalid requests, and moves so long that the splitter cannot
    /// number their sub-segments. Nothing changes on error.
    pub fn append_move(&mut self, request: &MoveRequest<AXES>) -> Result<AppendResult> {
        request.validate()?;
        if self.active.is_some() {
            return Ok(AppendResult::Full);
        }

        if let Some(geometry) = self.geometry.begin_move(self.position_mm, request) {
            self.splitter.start(
                geometry.distance,
                geometry.base_max_v_rec,
                geometry.time_freq_by_max_speed,
            );
            if self.splitter.split_count() >= MAX_SPLIT_COUNT {
                self.splitter.stop();
                return Err(MotionError::MoveTooLong {
                    distance: geometry.distance,
                }
                .into());
            }
            for (i, axis) in self.geometry.axes().iter().enumerate() {
                self.target_steps[i] =
                    Steps::from_mm(Millimeters::new(request.target[i]), axis.steps_per_mm).value();
            }
            self.active = Some(ActiveMove {
                geometry,
                prev_frac: 0.0,
                first: true,
            });
        }
        self.flushing = false;
        self.position_mm = request.target;
        Ok(AppendResult::Queued)
    }

    /// Split the active move into segments while the lookahead has room.
    ///
    /// Returns the number of segments queued.
    pub fn emit_segments(&mut self) -> usize {
        let mut emitted = 0;
        while let Some(active) = self.active.as_mut() {
            if self.lookahead.writer_avail() == 0 {
                break;
            }
            let Some((rel_max_v_rec, frac)) = self.splitter.pull() else {
                self.active = None;
                break;
            };

            let segment = self.geometry.segment(
                &active.geometry,
                active.prev_frac,
                frac,
                rel_max_v_rec,
                self.last_max_v,
                active.first,
            );
            active.prev_frac = frac;
            active.first = false;
            self.last_max_v = segment.data.max_v;

            *self.lookahead.writer_get_mut(0) = segment;
            self.lookahead.writer_provide(1);
            emitted += 1;

            if !self.splitter.is_active() {
                self.active = None;
            }
        }
        emitted
    }

    /// Request that everything queued be committed, ending at rest.
    pub fn flush(&mut self) {
        self.flushing = true;
    }

    /// Run the backward pass and commit segments when due.
    ///
    /// A segment is committed only if the channel has room for all of its
    /// blocks. Nothing is committed while the channel reports an
    /// unacknowledged fault, and a segment whose blocks turn out to be
    /// orphaned by a fault is kept for replanning. Returns the number of
    /// segments committed.
    pub fn plan<const Q: usize>(&mut self, blocks: &mut BlockWriter<'_, AXES, Q>) -> usize {
        if blocks.is_faulted() {
            return 0;
        }

        let queued = self.lookahead.reader_avail();
        let draining = self.flushing && self.active.is_none();
        let due = if draining {
            queued
        } else if self.lookahead.writer_avail() == 0 {
            self.commit_count.min(queued)
        } else {
            0
        };

        let mut committed = 0;
        if due > 0 {
            // Backward pass, newest to oldest, from a stop after the last segment.
            let mut v = 0.0;
            for i in (0..queued).rev() {
                let segment = self.lookahead.reader_get_mut(i);
                v = push(&segment.data, &mut segment.state, v);
            }

            while committed < due {
                let segment = *self.lookahead.reader_get(0);
                let (end_v, result) = pull(&segment.data, &segment.state, self.carry_v);
                let staged = segment_blocks(&segment, &result, self.carry_v, end_v, self.clock_frequency_hz);
                let pieces: usize = staged
                    .iter()
                    .map(|b| AxisSplitter::<AXES>::pieces_for(b.max_steps()) as usize)
                    .sum();
                debug_assert!(pieces <= blocks.capacity());
                if pieces > blocks.avail() {
                    break;
                }

                let last = draining && committed + 1 == queued;
                if !blocks.publish(staged.into_iter().flat_map(AxisSplitter::new), last) {
                    debug!("segment orphaned by a stop, kept for replanning");
                    break;
                }
                self.lookahead.reader_consume(1);
                self.carry_v = end_v;
                committed += 1;
            }

            self.committed = self.committed.wrapping_add(committed as u32);
            trace!("committed {} of {} segments", committed, queued);
        }

        if draining && self.lookahead.is_empty() {
            blocks.finish();
            self.last_max_v = 0.0;
        }

        committed
    }

    /// Whether no move is being split and no segment is queued.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.lookahead.is_empty()
    }

    /// Restart planning from rest after the step queue ran dry.
    ///
    /// Queued segments are kept; only the carried speed is dropped, so the
    /// next committed segment starts from a standstill.
    pub fn recover_from_underrun(&mut self) {
        self.carry_v = 0.0;
    }

    /// Drop all queued work and resynchronize with the executed position.
    pub fn reset(&mut self, steps: [i64; AXES]) {
        self.lookahead.clear();
        self.splitter.stop();
        self.active = None;
        self.flushing = false;
        self.carry_v = 0.0;
        self.last_max_v = 0.0;
        self.geometry.reset(steps);
        self.target_steps = steps;
        for (i, axis) in self.geometry.axes().iter().enumerate() {
            self.position_mm[i] = steps[i] as f32 * axis.mm_per_step;
        }
    }

    /// Steps still owed per axis to reach the last accepted target from
    /// `executed`.
    pub fn remaining_steps(&self, executed: [i64; AXES]) -> [i64; AXES] {
        core::array::from_fn(|i| self.target_steps[i] - executed[i])
    }

    /// Squared speed at the end of the last committed segment.
    #[inline]
    pub fn carry_v(&self) -> f32 {
        self.carry_v
    }

    /// Number of segments waiting in the lookahead.
    #[inline]
    pub fn queued_segments(&self) -> usize {
        self.lookahead.reader_avail()
    }

    /// Total number of segments committed.
    #[inline]
    pub fn committed_segments(&self) -> u32 {
        self.committed
    }

    /// Target of the last accepted move in millimetres.
    #[inline]
    pub fn position_mm(&self) -> [f32; AXES] {
        self.position_mm
    }

    /// Absolute step position at the end of the last queued segment.
    #[inline]
    pub fn planned_steps(&self) -> [i64; AXES] {
        self.geometry.planned_steps()
    }

    /// Absolute step position of the last accepted target.
    #[inline]
    pub fn target_steps(&self) -> [i64; AXES] {
        self.target_steps
    }
}
