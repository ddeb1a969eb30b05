//! Chronological merge of the axes' pulse streams.
//!
//! The synchronizer executes [`StepBlock`](super::command::StepBlock)s from the head of the block
//! channel. Each call to [`StepperSynchronizer::on_timer`] emits the pulses
//! that are due, earliest first, and returns the time the timer must fire
//! next. Pulses due at the same tick are emitted in axis order.

use crate::config::{LatePulsePolicy, Steps};
use crate::error::{Result, StepperError};

use super::command::PhaseTimer;
use super::driver::AxisOutput;
use super::position::AxisState;
use super::queue::{Arming, BlockReader};

/// Why stepping is not running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Never started, or stopped explicitly.
    Idle,
    /// The queue was drained after the producer finished the stream.
    Finished,
    /// The queue ran dry while motion was still owed.
    Underrun,
    /// Emergency stop, or a pulse missed its deadline under the abort policy.
    Aborted,
    /// The step check of an axis asked to stop before a pulse.
    Interrupted {
        /// Axis whose check fired
        axis: usize,
    },
}

impl StopReason {
    /// Whether blocks still queued at this stop must be thrown away.
    #[inline]
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            StopReason::Underrun | StopReason::Aborted | StopReason::Interrupted { .. }
        )
    }
}

/// Merges per-axis pulse times into one time-ordered output.
#[derive(Debug, Clone)]
pub struct StepperSynchronizer<const AXES: usize> {
    timers: [PhaseTimer; AXES],
    dirs: [bool; AXES],
    not_before: [u64; AXES],
    dir_setup_ticks: [u32; AXES],
    prestep: [bool; AXES],
    states: [AxisState; AXES],
    block_start: u64,
    block_end: u64,
    last_pulse: u64,
    running: bool,
    stop_reason: StopReason,
    policy: LatePulsePolicy,
    late_tolerance: u64,
    late_pulses: u32,
}

impl<const AXES: usize> StepperSynchronizer<AXES> {
    /// Upper bound on the events handled by one [`on_timer`](Self::on_timer)
    /// call.
    pub const MAX_EVENTS_PER_CALL: usize = 2 * AXES + 1;

    /// Create a stopped synchronizer.
    pub fn new(
        dir_setup_ticks: [u32; AXES],
        steps_per_mm: [f32; AXES],
        policy: LatePulsePolicy,
        late_tolerance_ticks: u32,
    ) -> Self {
        Self {
            timers: [PhaseTimer::default(); AXES],
            dirs: [true; AXES],
            not_before: [0; AXES],
            dir_setup_ticks,
            prestep: [false; AXES],
            states: steps_per_mm.map(AxisState::new),
            block_start: 0,
            block_end: 0,
            last_pulse: 0,
            running: false,
            stop_reason: StopReason::Idle,
            policy,
            late_tolerance: late_tolerance_ticks as u64,
            late_pulses: 0,
        }
    }

    /// Whether blocks are being executed.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Why the synchronizer last stopped.
    #[inline]
    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    /// Number of pulses emitted after their deadline.
    #[inline]
    pub fn late_pulses(&self) -> u32 {
        self.late_pulses
    }

    /// Executed position of every axis.
    #[inline]
    pub fn states(&self) -> &[AxisState; AXES] {
        &self.states
    }

    /// Executed position of every axis in steps.
    pub fn positions(&self) -> [i64; AXES] {
        let mut out = [0; AXES];
        for (o, s) in out.iter_mut().zip(self.states.iter()) {
            *o = s.steps().value();
        }
        out
    }

    /// Overwrite the executed positions.
    pub fn set_positions(&mut self, steps: [i64; AXES]) {
        for (s, v) in self.states.iter_mut().zip(steps) {
            s.set_steps(Steps::new(v));
        }
    }

    /// Run [`AxisOutput::prestep`] before every pulse of `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis` is out of range.
    pub fn set_prestep_enabled(&mut self, axis: usize, enabled: bool) {
        self.prestep[axis] = enabled;
    }

    /// Stop without touching the outputs or the channel.
    pub fn halt(&mut self, reason: StopReason) {
        self.running = false;
        self.stop_reason = reason;
        for timer in self.timers.iter_mut() {
            timer.finish();
        }
    }

    fn start<O: AxisOutput, const Q: usize>(
        &mut self,
        at: u64,
        reader: &mut BlockReader<'_, AXES, Q>,
        outputs: &mut [O; AXES],
    ) -> Result<bool> {
        if reader.is_empty() {
            reader.halt(StopReason::Idle, self.positions());
            return Ok(false);
        }
        for output in outputs.iter_mut() {
            output.enable()?;
        }
        self.running = true;
        self.last_pulse = at;
        self.load(at, reader, outputs)?;
        debug!("stepping started at {}", at);
        Ok(true)
    }

    fn load<O: AxisOutput, const Q: usize>(
        &mut self,
        at: u64,
        reader: &BlockReader<'_, AXES, Q>,
        outputs: &mut [O; AXES],
    ) -> Result<()> {
        let block = match reader.peek() {
            Some(block) => *block,
            None => return Ok(()),
        };
        self.block_start = at;
        self.block_end = at + block.ticks as u64;

        for i in 0..AXES {
            let phase = &block.axes[i];
            self.timers[i] = PhaseTimer::new(phase, block.ticks);
            if phase.is_idle() {
                continue;
            }
            self.dirs[i] = phase.dir;
            if outputs[i].set_direction(phase.dir)? {
                self.not_before[i] = at + self.dir_setup_ticks[i] as u64;
            }
        }
        Ok(())
    }

    /// Earliest pending event: a pulse on an axis, or the end of the block.
    ///
    /// A block ends no earlier than its last pulse, which a direction setup
    /// delay may have pushed past the nominal end.
    fn next_event(&self) -> (u64, Option<usize>) {
        let mut best: Option<(u64, usize)> = None;
        for (i, timer) in self.timers.iter().enumerate() {
            if let Some(offset) = timer.next_offset() {
                let t = (self.block_start + offset as u64).max(self.not_before[i]);
                if best.map_or(true, |(bt, _)| t < bt) {
                    best = Some((t, i));
                }
            }
        }
        match best {
            Some((t, i)) => (t, Some(i)),
            None => (self.block_end.max(self.last_pulse), None),
        }
    }

    /// Emit every pulse due at `now`.
    ///
    /// While stopped, begins a run once the channel's armed start time has
    /// come. Returns the next deadline, or `None` once stopped. Under
    /// [`LatePulsePolicy::Abort`] a pulse more than the tolerance past its
    /// deadline stops the synchronizer and is reported as
    /// [`StepperError::DeadlineMissed`]; the pulse is not emitted.
    pub fn on_timer<O: AxisOutput, const Q: usize>(
        &mut self,
        now: u64,
        reader: &mut BlockReader<'_, AXES, Q>,
        outputs: &mut [O; AXES],
    ) -> Result<Option<u64>> {
        if !self.running {
            if let Some(steps) = reader.take_origin() {
                self.set_positions(steps);
            }
            match reader.begin(now) {
                Arming::Disarmed => return Ok(None),
                Arming::Pending(at) => return Ok(Some(at)),
                Arming::Ready(at) => {
                    if !self.start(at, reader, outputs)? {
                        return Ok(None);
                    }
                }
            }
        }

        for _ in 0..Self::MAX_EVENTS_PER_CALL {
            let (time, axis) = self.next_event();
            if time > now {
                return Ok(Some(time));
            }

            match axis {
                Some(i) => {
                    if self.prestep[i] && outputs[i].prestep()? {
                        let reason = StopReason::Interrupted { axis: i };
                        self.halt(reason);
                        reader.halt(reason, self.positions());
                        info!("axis {} interrupted at {}", i, time);
                        return Ok(None);
                    }
                    if now > time + self.late_tolerance {
                        let late_by = now - time;
                        match self.policy {
                            LatePulsePolicy::FireLate => {
                                self.late_pulses = self.late_pulses.wrapping_add(1);
                                warn!("axis {} pulse late by {} ticks", i, late_by);
                            }
                            LatePulsePolicy::Abort => {
                                self.halt(StopReason::Aborted);
                                reader.halt(StopReason::Aborted, self.positions());
                                warn!("axis {} missed deadline by {} ticks", i, late_by);
                                return Err(StepperError::DeadlineMissed { axis: i, late_by }.into());
                            }
                        }
                    }
                    outputs[i].step()?;
                    self.states[i].record_step(self.dirs[i]);
                    self.timers[i].advance();
                    self.last_pulse = time;
                }
                None => match reader.release(self.positions()) {
                    None => self.load(time, reader, outputs)?,
                    Some(reason) => {
                        if reason == StopReason::Finished {
                            for output in outputs.iter_mut() {
                                output.disable()?;
                            }
                            debug!("stepping finished at {}", time);
                        } else {
                            warn!("step queue underrun at {}", time);
                        }
                        self.halt(reason);
                        return Ok(None);
                    }
                },
            }
        }

        Ok(Some(self.next_event().0))
    }
}
