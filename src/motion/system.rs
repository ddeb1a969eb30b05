//! Top-level motion context, split between the main loop and the step timer
//! interrupt.
//!
//! [`MotionSystem::from_config`] splits a [`BlockQueue`] into two halves
//! that share nothing but the queue:
//!
//! - [`MotionSystem`] stays in the main loop. It owns the planner, takes
//!   moves, and from [`poll`](MotionSystem::poll) publishes step blocks and
//!   arms stepping.
//! - [`StepperContext`] belongs to the timer interrupt. It owns the
//!   synchronizer and the axis outputs and is driven by
//!   [`on_timer`](StepperContext::on_timer) at every deadline it returns.
//!
//! Stops are decided by the interrupt and reported through the queue; the
//! main loop acts on them at its next `poll` or `append_move`.
//!
//! # Example
//!
//! ```rust,ignore
//! use stepper_planner::{BlockQueue, MotionSystem, MoveRequest};
//!
//! // Any `&'static mut`, for instance from `cortex_m::singleton!`.
//! let blocks: &'static mut BlockQueue<2, 32> = make_static(BlockQueue::new());
//!
//! let config = stepper_planner::load_config("machine.toml")?;
//! let (mut motion, stepper) =
//!     MotionSystem::<2, 16, 32>::from_config(&config, blocks, [x, y])?;
//! // Hand `stepper` to the timer interrupt.
//!
//! let _ = motion.append_move(&MoveRequest::new([10.0, 5.0], 50.0))?;
//! motion.flush();
//! if let Some(start) = motion.poll(timer.now()) {
//!     timer.schedule(start);
//! }
//!
//! // Timer interrupt
//! if let Some(deadline) = stepper.on_timer(timer.now())? {
//!     timer.schedule(deadline);
//! }
//! ```

use heapless::Vec;

use crate::config::{validate_config, AxisConfig, AxisConstraints, SystemConfig};
use crate::error::{ConfigError, Error, MotionError, Result};
use crate::planning::{MoveRequest, PlannerQueue, Segment};
use crate::stepping::{
    AxisOutput, AxisSplitter, BlockQueue, BlockReader, BlockWriter, RunState, StepperSynchronizer,
    StopReason,
};

use super::planner::{AppendResult, MotionPlanner};

/// Main-loop half of the motion context for `AXES` axes.
///
/// `L` is the lookahead length in segments plus one and `Q` the step-block
/// queue length plus one.
pub struct MotionSystem<'q, const AXES: usize, const L: usize, const Q: usize> {
    planner: MotionPlanner<AXES, L>,
    writer: BlockWriter<'q, AXES, Q>,
    start_delay_ticks: u32,
    halted: bool,
    last_stop: StopReason,
    interrupted_remaining: Option<[i64; AXES]>,
}

/// Interrupt half of the motion context.
pub struct StepperContext<'q, O: AxisOutput, const AXES: usize, const Q: usize> {
    sync: StepperSynchronizer<AXES>,
    reader: BlockReader<'q, AXES, Q>,
    outputs: [O; AXES],
}

impl<'q, const AXES: usize, const L: usize, const Q: usize> MotionSystem<'q, AXES, L, Q> {
    /// Build both halves from a validated configuration.
    ///
    /// `outputs` are taken in configuration order, which is also the order
    /// of step priority.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, has a different
    /// number of axes than `AXES`, commits more segments per pass than the
    /// lookahead holds, or allows segments whose blocks cannot all fit the
    /// step-block queue at once.
    pub fn from_config<O: AxisOutput>(
        config: &SystemConfig,
        queue: &'q mut BlockQueue<AXES, Q>,
        outputs: [O; AXES],
    ) -> Result<(Self, StepperContext<'q, O, AXES, Q>)> {
        if config.axis_count() != AXES {
            return Err(Error::Config(ConfigError::AxisCountMismatch {
                expected: AXES,
                found: config.axis_count(),
            }));
        }
        validate_config(config)?;

        let lookahead = PlannerQueue::<Segment<AXES>, L>::USABLE;
        if config.planner.commit_count > lookahead {
            return Err(Error::Config(ConfigError::InvalidCommitCount {
                commit_count: config.planner.commit_count,
                lookahead,
            }));
        }

        let configs: Vec<&AxisConfig, 8> = config.axes.values().collect();
        let axes: [AxisConstraints; AXES] =
            core::array::from_fn(|i| AxisConstraints::from_config(configs[i]));

        // A segment becomes at most three blocks, each possibly split.
        let needed = axes
            .iter()
            .map(|a| {
                let steps = libm::ceilf(config.splitter.max_split_length.0 * a.steps_per_mm) as u32 + 1;
                3 * AxisSplitter::<AXES>::pieces_for(steps) as usize
            })
            .max()
            .unwrap_or(0);
        let capacity = Q.saturating_sub(1);
        if needed > capacity {
            return Err(Error::Config(ConfigError::QueueTooSmall { needed, capacity }));
        }

        let sync = StepperSynchronizer::new(
            axes.map(|a| a.dir_setup_ticks),
            axes.map(|a| a.steps_per_mm),
            config.planner.late_pulse_policy,
            config.planner.late_tolerance_ticks,
        );
        let (writer, reader) = queue.split();

        info!("motion system ready with {} axes", AXES);

        Ok((
            Self {
                planner: MotionPlanner::new(axes, &config.planner, &config.splitter),
                writer,
                start_delay_ticks: config.planner.start_delay_ticks,
                halted: false,
                last_stop: StopReason::Idle,
                interrupted_remaining: None,
            },
            StepperContext {
                sync,
                reader,
                outputs,
            },
        ))
    }

    /// Act on a stop the interrupt reported, once.
    fn acknowledge(&mut self) {
        let Some((reason, stopped_at)) = self.writer.acknowledge() else {
            return;
        };
        self.last_stop = reason;
        match reason {
            StopReason::Underrun => {
                debug!("restarting from rest after underrun");
                self.planner.recover_from_underrun();
            }
            StopReason::Aborted => {
                self.planner.reset(stopped_at);
                self.halted = true;
                warn!("motion halted");
            }
            StopReason::Interrupted { axis } => {
                self.interrupted_remaining = Some(self.planner.remaining_steps(stopped_at));
                self.planner.reset(stopped_at);
                info!("axis {} interrupted, queued motion dropped", axis);
            }
            StopReason::Finished | StopReason::Idle => {}
        }
    }

    /// Offer a move to the planner.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::Halted`] after an emergency stop, or an error
    /// if the request holds unusable numbers.
    pub fn append_move(&mut self, request: &MoveRequest<AXES>) -> Result<AppendResult> {
        self.acknowledge();
        if self.halted {
            return Err(MotionError::Halted.into());
        }
        self.planner.append_move(request)
    }

    /// Commit everything queued so the machine comes to rest at the end.
    pub fn flush(&mut self) {
        self.planner.flush();
    }

    /// Plan as far as the queues allow and arm stepping if it is stopped.
    ///
    /// Returns the start time when this call armed stepping. The timer must
    /// then call [`StepperContext::on_timer`] at that time.
    pub fn poll(&mut self, now: u64) -> Option<u64> {
        self.acknowledge();
        if self.halted {
            return None;
        }

        loop {
            let emitted = self.planner.emit_segments();
            let committed = self.planner.plan(&mut self.writer);
            if emitted == 0 && committed == 0 {
                break;
            }
        }

        let at = now + self.start_delay_ticks as u64;
        if self.writer.arm(at) {
            debug!("stepping armed for {}", at);
            return Some(at);
        }
        None
    }

    /// Accept moves again after an emergency stop.
    pub fn reset(&mut self) {
        self.acknowledge();
        self.halted = false;
        self.interrupted_remaining = None;
    }

    /// Redefine the current position while idle.
    ///
    /// The interrupt half adopts it before its next run. Returns `false`
    /// and changes nothing while motion is queued or running.
    pub fn set_positions(&mut self, steps: [i64; AXES]) -> bool {
        self.acknowledge();
        if !self.is_idle() {
            return false;
        }
        self.writer.set_origin(steps);
        self.planner.reset(steps);
        true
    }

    /// Whether an emergency stop is in effect.
    pub fn is_halted(&self) -> bool {
        self.halted || self.writer.run_state() == RunState::Stopped(StopReason::Aborted)
    }

    /// Whether nothing is planned, queued or being stepped.
    pub fn is_idle(&self) -> bool {
        self.planner.is_idle()
            && matches!(self.writer.run_state(), RunState::Stopped(_))
            && self.writer.queued() == 0
    }

    /// Whether the interrupt half is stepping or armed to.
    pub fn is_running(&self) -> bool {
        !matches!(self.writer.run_state(), RunState::Stopped(_))
    }

    /// Why stepping last stopped.
    pub fn stop_reason(&self) -> StopReason {
        match self.writer.run_state() {
            RunState::Stopped(StopReason::Idle) | RunState::Armed(_) | RunState::Running => {
                self.last_stop
            }
            RunState::Stopped(reason) => reason,
        }
    }

    /// Steps each axis still owed when the last interrupted run stopped.
    #[inline]
    pub fn interrupted_remaining(&self) -> Option<[i64; AXES]> {
        self.interrupted_remaining
    }

    /// Times the step queue ran dry while motion was owed.
    #[inline]
    pub fn underruns(&self) -> u32 {
        self.writer.underruns()
    }

    /// Segments committed since creation.
    #[inline]
    pub fn committed_segments(&self) -> u32 {
        self.planner.committed_segments()
    }

    /// Step blocks waiting for the interrupt half.
    #[inline]
    pub fn queued_blocks(&self) -> usize {
        self.writer.queued()
    }

    /// Absolute step position the accepted moves end at.
    #[inline]
    pub fn target_steps(&self) -> [i64; AXES] {
        self.planner.target_steps()
    }
}

impl<'q, O: AxisOutput, const AXES: usize, const Q: usize> StepperContext<'q, O, AXES, Q> {
    /// Timer interrupt entry point.
    ///
    /// Begins an armed run when its start time has come, emits the pulses
    /// due at `now` and returns the next deadline, or `None` once stepping
    /// stopped. A missed deadline under the abort policy, or a failing
    /// output, triggers an emergency stop.
    pub fn on_timer(&mut self, now: u64) -> Result<Option<u64>> {
        match self.sync.on_timer(now, &mut self.reader, &mut self.outputs) {
            Ok(next) => Ok(next),
            Err(e) => {
                let _ = self.emergency_stop();
                Err(e)
            }
        }
    }

    /// Stop immediately, de-energize every axis and drop all queued blocks.
    ///
    /// The main-loop half resynchronizes with the steps actually emitted
    /// and refuses new moves until [`MotionSystem::reset`].
    ///
    /// # Errors
    ///
    /// Returns the first output failure; every output is still attempted.
    pub fn emergency_stop(&mut self) -> Result<()> {
        let mut result = Ok(());
        critical_section::with(|_| {
            self.sync.halt(StopReason::Aborted);
            for output in self.outputs.iter_mut() {
                if let Err(e) = output.disable() {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
            self.reader.halt(StopReason::Aborted, self.sync.positions());
        });
        warn!("emergency stop");
        result
    }

    /// Check [`AxisOutput::prestep`] before every pulse of `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis` is out of range.
    pub fn set_prestep_enabled(&mut self, axis: usize, enabled: bool) {
        self.sync.set_prestep_enabled(axis, enabled);
    }

    /// Whether pulses are being emitted.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.sync.is_running()
    }

    /// Why stepping last stopped.
    #[inline]
    pub fn stop_reason(&self) -> StopReason {
        self.sync.stop_reason()
    }

    /// Pulses emitted after their deadline.
    #[inline]
    pub fn late_pulses(&self) -> u32 {
        self.sync.late_pulses()
    }

    /// Executed position of every axis in steps.
    #[inline]
    pub fn positions(&self) -> [i64; AXES] {
        self.sync.positions()
    }

    /// Executed position of every axis in millimetres.
    pub fn positions_mm(&self) -> [f32; AXES] {
        let mut out = [0.0; AXES];
        for (o, s) in out.iter_mut().zip(self.sync.states().iter()) {
            *o = s.mm().value();
        }
        out
    }

    /// Borrow the axis outputs.
    #[inline]
    pub fn outputs(&self) -> &[O; AXES] {
        &self.outputs
    }

    /// Tear down the context and return the axis outputs.
    pub fn into_outputs(self) -> [O; AXES] {
        self.outputs
    }
}
