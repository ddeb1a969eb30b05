//! Step-block channel between the planner and the step timer interrupt.
//!
//! [`BlockQueue`] keeps the blocks in a lock-free `heapless` SPSC ring and
//! splits into a [`BlockWriter`] owned by the main loop and a
//! [`BlockReader`] owned by the timer interrupt. Besides the ring cursors
//! the two sides share one small control word, only ever touched inside
//! `critical_section::with`:
//!
//! - whether the writer owes more blocks (end of stream),
//! - the run state: stopped and why, armed for a start time, or running,
//! - the underrun count,
//! - how many blocks at the head are stale and must be dropped before the
//!   next run,
//! - the executed position at the last stop, and a pending position
//!   override.
//!
//! A stop caused by a fault (underrun, abort, interrupted step) invalidates
//! everything still queued: those blocks were planned to follow motion that
//! never happened. The writer marks them stale when it acknowledges the stop
//! and the reader drops them when the next run begins.

use core::cell::Cell;

use critical_section::Mutex;
use heapless::spsc::{Consumer, Producer, Queue};

use super::command::StepBlock;
use super::synchronizer::StopReason;

/// Stepping state as seen from both sides of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not stepping.
    Stopped(StopReason),
    /// Stepping begins at the given time.
    Armed(u64),
    /// Blocks are being executed.
    Running,
}

/// What [`BlockReader::begin`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arming {
    /// Nothing to start.
    Disarmed,
    /// A run is armed for a later time.
    Pending(u64),
    /// A run starts at the given time, which has come.
    Ready(u64),
}

#[derive(Debug, Clone, Copy)]
struct Link<const AXES: usize> {
    run: RunState,
    finished: bool,
    stale: usize,
    underruns: u32,
    stopped_at: [i64; AXES],
    origin: Option<[i64; AXES]>,
}

struct Shared<const AXES: usize>(Mutex<Cell<Link<AXES>>>);

impl<const AXES: usize> Shared<AXES> {
    const fn new() -> Self {
        Self(Mutex::new(Cell::new(Link {
            run: RunState::Stopped(StopReason::Idle),
            finished: true,
            stale: 0,
            underruns: 0,
            stopped_at: [0; AXES],
            origin: None,
        })))
    }

    #[inline]
    fn get(&self) -> Link<AXES> {
        critical_section::with(|cs| self.0.borrow(cs).get())
    }

    #[inline]
    fn update<R>(&self, f: impl FnOnce(&mut Link<AXES>) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.0.borrow(cs);
            let mut link = cell.get();
            let r = f(&mut link);
            cell.set(link);
            r
        })
    }
}

/// Storage for the step-block channel; holds at most `Q - 1` blocks.
///
/// Usually placed in a `static` so that both halves are `'static`.
pub struct BlockQueue<const AXES: usize, const Q: usize> {
    blocks: Queue<StepBlock<AXES>, Q>,
    shared: Shared<AXES>,
}

impl<const AXES: usize, const Q: usize> BlockQueue<AXES, Q> {
    /// Create an empty channel.
    pub const fn new() -> Self {
        Self {
            blocks: Queue::new(),
            shared: Shared::new(),
        }
    }

    /// Split into the main-loop and interrupt halves.
    pub fn split(&mut self) -> (BlockWriter<'_, AXES, Q>, BlockReader<'_, AXES, Q>) {
        let (producer, consumer) = self.blocks.split();
        let shared = &self.shared;
        (BlockWriter { producer, shared }, BlockReader { consumer, shared })
    }
}

impl<const AXES: usize, const Q: usize> Default for BlockQueue<AXES, Q> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producing half, owned by the planner.
pub struct BlockWriter<'a, const AXES: usize, const Q: usize> {
    producer: Producer<'a, StepBlock<AXES>, Q>,
    shared: &'a Shared<AXES>,
}

impl<'a, const AXES: usize, const Q: usize> BlockWriter<'a, AXES, Q> {
    /// Largest number of blocks the channel holds.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }

    /// Number of blocks that can be published now.
    #[inline]
    pub fn avail(&self) -> usize {
        self.producer.capacity() - self.producer.len()
    }

    /// Blocks waiting for the reader, stale ones excluded.
    pub fn queued(&self) -> usize {
        let producer = &self.producer;
        self.shared.update(|l| producer.len().saturating_sub(l.stale))
    }

    /// Publish `blocks`; `last` marks the end of the stream.
    ///
    /// Returns `false` if stepping had already stopped on a fault by the
    /// time the blocks became visible. They will never run and the motion
    /// they carry has to be planned again from rest.
    ///
    /// # Panics
    ///
    /// Panics if more than [`avail`](Self::avail) blocks are published.
    pub fn publish<I>(&mut self, blocks: I, last: bool) -> bool
    where
        I: IntoIterator<Item = StepBlock<AXES>>,
    {
        let mut any = false;
        for block in blocks {
            if self.producer.enqueue(block).is_err() {
                panic!("published more than available");
            }
            any = true;
        }
        self.shared.update(|l| {
            if last {
                l.finished = true;
            } else if any {
                l.finished = false;
            }
            !matches!(l.run, RunState::Stopped(reason) if reason.is_fault())
        })
    }

    /// Signal that no more blocks are owed after the ones published.
    ///
    /// Running out of blocks after this is not an underrun.
    pub fn finish(&mut self) {
        self.shared.update(|l| l.finished = true);
    }

    /// Take notice of a stop the reader reported.
    ///
    /// Returns the reason and the executed positions at the stop, once per
    /// stop. After a fault every block still queued becomes stale.
    pub fn acknowledge(&mut self) -> Option<(StopReason, [i64; AXES])> {
        let producer = &self.producer;
        self.shared.update(|l| match l.run {
            RunState::Stopped(StopReason::Idle) | RunState::Armed(_) | RunState::Running => None,
            RunState::Stopped(reason) => {
                if reason.is_fault() {
                    l.stale = producer.len();
                }
                l.run = RunState::Stopped(StopReason::Idle);
                Some((reason, l.stopped_at))
            }
        })
    }

    /// Arm a run starting at `at` if stepping is stopped without an
    /// unacknowledged fault and fresh blocks are queued.
    pub fn arm(&mut self, at: u64) -> bool {
        let producer = &self.producer;
        self.shared.update(|l| match l.run {
            RunState::Stopped(StopReason::Idle | StopReason::Finished)
                if producer.len() > l.stale =>
            {
                l.run = RunState::Armed(at);
                true
            }
            _ => false,
        })
    }

    /// Ask the reader to adopt `steps` as its position before the next run.
    pub fn set_origin(&mut self, steps: [i64; AXES]) {
        self.shared.update(|l| {
            l.origin = Some(steps);
            l.stopped_at = steps;
        });
    }

    /// Current run state.
    #[inline]
    pub fn run_state(&self) -> RunState {
        self.shared.get().run
    }

    /// Whether stepping stopped on a fault that is not yet acknowledged.
    #[inline]
    pub fn is_faulted(&self) -> bool {
        matches!(self.run_state(), RunState::Stopped(reason) if reason.is_fault())
    }

    /// Times the reader ran dry while blocks were owed.
    #[inline]
    pub fn underruns(&self) -> u32 {
        self.shared.get().underruns
    }
}

/// Consuming half, owned by the step timer interrupt.
pub struct BlockReader<'a, const AXES: usize, const Q: usize> {
    consumer: Consumer<'a, StepBlock<AXES>, Q>,
    shared: &'a Shared<AXES>,
}

impl<'a, const AXES: usize, const Q: usize> BlockReader<'a, AXES, Q> {
    /// Block at the head of the channel.
    #[inline]
    pub fn peek(&self) -> Option<&StepBlock<AXES>> {
        self.consumer.peek()
    }

    /// Number of blocks in the channel, stale ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    /// Whether the channel holds no blocks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.consumer.ready()
    }

    /// Switch to running if a run is armed for a time at or before `now`.
    ///
    /// Stale blocks are dropped before a run begins.
    pub fn begin(&mut self, now: u64) -> Arming {
        let (arming, stale) = self.shared.update(|l| match l.run {
            RunState::Armed(at) if now >= at => {
                l.run = RunState::Running;
                (Arming::Ready(at), core::mem::take(&mut l.stale))
            }
            RunState::Armed(at) => (Arming::Pending(at), 0),
            _ => (Arming::Disarmed, 0),
        });
        for _ in 0..stale {
            let _ = self.consumer.dequeue();
        }
        arming
    }

    /// Position override published by the writer, if any.
    pub fn take_origin(&mut self) -> Option<[i64; AXES]> {
        self.shared.update(|l| l.origin.take())
    }

    /// Release the head block.
    ///
    /// Returns `None` while blocks remain. Otherwise the run stops, as
    /// [`StopReason::Finished`] if the writer ended the stream and as a
    /// counted [`StopReason::Underrun`] if not, and `positions` are recorded
    /// for the writer.
    pub fn release(&mut self, positions: [i64; AXES]) -> Option<StopReason> {
        let _ = self.consumer.dequeue();
        let consumer = &self.consumer;
        self.shared.update(|l| {
            if consumer.ready() {
                return None;
            }
            let reason = if l.finished {
                StopReason::Finished
            } else {
                l.underruns = l.underruns.wrapping_add(1);
                StopReason::Underrun
            };
            l.run = RunState::Stopped(reason);
            l.stopped_at = positions;
            Some(reason)
        })
    }

    /// Stop for `reason`, emptying the channel in the same critical section.
    pub fn halt(&mut self, reason: StopReason, positions: [i64; AXES]) {
        let consumer = &mut self.consumer;
        self.shared.update(|l| {
            while consumer.dequeue().is_some() {}
            l.run = RunState::Stopped(reason);
            l.stale = 0;
            l.stopped_at = positions;
        });
    }

    /// Current run state.
    #[inline]
    pub fn run_state(&self) -> RunState {
        self.shared.get().run
    }
}
