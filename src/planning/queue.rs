//! Fixed-capacity single-producer single-consumer ring buffer.
//!
//! The producer fills slots past the writer cursor and publishes them with
//! [`PlannerQueue::writer_provide`]; the consumer reads slots past the
//! reader cursor and releases them with [`PlannerQueue::reader_consume`].
//! One slot always stays empty so that a full queue and an empty queue have
//! different cursor states:
//!
//! `writer_avail() + reader_avail() + 1 == N`
//!
//! Cursor updates run inside a critical section. Slot contents are accessed
//! through `&self`/`&mut self` only and never under the lock.

use core::cell::Cell;

use critical_section::Mutex;

#[derive(Debug, Clone, Copy, Default)]
struct Cursors {
    start: usize,
    end: usize,
    finished: bool,
    drained: bool,
    underruns: u32,
}

/// Ring buffer of `N` slots holding at most `N - 1` items.
pub struct PlannerQueue<T, const N: usize> {
    slots: [T; N],
    cursors: Mutex<Cell<Cursors>>,
}

impl<T: Copy + Default, const N: usize> PlannerQueue<T, N> {
    /// Create an empty queue.
    ///
    /// # Panics
    ///
    /// Panics if `N < 2`.
    pub fn new() -> Self {
        assert!(N >= 2, "queue needs at least two slots");
        Self {
            slots: [T::default(); N],
            cursors: Mutex::new(Cell::new(Cursors {
                finished: true,
                ..Cursors::default()
            })),
        }
    }
}

impl<T: Copy + Default, const N: usize> Default for PlannerQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> PlannerQueue<T, N> {
    /// Largest number of items the queue can hold.
    pub const USABLE: usize = N - 1;

    #[inline]
    fn load(&self) -> Cursors {
        critical_section::with(|cs| self.cursors.borrow(cs).get())
    }

    #[inline]
    fn update<R>(&self, f: impl FnOnce(&mut Cursors) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.cursors.borrow(cs);
            let mut cursors = cell.get();
            let r = f(&mut cursors);
            cell.set(cursors);
            r
        })
    }

    #[inline]
    fn writer_avail_of(c: &Cursors) -> usize {
        (c.start + N - c.end - 1) % N
    }

    #[inline]
    fn reader_avail_of(c: &Cursors) -> usize {
        (c.end + N - c.start) % N
    }

    /// Number of free slots the producer may fill.
    pub fn writer_avail(&self) -> usize {
        Self::writer_avail_of(&self.load())
    }

    /// Free slot `index` positions past the writer cursor.
    ///
    /// # Panics
    ///
    /// Panics if `index >= writer_avail()`.
    pub fn writer_get(&self, index: usize) -> &T {
        let c = self.load();
        assert!(index < Self::writer_avail_of(&c), "write past queue capacity");
        &self.slots[(c.end + index) % N]
    }

    /// Mutable access to a free slot `index` positions past the writer cursor.
    ///
    /// # Panics
    ///
    /// Panics if `index >= writer_avail()`.
    pub fn writer_get_mut(&mut self, index: usize) -> &mut T {
        let c = self.load();
        assert!(index < Self::writer_avail_of(&c), "write past queue capacity");
        &mut self.slots[(c.end + index) % N]
    }

    /// Publish `amount` filled slots to the consumer.
    ///
    /// Publishing reopens the stream after [`writer_finish`](Self::writer_finish).
    ///
    /// # Panics
    ///
    /// Panics if `amount > writer_avail()`.
    pub fn writer_provide(&self, amount: usize) {
        self.update(|c| {
            assert!(amount <= Self::writer_avail_of(c), "provided more than available");
            c.end = (c.end + amount) % N;
            if amount > 0 {
                c.finished = false;
                c.drained = false;
            }
        });
    }

    /// Signal that no more items are owed after the ones already provided.
    ///
    /// Draining the queue after this is not an underrun.
    pub fn writer_finish(&self) {
        self.update(|c| c.finished = true);
    }

    /// Number of items ready for the consumer.
    pub fn reader_avail(&self) -> usize {
        Self::reader_avail_of(&self.load())
    }

    /// Item `index` positions past the reader cursor.
    ///
    /// # Panics
    ///
    /// Panics if `index >= reader_avail()`.
    pub fn reader_get(&self, index: usize) -> &T {
        let c = self.load();
        assert!(index < Self::reader_avail_of(&c), "read past queued items");
        &self.slots[(c.start + index) % N]
    }

    /// Mutable access to item `index` positions past the reader cursor.
    ///
    /// # Panics
    ///
    /// Panics if `index >= reader_avail()`.
    pub fn reader_get_mut(&mut self, index: usize) -> &mut T {
        let c = self.load();
        assert!(index < Self::reader_avail_of(&c), "read past queued items");
        &mut self.slots[(c.start + index) % N]
    }

    /// Release `amount` items back to the producer.
    ///
    /// Returns `true` if this emptied the queue while the producer still
    /// owed items, which is counted as an underrun.
    ///
    /// # Panics
    ///
    /// Panics if `amount > reader_avail()`.
    pub fn reader_consume(&self, amount: usize) -> bool {
        self.update(|c| {
            assert!(amount <= Self::reader_avail_of(c), "consumed more than available");
            c.start = (c.start + amount) % N;
            if Self::reader_avail_of(c) == 0 && !c.finished && !c.drained {
                c.drained = true;
                c.underruns = c.underruns.wrapping_add(1);
                true
            } else {
                false
            }
        })
    }

    /// Whether the consumer has nothing to read.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reader_avail() == 0
    }

    /// Whether the producer has declared the stream complete.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.load().finished
    }

    /// Number of underruns since creation.
    #[inline]
    pub fn underruns(&self) -> u32 {
        self.load().underruns
    }

    /// Drop every queued item. Underrun count is preserved.
    pub fn clear(&self) {
        self.update(|c| {
            c.start = 0;
            c.end = 0;
            c.finished = true;
            c.drained = false;
        });
    }
}

impl<T: core::fmt::Debug, const N: usize> core::fmt::Debug for PlannerQueue<T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let c = self.load();
        f.debug_struct("PlannerQueue")
            .field("capacity", &N)
            .field("queued", &Self::reader_avail_of(&c))
            .field("finished", &c.finished)
            .field("underruns", &c.underruns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(queue: &mut PlannerQueue<u32, 4>, values: &[u32]) {
        for (i, v) in values.iter().enumerate() {
            *queue.writer_get_mut(i) = *v;
        }
        queue.writer_provide(values.len());
    }

    #[test]
    fn test_new_queue_is_empty() {
        let queue: PlannerQueue<u32, 4> = PlannerQueue::new();
        assert_eq!(queue.writer_avail(), 3);
        assert_eq!(queue.reader_avail(), 0);
        assert!(queue.is_empty());
        assert_eq!(PlannerQueue::<u32, 4>::USABLE, 3);
    }

    #[test]
    fn test_fifo_order_across_wrap() {
        let mut queue: PlannerQueue<u32, 4> = PlannerQueue::new();
        fill(&mut queue, &[1, 2, 3]);
        assert_eq!(queue.writer_avail(), 0);
        assert_eq!(*queue.reader_get(0), 1);
        queue.reader_consume(2);

        fill(&mut queue, &[4, 5]);
        let seen: [u32; 3] = [*queue.reader_get(0), *queue.reader_get(1), *queue.reader_get(2)];
        assert_eq!(seen, [3, 4, 5]);
        assert_eq!(queue.writer_avail() + queue.reader_avail() + 1, 4);
    }

    #[test]
    fn test_reader_get_mut_updates_slot() {
        let mut queue: PlannerQueue<u32, 4> = PlannerQueue::new();
        fill(&mut queue, &[7]);
        *queue.reader_get_mut(0) += 1;
        assert_eq!(*queue.reader_get(0), 8);
    }

    #[test]
    #[should_panic(expected = "provided more than available")]
    fn test_overprovide_panics() {
        let queue: PlannerQueue<u32, 4> = PlannerQueue::new();
        queue.writer_provide(4);
    }

    #[test]
    #[should_panic(expected = "read past queued items")]
    fn test_read_past_end_panics() {
        let queue: PlannerQueue<u32, 4> = PlannerQueue::new();
        let _ = queue.reader_get(0);
    }

    #[test]
    fn test_underrun_counted_once_per_drain() {
        let mut queue: PlannerQueue<u32, 4> = PlannerQueue::new();
        fill(&mut queue, &[1, 2]);

        assert!(!queue.reader_consume(1));
        assert!(queue.reader_consume(1));
        assert_eq!(queue.underruns(), 1);

        // Consuming nothing from an already drained queue is not a new event.
        assert!(!queue.reader_consume(0));
        assert_eq!(queue.underruns(), 1);

        fill(&mut queue, &[3]);
        assert!(queue.reader_consume(1));
        assert_eq!(queue.underruns(), 2);
    }

    #[test]
    fn test_finished_drain_is_not_underrun() {
        let mut queue: PlannerQueue<u32, 4> = PlannerQueue::new();
        fill(&mut queue, &[1, 2]);
        queue.writer_finish();
        assert!(!queue.reader_consume(2));
        assert_eq!(queue.underruns(), 0);
        assert!(queue.is_finished());
    }

    #[test]
    fn test_clear_empties() {
        let mut queue: PlannerQueue<u32, 4> = PlannerQueue::new();
        fill(&mut queue, &[1, 2, 3]);
        queue.clear();
        assert_eq!(queue.reader_avail(), 0);
        assert_eq!(queue.writer_avail(), 3);
        assert!(queue.is_finished());
    }
}
