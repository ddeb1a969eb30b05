//! Subdivision of one move into bounded-length sub-segments.

use crate::config::SplitterConfig;

/// Upper bound on the number of sub-segments of one move.
pub const MAX_SPLIT_COUNT: u32 = 1 << 31;

/// Lazily yields the fractional checkpoints of one move.
///
/// Each checkpoint is the fraction of the move covered at the end of a
/// sub-segment, paired with the reciprocal speed limit scale of that
/// sub-segment. Fractions strictly increase and the last one is exactly
/// `1.0`. They are `f64` so that neighbouring checkpoints stay distinct up
/// to [`MAX_SPLIT_COUNT`].
#[derive(Debug, Clone)]
pub struct DistanceSplitter {
    min_split_length_rec: f32,
    max_split_length_rec: f32,
    segments_per_tick: f32,
    count: u32,
    pos: u32,
    max_v_rec: f32,
}

impl DistanceSplitter {
    /// Create an idle splitter.
    pub fn new(config: &SplitterConfig, clock_frequency_hz: u32) -> Self {
        Self {
            min_split_length_rec: 1.0 / config.min_split_length.0,
            max_split_length_rec: 1.0 / config.max_split_length.0,
            segments_per_tick: config.segments_per_second / clock_frequency_hz as f32,
            count: 0,
            pos: 0,
            max_v_rec: 0.0,
        }
    }

    /// Begin splitting a move.
    ///
    /// `base_max_v_rec` is the shortest time the whole move may take and
    /// `time_freq_by_max_speed` the number of timer ticks per millimetre at
    /// the move's speed limit. The count is the smallest that keeps every
    /// sub-segment under the maximum length and, density permitting, honours
    /// the segments-per-second target without going under the minimum
    /// length.
    pub fn start(&mut self, distance: f32, base_max_v_rec: f32, time_freq_by_max_speed: f32) {
        let density = self.segments_per_tick * time_freq_by_max_speed;
        let per_mm = self
            .min_split_length_rec
            .min(self.max_split_length_rec.max(density));
        let fpcount = libm::ceilf(distance * per_mm);

        self.count = if fpcount >= MAX_SPLIT_COUNT as f32 {
            MAX_SPLIT_COUNT
        } else if fpcount >= 1.0 {
            fpcount as u32
        } else {
            1
        };
        self.pos = 0;
        self.max_v_rec = base_max_v_rec / self.count as f32;

        trace!("split {} mm into {}", distance, self.count);
    }

    /// Number of sub-segments of the current move.
    #[inline]
    pub fn split_count(&self) -> u32 {
        self.count
    }

    /// Whether checkpoints remain.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.pos < self.count
    }

    /// Abandon the current move.
    pub fn stop(&mut self) {
        self.pos = self.count;
    }

    /// Produce the next `(rel_max_v_rec, frac)` checkpoint, or `None` once
    /// the move is exhausted.
    pub fn pull(&mut self) -> Option<(f32, f64)> {
        if self.pos >= self.count {
            return None;
        }
        self.pos += 1;
        let frac = if self.pos == self.count {
            1.0
        } else {
            self.pos as f64 / self.count as f64
        };
        Some((self.max_v_rec, frac))
    }
}

impl Iterator for DistanceSplitter {
    type Item = (f32, f64);

    fn next(&mut self) -> Option<Self::Item> {
        self.pull()
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        let left = self.count - self.pos;
        self.pos += (n.min(left as usize)) as u32;
        self.pull()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count.saturating_sub(self.pos) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::Millimeters;

    fn splitter(min: f32, max: f32, segments_per_second: f32) -> DistanceSplitter {
        let config = SplitterConfig {
            min_split_length: Millimeters(min),
            max_split_length: Millimeters(max),
            segments_per_second,
        };
        DistanceSplitter::new(&config, 1 << 20)
    }

    #[test]
    fn test_count_within_length_bounds() {
        let mut s = splitter(10.0, 100.0, 0.0);
        s.start(1000.0, 10.0, 10_000.0);
        assert!((10..=100).contains(&s.split_count()));

        let count = s.split_count() as usize;
        let fracs: heapless::Vec<f64, 128> = s.by_ref().map(|(_, f)| f).collect();
        assert_eq!(fracs.len(), count);
        assert!(fracs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*fracs.last().unwrap(), 1.0);
        assert_eq!(s.pull(), None);
    }

    #[test]
    fn test_density_bounded_by_min_length() {
        // 1024 segments/s at 4096 ticks/mm would ask for 4 per mm.
        let mut s = splitter(0.5, 4.0, 1024.0);
        s.start(8.0, 1.0, 4096.0);
        assert_eq!(s.split_count(), 16);

        // A moderate density lands between the bounds.
        let mut s = splitter(0.25, 4.0, 64.0);
        s.start(8.0, 1.0, 8192.0);
        assert_eq!(s.split_count(), 4);
    }

    #[test]
    fn test_short_move_single_piece() {
        let mut s = splitter(0.1, 4.0, 0.0);
        s.start(0.05, 0.5, 1.0);
        assert_eq!(s.split_count(), 1);
        let (rec, frac) = s.pull().unwrap();
        assert_eq!(frac, 1.0);
        assert_eq!(rec, 0.5);
        assert!(!s.is_active());
    }

    #[test]
    fn test_rate_scale_divided() {
        let mut s = splitter(0.1, 4.0, 0.0);
        s.start(8.0, 2.0, 1.0);
        assert_eq!(s.split_count(), 2);
        assert_eq!(s.size_hint(), (2, Some(2)));
        assert_eq!(s.pull(), Some((1.0, 0.5)));
        assert_eq!(s.pull(), Some((1.0, 1.0)));
    }

    #[test]
    fn test_large_count_fractions_stay_distinct() {
        // 2000 mm at 1e6 segments/s and 1 mm/s asks for 2e7 pieces.
        let mut s = splitter(1e-4, 4.0, 1e6);
        s.start(2000.0, 2000.0, (1u32 << 20) as f32);
        let count = s.split_count();
        assert_eq!(count, 20_000_000);

        let (_, mut prev) = s.nth(count as usize - 41).unwrap();
        for (_, frac) in s.by_ref() {
            assert!(frac > prev);
            prev = frac;
        }
        assert_eq!(prev, 1.0);
    }

    #[test]
    fn test_nth_skips_checkpoints() {
        let mut s = splitter(0.1, 1.0, 0.0);
        s.start(10.0, 1.0, 1.0);
        assert_eq!(s.nth(4), Some((0.1, 0.5)));
        assert_eq!(s.size_hint(), (5, Some(5)));
        assert_eq!(s.nth(10), None);
    }

    #[test]
    fn test_count_saturates() {
        let mut s = splitter(1e-6, 1e-6, 0.0);
        s.start(1e6, 1.0, 1.0);
        assert_eq!(s.split_count(), MAX_SPLIT_COUNT);
        s.stop();
        assert_eq!(s.pull(), None);
    }
}
