//! Property tests for the lookahead planner and the planner queue.

use proptest::prelude::*;
use stepper_planner::planning::{pull, push, PlannerQueue, SegmentData, SegmentState};

const REL_EPS: f32 = 1e-4;

fn close_le(a: f32, b: f32) -> bool {
    a <= b + REL_EPS * b.abs().max(1.0)
}

/// `(a_x, max_v, junction)` per segment.
fn chain() -> impl Strategy<Value = Vec<(f32, f32, f32)>> {
    prop::collection::vec((1.0f32..1.0e4, 1.0f32..1.0e5, 0.0f32..1.0e5), 1..24)
}

fn build(chain: &[(f32, f32, f32)]) -> Vec<SegmentData> {
    let mut prev_max_v = 0.0;
    chain
        .iter()
        .map(|&(a_x, max_v, junction)| {
            let segment = SegmentData::new(prev_max_v, junction, max_v, a_x);
            prev_max_v = max_v;
            segment
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_chain_is_consistent(chain in chain()) {
        let segments = build(&chain);
        let mut states = vec![SegmentState::default(); segments.len()];

        let mut v = 0.0;
        for i in (0..segments.len()).rev() {
            v = push(&segments[i], &mut states[i], v);
        }

        let mut start_v = 0.0f32;
        for (segment, state) in segments.iter().zip(states.iter()) {
            prop_assert!(start_v <= segment.max_start_v);
            let (end_v, result) = pull(segment, state, start_v);

            prop_assert!(end_v >= 0.0);
            prop_assert!(close_le(end_v, segment.max_v));
            prop_assert!(close_le(result.const_v, segment.max_v));
            prop_assert!(result.const_start >= -REL_EPS && result.const_end >= -REL_EPS);
            prop_assert!(close_le(result.const_start + result.const_end, 1.0));

            // Neither boundary may need more than the segment's headroom.
            prop_assert!(close_le(end_v, start_v + segment.a_x));
            prop_assert!(close_le(start_v, end_v + segment.a_x));
            start_v = end_v;
        }
        prop_assert_eq!(start_v, 0.0);
    }

    #[test]
    fn prop_push_never_raises_limits(chain in chain(), end_v in 0.0f32..1.0e5) {
        let segments = build(&chain);
        let mut states = vec![SegmentState::default(); segments.len()];

        let mut v = end_v;
        for i in (0..segments.len()).rev() {
            v = push(&segments[i], &mut states[i], v);
            prop_assert!(v <= segments[i].max_start_v);
            prop_assert!(states[i].end_v().unwrap() <= segments[i].max_v);
        }
    }

    #[test]
    fn prop_queue_availability(ops in prop::collection::vec((any::<bool>(), 0usize..8), 0..64)) {
        let mut queue: PlannerQueue<u32, 8> = PlannerQueue::new();
        let mut expected = std::collections::VecDeque::new();
        let mut next = 0u32;

        for (write, amount) in ops {
            if write {
                let amount = amount.min(queue.writer_avail());
                for i in 0..amount {
                    *queue.writer_get_mut(i) = next;
                    expected.push_back(next);
                    next += 1;
                }
                queue.writer_provide(amount);
            } else {
                let amount = amount.min(queue.reader_avail());
                for i in 0..amount {
                    prop_assert_eq!(*queue.reader_get(i), expected[i]);
                }
                queue.reader_consume(amount);
                expected.drain(..amount);
            }
            prop_assert_eq!(queue.writer_avail() + queue.reader_avail() + 1, 8);
            prop_assert_eq!(queue.reader_avail(), expected.len());
        }
    }
}
