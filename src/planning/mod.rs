//! Lookahead planning: move geometry, splitting, junction velocities and
//! the queues connecting them.

pub mod geometry;
pub mod linear;
pub mod queue;
pub mod splitter;

pub use geometry::{MoveGeometry, MoveRequest, Segment, SegmentGeometryModel};
pub use linear::{pull, push, SegmentData, SegmentResult, SegmentState};
pub use queue::PlannerQueue;
pub use splitter::DistanceSplitter;
