//! Market data feed: order book tracking and poll scheduling.

mod liveness;
mod tracker;

pub use liveness::PollCadence;
pub use tracker::OrderBookTracker;
