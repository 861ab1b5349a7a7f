//! Transport-agnostic dispatch primitives.
//!
//! Inbound messages go through [`fan_out`] to one channel per consumer worker.
//! Producer workers each feed their own channel, and [`merge`] collapses those
//! into the single outbound stream. Every worker owns a [`StopSignal`].

pub mod fan_out;
pub mod merge;
pub mod worker;

pub use fan_out::fan_out;
pub use merge::merge;
pub use worker::{StopSignal, spawn_consumer, spawn_producer};
