//! # cortical-cortexes
//!
//! Cortexes shipped with Cortical. Each module exposes a `factory` that
//! builds one fresh cortex per session from an explicit settings value.
//!
//! | Name         | Producer                       | Consumer                         |
//! |--------------|--------------------------------|----------------------------------|
//! | `echo`       | re-emits every received message| forwards to the producer         |
//! | `pong`       | `"pong"` once per message      | signals the producer             |
//! | `ping`       | payload every `interval_ms`    | none                             |
//! | `dummy`      | random delay, then the delay   | logs receipt                     |
//! | `memory`     | none                           | archives JPEG frames to disk     |
//! | `classifier` | best label as `"label (NN%)"`  | posts JPEG frames to an endpoint |
//!
//! [`CortexRegistry`] maps configured names to factories.

#![deny(unsafe_code)]

pub mod classifier;
pub mod dummy;
pub mod echo;
pub mod errors;
pub mod frame;
pub mod memory;
pub mod ping;
pub mod pong;
pub mod registry;

pub use errors::{CortexError, Result};
pub use frame::{DataUri, FramePayload};
pub use registry::CortexRegistry;
