//! The execution substrate.
//!
//! This module provides the concurrency layer tasks run on:
//! - [`SubstrateBuilder`] to configure and create a [`Substrate`],
//! - [`SubstrateHandle`] to start units of work and observe quiescence,
//! - [`UnitHandle`] to interrupt a running unit,
//! - free functions units use to observe interrupts cooperatively.
//!
//! Every unit of work gets its own thread for its whole lifetime.

mod builder;
mod core;
mod unit;

pub(crate) mod context;

pub use builder::SubstrateBuilder;
pub use context::{checkpoint, is_interrupted, sleep};
pub use self::core::{Substrate, SubstrateHandle};
pub use unit::{UnitHandle, UnitId};
