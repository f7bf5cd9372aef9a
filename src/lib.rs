//! Snooping cache-coherence protocols (MSI, MESI, MOSI, MOESI) for a
//! bus-based multiprocessor cache simulator.
//!
//! [`protocol`] holds the per-line state machines. [`sim`] wires them into a
//! small discrete-event multiprocessor that replays memory traces.

#[macro_use]
extern crate log;

pub mod protocol;
pub mod sim;

pub use protocol::{CoherenceEngine, Protocol};
pub use sim::{simulate, Report, SimError, SystemSpec};
