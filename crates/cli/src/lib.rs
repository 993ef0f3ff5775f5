//! splitter command-line front end
//!
//! Wires configuration, logging and the split emitter around the watch
//! supervisor.

pub mod cmd;
pub mod daemon;
pub mod emit;
pub mod logging;
