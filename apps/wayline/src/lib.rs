//! # wayline
//!
//! Library half of the Wayline developer CLI: command definitions and the
//! navigation script replayer, exposed for integration tests.

pub mod cli;
pub mod script;
