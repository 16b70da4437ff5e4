//! Lodestar CLI library
//!
//! Runs a host and a set of plugins over the in-process hub so the bridge can
//! be exercised and inspected from a terminal.

pub mod cli;
pub mod commands;
pub mod config;
