//! autopilot library: the binary's modules, exposed for integration testing.

pub mod browser;
pub mod cli;
pub mod config;
pub mod logging;
