//! rfdeploy - deploy Lua suites to Ethos radios and simulators
//!
//! Copies a build tree onto simulator folders or a connected radio's drive
//! without leaving half-written folders behind, and bridges into the radio's
//! serial debug channel.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Deploy logic: copy engine, vendor bridge, serial tail, orchestration
//! - [`infra`] - Infrastructure layer (filesystem, processes, serial ports, retries)
//! - [`config`] - Constants and defaults
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
