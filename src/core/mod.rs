//! Core deploy logic
//!
//! Operating-system access goes through the seams in [`crate::infra`]
//! (process runner, serial enumerator and opener) so every component here can
//! be driven by stubs in tests.
//!
//! # Submodules
//!
//! - [`config`] - Configuration document (`RFSUITE_CONFIG`)
//! - [`targets`] - Target selection (defaults, all, interactive)
//! - [`sync`] - Crash-tolerant copy engine with extension and fast modes
//! - [`device`] - Vendor tool output parsing
//! - [`bridge`] - Ethos Suite vendor tool calls
//! - [`locator`] - Serial endpoint discovery
//! - [`tail`] - Serial debug log streaming
//! - [`minify`] - Lua minification
//! - [`simulator`] - Simulator launch
//! - [`orchestrator`] - Deploy state machine

pub mod bridge;
pub mod config;
pub mod device;
pub mod locator;
pub mod minify;
pub mod orchestrator;
pub mod simulator;
pub mod sync;
pub mod tail;
pub mod targets;
