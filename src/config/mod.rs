//! Configuration constants
//!
//! Compile-time defaults. The runtime configuration document is handled by
//! [`crate::core::config`].

pub mod defaults;
