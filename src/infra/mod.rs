//! Infrastructure layer
//!
//! Handles all I/O operations: filesystem, external processes and serial ports.
//! Core code reaches the OS through the traits defined here.

pub mod filesystem;
pub mod process;
pub mod retry;
pub mod serial;
