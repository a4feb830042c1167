//! # ambilux: ambient lighting host
//!
//! Foreground service that turns a stream of screen frames into border
//! zone colors and drives an LED controller over a serial line or UDP.
//!
//! ## Sources
//!
//! - **Raw**: packed RGB24 frames of the configured size from a file,
//!   FIFO, or stdin (`--input`).
//! - **Pattern**: a synthetic hue sweep for checking a strip (`--pattern`).

pub mod config;
pub mod preview;
pub mod service;
pub mod source;
