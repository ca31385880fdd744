//! Controller to mouse/keyboard remapping engine.
//!
//! # Architecture
//!
//! ```text
//! Config ──► BindingTable ──┐
//!                           ▼
//! InputSource ──► Detector ──► Executor ──► OutputSink
//!  (gilrs)       (edges,      (ramps,       (Win32 / rdev /
//!                 layers)      motion)       dry-run)
//! ```
//!
//! - [`binding`] - binding model, expression grammar and lookup table
//! - [`device`] - input capability, device registry, gilrs backend
//! - [`output`] - output capability, Win32 and rdev backends, recording dry-run sink
//! - [`engine`] - detector, executor and the tick lifecycle
//! - [`config`] - TOML settings

pub mod binding;
pub mod config;
pub mod device;
pub mod engine;
pub mod output;
