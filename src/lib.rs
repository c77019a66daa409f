//! LabWatch Client
//!
//! Real-time monitoring client for a lab-occupancy sensing backend.
//!
//! ## Architecture
//!
//! 1. BackendClient - typed HTTP adapter for the sensing backend
//! 2. PollLoop - one stream's cadence and in-flight discipline
//! 3. SessionController - navigation state machine, owns the live loops
//! 4. AlertTracker - watermark cursor over the incremental alert feed
//! 5. SnapshotStore - latest immutable value per stream
//! 6. ViewHub - snapshot distribution to renderers
//! 7. Report - on-demand export serialization
//!
//! ## Design Principles
//!
//! - The SessionController is the only writer of shared context
//! - At most one in-flight request per stream, ticks skip when busy
//! - Stale results from abandoned contexts are discarded, never rendered

pub mod alert_tracker;
pub mod backend_client;
pub mod error;
pub mod models;
pub mod poll_loop;
pub mod renderer;
pub mod report;
pub mod session_controller;
pub mod snapshot;
pub mod state;
pub mod view_hub;

pub use error::{Error, Result};
pub use state::AppConfig;
