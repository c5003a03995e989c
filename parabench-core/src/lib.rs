#![warn(missing_docs)]
//! Parabench Core - Execution Engine
//!
//! This crate runs an arbitrary executable N times under a chosen
//! scheduling strategy and produces one raw measurement per iteration:
//! - [`ProcessRunner`] spawns and reaps a single child, capturing wall
//!   time, CPU time, peak resident memory and exit status
//! - [`Strategy`] schedules the iterations (sequential, thread pool,
//!   forked processes, or isolated shells)
//! - [`collect`] orders the raw samples and fail-fast verifies that every
//!   requested iteration is present exactly once
//! - [`CancelToken`] carries the single cancellation signal a run honors

mod cancel;
mod collector;
mod frame;
mod runner;
mod sample;
mod strategy;

pub use cancel::CancelToken;
pub use collector::{collect, CollectError};
pub use frame::{read_frame, write_frame, FrameError, MAX_FRAME_SIZE};
pub use runner::ProcessRunner;
pub use sample::{
    Sample, METRIC_CPU_TIME_MS, METRIC_NAMES, METRIC_PEAK_MEMORY_KB, METRIC_WALL_TIME_MS,
};
pub use strategy::{default_concurrency_cap, Strategy, StrategyError};
