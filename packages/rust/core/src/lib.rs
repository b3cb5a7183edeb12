//! Pipeline orchestration for Pricewatch.
//!
//! This crate wires the collaborators together:
//! - [`retry`] — the per-stage retry/timeout policy
//! - [`pipeline`] — the scrape/rate/transform/load task graph and run history
//!
//! The CLI calls [`run_pipeline`] with a loaded [`pricewatch_shared::AppConfig`].

pub mod pipeline;
pub mod retry;

pub use pipeline::{PipelineError, ProgressReporter, RunReport, SilentProgress, run_pipeline};
pub use retry::{RetryPolicy, Stage, StageFailure, run_stage};
