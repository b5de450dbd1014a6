//! Enhancement run orchestration for classweave.
//!
//! This crate ties the walker, the isolated loader and the enhancer registry
//! together into one synchronous run (see [`pipeline::run`]).

pub mod orchestrator;
pub mod persist;
pub mod pipeline;
pub mod walker;

pub use orchestrator::{
    ArtifactOutcome, EnhancedArtifact, EnhancerTiming, Orchestrator, OrchestratorStats, classify,
};
pub use persist::{ArtifactWriter, FsWriter};
pub use pipeline::{
    EnhanceConfig, ProgressReporter, RunSummary, SilentProgress, run, run_with_writer,
};
pub use walker::{ArtifactPath, ArtifactWalk, walk};
