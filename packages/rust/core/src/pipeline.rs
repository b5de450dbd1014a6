//! End-to-end `enhance` run: classpath → loader → registry → walk → orchestrate.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use classweave_enhancers::{EnhancerCatalog, EnhancerRegistry};
use classweave_loader::{CacheStats, Classpath, IsolatedLoader};
use classweave_shared::{
    AppConfig, BinaryName, EligibilityClass, EnhancerEntry, PersistenceWarning, Result, RunId,
};

use crate::orchestrator::{EnhancedArtifact, EnhancerTiming, Orchestrator};
use crate::persist::{ArtifactWriter, FsWriter};
use crate::walker;

/// Configuration for one enhancement run.
#[derive(Debug, Clone)]
pub struct EnhanceConfig {
    /// Local output root holding the artifacts to enhance.
    pub classes_dir: PathBuf,
    /// Resolved dependency locations, in declared order.
    pub classpath: Vec<PathBuf>,
    /// Descend into subdirectories of `classes_dir`.
    pub recurse: bool,
    /// Encoding handed to enhancers.
    pub encoding: String,
    /// Enhancers in application order.
    pub enhancers: Vec<EnhancerEntry>,
}

impl From<&AppConfig> for EnhanceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            classes_dir: PathBuf::from(&config.build.classes_dir),
            classpath: config.build.classpath.iter().map(PathBuf::from).collect(),
            recurse: config.defaults.recurse,
            encoding: config.defaults.effective_encoding().to_string(),
            enhancers: config.enhancers.clone(),
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub classes_dir: PathBuf,
    /// Binary artifacts the walk yielded.
    pub visited: usize,
    /// Artifacts that went through the enhancer chain.
    pub enhanced: usize,
    /// Successful write-backs.
    pub writes: usize,
    /// Ineligible artifacts by classification.
    pub skipped: BTreeMap<EligibilityClass, usize>,
    pub source_files_skipped: usize,
    pub persistence_warnings: Vec<PersistenceWarning>,
    pub timings: Vec<EnhancerTiming>,
    pub artifacts: Vec<EnhancedArtifact>,
    pub cache: CacheStats,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl RunSummary {
    /// Write failures that no later write of the same file made good.
    pub fn lost_writes(&self) -> impl Iterator<Item = &PersistenceWarning> {
        self.persistence_warnings.iter().filter(|w| !w.recovered)
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before an artifact is resolved. `index` starts at 1.
    fn artifact_started(&self, name: &BinaryName, index: usize);
    /// Called when an artifact is not eligible.
    fn artifact_skipped(&self, name: &BinaryName, eligibility: EligibilityClass);
    /// Called after every enhancer ran on an artifact.
    fn artifact_enhanced(&self, name: &BinaryName, writes: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn artifact_started(&self, _name: &BinaryName, _index: usize) {}
    fn artifact_skipped(&self, _name: &BinaryName, _eligibility: EligibilityClass) {}
    fn artifact_enhanced(&self, _name: &BinaryName, _writes: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the enhancement pipeline, writing through the filesystem.
///
/// The registry is built from `config.enhancers` before anything on disk is
/// touched, so an unknown enhancer id fails the run up front.
pub fn run(
    config: &EnhanceConfig,
    catalog: &EnhancerCatalog,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    progress.phase("Loading enhancers");
    let registry = EnhancerRegistry::from_config(&config.enhancers, catalog)?;
    let mut writer = FsWriter;
    run_with_writer(config, &registry, &mut writer, progress)
}

/// Run the enhancement pipeline with a caller-supplied registry and writer.
///
/// 1. Check the classes directory and start the walk
/// 2. Resolve the classpath and create the isolated loader
/// 3. Push every artifact through the orchestrator, stopping at the first error
///
/// The loader and its cache live only for this call. They are dropped on
/// every exit path.
#[instrument(skip_all, fields(classes = %config.classes_dir.display()))]
pub fn run_with_writer(
    config: &EnhanceConfig,
    registry: &EnhancerRegistry,
    writer: &mut dyn ArtifactWriter,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let run_id = RunId::new();

    match std::env::current_dir() {
        Ok(cwd) => info!(%run_id, cwd = %cwd.display(), "starting enhancement run"),
        Err(e) => info!(%run_id, error = %e, "starting enhancement run (current dir unavailable)"),
    }

    // --- Phase 1: Walk ---
    let mut walk = walker::walk(&config.classes_dir, config.recurse)?;

    // --- Phase 2: Classpath & loader ---
    progress.phase("Resolving classpath");
    let classpath = Classpath::resolve(&config.classes_dir, &config.classpath)?;
    debug!(dependencies = classpath.dependencies().len(), "creating isolated loader");
    let loader = IsolatedLoader::new(classpath);

    // --- Phase 3: Enhance ---
    progress.phase("Enhancing classes");
    let mut orchestrator =
        Orchestrator::new(&loader, registry, writer, progress, &config.encoding);
    for artifact in walk.by_ref() {
        let artifact = artifact?;
        orchestrator.process(&artifact)?;
    }
    let stats = orchestrator.into_stats();

    let summary = RunSummary {
        run_id,
        classes_dir: config.classes_dir.clone(),
        visited: stats.visited,
        enhanced: stats.enhanced,
        writes: stats.writes,
        skipped: stats.skipped,
        source_files_skipped: walk.skipped_sources().len(),
        persistence_warnings: stats.warnings,
        timings: stats.timings,
        artifacts: stats.artifacts,
        cache: loader.cache_stats(),
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        completed_at: Utc::now(),
    };

    info!(
        visited = summary.visited,
        enhanced = summary.enhanced,
        writes = summary.writes,
        skipped = summary.skipped_total(),
        elapsed_ms = summary.elapsed_ms,
        "enhancement run complete"
    );
    progress.done(&summary);
    Ok(summary)
}
