//! Per-artifact enhancement: resolve, classify, apply every enhancer in
//! registry order and write back after each one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use classweave_classfile::ClassFile;
use classweave_enhancers::{EnhanceContext, EnhancerRegistry};
use classweave_loader::{ArtifactDescription, IsolatedLoader, SharedArtifact};
use classweave_shared::{
    BinaryName, ClassweaveError, EligibilityClass, EnhancerDescriptor, MODULE_MARKER,
    PACKAGE_MARKER, PersistenceWarning, Result,
};

use crate::persist::ArtifactWriter;
use crate::pipeline::ProgressReporter;
use crate::walker::ArtifactPath;

const PRIMITIVE_NAMES: [&str; 9] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

const PERMITTED_SUBCLASSES: &str = "PermittedSubclasses";

/// Decide whether an artifact is handed to transformers.
///
/// Checks run in a fixed order. Annotations carry the interface flag too, so
/// they are recognised before interfaces. Classes loaded from an archive are
/// frozen, and a `PermittedSubclasses` attribute marks a sealed class; both
/// are [`EligibilityClass::FrozenOrSealed`].
pub fn classify(class: &ClassFile, description: &ArtifactDescription) -> EligibilityClass {
    let name = description.name().as_str();

    if name.starts_with('[') || name.ends_with("[]") {
        return EligibilityClass::ArrayType;
    }
    if PRIMITIVE_NAMES.contains(&name) {
        return EligibilityClass::PrimitiveType;
    }
    let simple = description.name().simple_name();
    if simple == PACKAGE_MARKER
        || simple == MODULE_MARKER
        || name.ends_with(".package")
        || class.is_module()
    {
        return EligibilityClass::PackageMarker;
    }
    if class.is_annotation() {
        return EligibilityClass::Annotation;
    }
    if class.is_interface() {
        return EligibilityClass::Interface;
    }
    if class.is_enum() {
        return EligibilityClass::Enum;
    }
    if description.is_frozen() || class.has_attribute(PERMITTED_SUBCLASSES) {
        return EligibilityClass::FrozenOrSealed;
    }
    EligibilityClass::Concrete
}

/// What happened to one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Not eligible; no enhancer ran and nothing was written.
    Skipped {
        name: BinaryName,
        eligibility: EligibilityClass,
    },
    /// Every registered enhancer ran.
    Enhanced {
        name: BinaryName,
        /// Write-backs attempted, one per enhancer.
        writes: usize,
        /// Write-backs that failed.
        failed_writes: usize,
    },
}

/// Accumulated time spent in one enhancer across the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnhancerTiming {
    pub id: String,
    pub version: String,
    pub position: usize,
    pub invocations: usize,
    pub total_micros: u64,
}

impl EnhancerTiming {
    fn new(descriptor: &EnhancerDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            version: descriptor.version.clone(),
            position: descriptor.position,
            invocations: 0,
            total_micros: 0,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.invocations += 1;
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros = self.total_micros.saturating_add(micros);
    }
}

/// Final state of an artifact that went through the enhancer chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnhancedArtifact {
    pub name: BinaryName,
    pub path: PathBuf,
    /// Whether any enhancer changed the bytes.
    pub modified: bool,
    /// Digest of the final in-memory bytes.
    pub sha256: String,
    /// Whether the last write-back reached disk.
    pub persisted: bool,
}

/// Counters collected while processing artifacts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorStats {
    pub visited: usize,
    pub enhanced: usize,
    pub writes: usize,
    pub failed_writes: usize,
    pub skipped: BTreeMap<EligibilityClass, usize>,
    pub warnings: Vec<PersistenceWarning>,
    pub timings: Vec<EnhancerTiming>,
    pub artifacts: Vec<EnhancedArtifact>,
}

/// Drives one artifact at a time through the registry.
pub struct Orchestrator<'a> {
    loader: &'a IsolatedLoader,
    registry: &'a EnhancerRegistry,
    writer: &'a mut dyn ArtifactWriter,
    progress: &'a dyn ProgressReporter,
    encoding: &'a str,
    stats: OrchestratorStats,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        loader: &'a IsolatedLoader,
        registry: &'a EnhancerRegistry,
        writer: &'a mut dyn ArtifactWriter,
        progress: &'a dyn ProgressReporter,
        encoding: &'a str,
    ) -> Self {
        let timings = registry
            .ordered()
            .iter()
            .map(|r| EnhancerTiming::new(r.descriptor()))
            .collect();
        Self {
            loader,
            registry,
            writer,
            progress,
            encoding,
            stats: OrchestratorStats {
                timings,
                ..OrchestratorStats::default()
            },
        }
    }

    /// Process one discovered artifact.
    ///
    /// Every failure comes back as [`ClassweaveError::Transform`] naming the
    /// relative file, with the underlying cause as its source.
    pub fn process(&mut self, path: &ArtifactPath) -> Result<ArtifactOutcome> {
        self.process_artifact(path)
            .map_err(|e| ClassweaveError::transform(path.relative.display().to_string(), e))
    }

    pub fn stats(&self) -> &OrchestratorStats {
        &self.stats
    }

    pub fn into_stats(self) -> OrchestratorStats {
        self.stats
    }

    fn process_artifact(&mut self, path: &ArtifactPath) -> Result<ArtifactOutcome> {
        let name = BinaryName::from_relative_path(&path.relative)?;
        self.stats.visited += 1;
        self.progress.artifact_started(&name, self.stats.visited);

        let shared = self.loader.resolve(&name)?;
        let (eligibility, target) = {
            let description = borrow(&shared, &name)?;
            let class = description.class_file()?;
            let target = description
                .file_path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.absolute.clone());
            (classify(&class, &description), target)
        };

        if !eligibility.is_concrete() {
            debug!(class = %name, %eligibility, "not eligible, skipping");
            *self.stats.skipped.entry(eligibility).or_default() += 1;
            self.progress.artifact_skipped(&name, eligibility);
            return Ok(ArtifactOutcome::Skipped { name, eligibility });
        }

        let ctx = EnhanceContext {
            loader: self.loader,
            encoding: self.encoding,
        };
        let mut writes = 0;
        let mut failed_writes = 0;
        let mut persisted = true;
        let registry = self.registry;

        for registered in registry.ordered() {
            let descriptor = registered.descriptor();
            let started = Instant::now();
            {
                let mut description = shared.try_borrow_mut().map_err(|_| {
                    ClassweaveError::InUse {
                        name: name.to_string(),
                    }
                })?;
                registered
                    .enhancer()
                    .enhance(&mut description, &ctx)
                    .map_err(|source| ClassweaveError::Enhancement {
                        enhancer: descriptor.id.clone(),
                        version: descriptor.version.clone(),
                        class_name: name.to_string(),
                        source,
                    })?;
            }
            let elapsed = started.elapsed();
            debug!("{}ms to apply {descriptor} to {name}", elapsed.as_millis());
            if let Some(timing) = self.stats.timings.get_mut(descriptor.position) {
                timing.record(elapsed);
            }

            let bytes = borrow(&shared, &name)?.bytes().to_vec();
            writes += 1;
            persisted = self.persist(&name, descriptor, &target, &bytes);
            if !persisted {
                failed_writes += 1;
            }
        }

        let description = borrow(&shared, &name)?;
        self.stats.enhanced += 1;
        self.stats.artifacts.push(EnhancedArtifact {
            name: name.clone(),
            path: target,
            modified: description.is_modified(),
            sha256: format!("{:x}", Sha256::digest(description.bytes())),
            persisted,
        });
        drop(description);

        self.progress.artifact_enhanced(&name, writes);
        Ok(ArtifactOutcome::Enhanced {
            name,
            writes,
            failed_writes,
        })
    }

    /// Write the current bytes back. A failure is recorded and logged, never
    /// returned. A success marks earlier failures for the same file recovered.
    fn persist(
        &mut self,
        name: &BinaryName,
        descriptor: &EnhancerDescriptor,
        target: &Path,
        bytes: &[u8],
    ) -> bool {
        match self.writer.write(target, bytes) {
            Ok(()) => {
                self.stats.writes += 1;
                for warning in self
                    .stats
                    .warnings
                    .iter_mut()
                    .filter(|w| w.path == target && !w.recovered)
                {
                    warning.recovered = true;
                    debug!(class = %name, after = %descriptor, "earlier write failure recovered");
                }
                trace!(class = %name, path = %target.display(), "persisted after {descriptor}");
                true
            }
            Err(e) => {
                let warning = PersistenceWarning {
                    path: target.to_path_buf(),
                    class_name: name.to_string(),
                    enhancer: descriptor.to_string(),
                    message: e.to_string(),
                    recovered: false,
                };
                warn!(
                    class = %name,
                    path = %target.display(),
                    enhancer = %descriptor,
                    error = %e,
                    "write-back failed, continuing with in-memory bytes"
                );
                self.stats.failed_writes += 1;
                self.stats.warnings.push(warning);
                false
            }
        }
    }
}

fn borrow<'s>(
    shared: &'s SharedArtifact,
    name: &BinaryName,
) -> Result<std::cell::Ref<'s, ArtifactDescription>> {
    shared.try_borrow().map_err(|_| ClassweaveError::InUse {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use classweave_classfile::{ClassFileBuilder, access};
    use classweave_loader::{ArtifactOrigin, FoundClass};

    fn describe(
        name: &str,
        origin: ArtifactOrigin,
        bytes: Vec<u8>,
    ) -> (ClassFile, ArtifactDescription) {
        let class = ClassFile::parse(&bytes).unwrap();
        let desc = ArtifactDescription::new(BinaryName::new(name), FoundClass { origin, bytes });
        (class, desc)
    }

    fn file(name: &str, bytes: Vec<u8>) -> (ClassFile, ArtifactDescription) {
        describe(
            name,
            ArtifactOrigin::File(PathBuf::from(format!("/tmp/{name}.class"))),
            bytes,
        )
    }

    #[test]
    fn classifies_by_kind() {
        let (c, d) = file(
            "com.example.User",
            ClassFileBuilder::new("com/example/User").build().unwrap(),
        );
        assert_eq!(classify(&c, &d), EligibilityClass::Concrete);

        let (c, d) = file(
            "com.example.Repo",
            ClassFileBuilder::interface_type("com/example/Repo").build().unwrap(),
        );
        assert_eq!(classify(&c, &d), EligibilityClass::Interface);

        let (c, d) = file(
            "com.example.Marker",
            ClassFileBuilder::annotation_type("com/example/Marker").build().unwrap(),
        );
        assert_eq!(classify(&c, &d), EligibilityClass::Annotation);

        let (c, d) = file(
            "com.example.Color",
            ClassFileBuilder::enum_type("com/example/Color")
                .build()
                .unwrap(),
        );
        assert_eq!(classify(&c, &d), EligibilityClass::Enum);
    }

    #[test]
    fn classifies_by_name() {
        let plain = || ClassFileBuilder::new("x/Y").build().unwrap();

        let (c, d) = file("com.example.package-info", plain());
        assert_eq!(classify(&c, &d), EligibilityClass::PackageMarker);
        let (c, d) = file("module-info", plain());
        assert_eq!(classify(&c, &d), EligibilityClass::PackageMarker);
        let (c, d) = file("int", plain());
        assert_eq!(classify(&c, &d), EligibilityClass::PrimitiveType);
        let (c, d) = file("com.example.User[]", plain());
        assert_eq!(classify(&c, &d), EligibilityClass::ArrayType);
        let (c, d) = file("[Lcom.example.User;", plain());
        assert_eq!(classify(&c, &d), EligibilityClass::ArrayType);
    }

    #[test]
    fn module_flag_is_a_package_marker() {
        let bytes = ClassFileBuilder::new("module-descriptor")
            .access(access::MODULE)
            .no_super_class()
            .build()
            .unwrap();
        let (c, d) = file("com.example.Descriptor", bytes);
        assert_eq!(classify(&c, &d), EligibilityClass::PackageMarker);
    }

    #[test]
    fn archive_origin_is_frozen() {
        let (c, d) = describe(
            "com.lib.Helper",
            ArtifactOrigin::Archive {
                archive: PathBuf::from("/tmp/lib.jar"),
                entry: "com/lib/Helper.class".into(),
            },
            ClassFileBuilder::new("com/lib/Helper").build().unwrap(),
        );
        assert_eq!(classify(&c, &d), EligibilityClass::FrozenOrSealed);
    }

    #[test]
    fn sealed_class_is_not_enhanced() {
        let bytes = ClassFileBuilder::new("com/example/Shape")
            .attribute("PermittedSubclasses", vec![0, 0])
            .build()
            .unwrap();
        let (c, d) = file("com.example.Shape", bytes);
        assert_eq!(classify(&c, &d), EligibilityClass::FrozenOrSealed);
    }

    #[test]
    fn timing_accumulates() {
        let descriptor = EnhancerDescriptor {
            id: "inject-field".into(),
            version: "1.0.0".into(),
            position: 0,
        };
        let mut timing = EnhancerTiming::new(&descriptor);
        timing.record(Duration::from_micros(1500));
        timing.record(Duration::from_micros(500));
        assert_eq!(timing.invocations, 2);
        assert_eq!(timing.total_micros, 2000);
    }
}
