//! Classpath resolution: the ordered, deduplicated list of search locations.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use classweave_shared::{ClassweaveError, Result};
use tracing::debug;
use url::Url;

use crate::source::{ArchiveSource, ClassSource, DirectorySource, SourceChain};

/// How a classpath location stores its classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// A directory tree of `.class` files.
    Directory,
    /// A `.jar` or `.zip` archive.
    Archive,
}

/// One resolved search location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClasspathLocation {
    /// Absolute filesystem path.
    pub path: PathBuf,
    /// `file:` URL of the location (directory URLs end in `/`).
    pub url: Url,
    pub kind: LocationKind,
}

/// Ordered search locations. Index 0 is always the local output root.
#[derive(Debug, Clone)]
pub struct Classpath {
    locations: Vec<ClasspathLocation>,
}

impl Classpath {
    /// Build the classpath: `output_root` first, then each dependency in order.
    ///
    /// Duplicates (by URL) keep their first position, so a dependency that
    /// names the output root again is dropped. The output root itself need
    /// not exist yet; dependencies must.
    pub fn resolve(output_root: &Path, dependencies: &[PathBuf]) -> Result<Self> {
        let root_path = absolutize(output_root)?;
        let root_url = Url::from_directory_path(&root_path).map_err(|()| {
            ClassweaveError::resolution(root_path.display().to_string(), "not a valid file URL")
        })?;

        let mut seen = HashSet::new();
        seen.insert(root_url.clone());
        let mut locations = vec![ClasspathLocation {
            path: root_path,
            url: root_url,
            kind: LocationKind::Directory,
        }];

        for dependency in dependencies {
            let location = resolve_dependency(dependency)?;
            if seen.insert(location.url.clone()) {
                locations.push(location);
            } else {
                debug!(url = %location.url, "duplicate classpath entry dropped");
            }
        }

        debug!(
            urls = ?locations.iter().map(|l| l.url.as_str()).collect::<Vec<_>>(),
            "classpath resolved"
        );

        Ok(Self { locations })
    }

    /// All locations, local output root first.
    pub fn locations(&self) -> &[ClasspathLocation] {
        &self.locations
    }

    /// The local output root (index 0).
    pub fn output_root(&self) -> &ClasspathLocation {
        &self.locations[0]
    }

    /// Everything after the output root, in order.
    pub fn dependencies(&self) -> &[ClasspathLocation] {
        &self.locations[1..]
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Class sources for the dependency locations, in classpath order.
    pub fn dependency_chain(&self) -> SourceChain {
        let sources: Vec<Box<dyn ClassSource>> = self
            .dependencies()
            .iter()
            .map(|location| -> Box<dyn ClassSource> {
                match location.kind {
                    LocationKind::Directory => Box::new(DirectorySource::new(&location.path)),
                    LocationKind::Archive => Box::new(ArchiveSource::new(&location.path)),
                }
            })
            .collect();
        SourceChain::new(sources)
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        ClassweaveError::resolution(path.display().to_string(), e.to_string())
    })
}

fn resolve_dependency(path: &Path) -> Result<ClasspathLocation> {
    let abs = absolutize(path)?;
    let location = abs.display().to_string();

    let metadata = std::fs::metadata(&abs)
        .map_err(|e| ClassweaveError::resolution(&location, e.to_string()))?;

    if metadata.is_dir() {
        let url = Url::from_directory_path(&abs)
            .map_err(|()| ClassweaveError::resolution(&location, "not a valid file URL"))?;
        return Ok(ClasspathLocation {
            path: abs,
            url,
            kind: LocationKind::Directory,
        });
    }

    if !is_archive(&abs) {
        return Err(ClassweaveError::resolution(
            location,
            "neither a directory nor a .jar/.zip archive",
        ));
    }

    let url = Url::from_file_path(&abs)
        .map_err(|()| ClassweaveError::resolution(&location, "not a valid file URL"))?;
    Ok(ClasspathLocation {
        path: abs,
        url,
        kind: LocationKind::Archive,
    })
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
}
