//! Binary resolution for classweave.
//!
//! This crate provides:
//! - [`Classpath`]: ordered, deduplicated search locations, output root first
//! - [`ClassSource`] implementations for directories and `.jar`/`.zip` archives
//! - [`ArtifactCache`]: run-scoped cache of [`ArtifactDescription`]s
//! - [`IsolatedLoader`]: override-first resolution through the cache

pub mod artifact;
pub mod cache;
pub mod classpath;
pub mod loader;
pub mod source;

pub use artifact::ArtifactDescription;
pub use cache::{ArtifactCache, CacheStats, SharedArtifact};
pub use classpath::{Classpath, ClasspathLocation, LocationKind};
pub use loader::IsolatedLoader;
pub use source::{
    ArchiveSource, ArtifactOrigin, ClassSource, DirectorySource, FoundClass, SourceChain,
};
