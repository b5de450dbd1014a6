//! The isolated, override-first binary loader.
//!
//! For any binary name the local output root is consulted first; only when
//! it has no matching file is the dependency chain asked. Every resolution is
//! cached for the rest of the run, so a transformer that asks about a sibling
//! class sees that sibling's current (possibly already enhanced) bytes.
//!
//! An `IsolatedLoader` is the explicit loading context for one run. It is
//! passed by reference to everything that needs to resolve names and simply
//! dropped when the run ends, whether it succeeded or not.

use classweave_classfile::ClassFile;
use classweave_shared::{BinaryName, ClassweaveError, Result};
use tracing::{debug, trace};

use crate::artifact::ArtifactDescription;
use crate::cache::{ArtifactCache, CacheStats, SharedArtifact};
use crate::classpath::Classpath;
use crate::source::{ClassSource, DirectorySource, SourceChain};

pub struct IsolatedLoader {
    classpath: Classpath,
    local: DirectorySource,
    parent: SourceChain,
    cache: ArtifactCache,
}

impl IsolatedLoader {
    /// Build a loader over `classpath` with a fresh, empty cache.
    pub fn new(classpath: Classpath) -> Self {
        let local = DirectorySource::new(&classpath.output_root().path);
        let parent = classpath.dependency_chain();
        debug!(
            local = %local.describe(),
            parent = %parent.describe(),
            "isolated loader created"
        );
        Self {
            classpath,
            local,
            parent,
            cache: ArtifactCache::new(),
        }
    }

    /// Resolve `name` to its shared description, loading it on first use.
    pub fn resolve(&self, name: &BinaryName) -> Result<SharedArtifact> {
        self.cache
            .get_or_try_insert_with(name, || self.load(name))
    }

    /// Whether any location can supply `name`. Other failures propagate.
    pub fn contains(&self, name: &BinaryName) -> Result<bool> {
        match self.resolve(name) {
            Ok(_) => Ok(true),
            Err(ClassweaveError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Parse the current bytes of `name`.
    ///
    /// Fails with [`ClassweaveError::InUse`] when asked for the artifact the
    /// orchestrator is currently handing to a transformer.
    pub fn inspect(&self, name: &BinaryName) -> Result<ClassFile> {
        let shared = self.resolve(name)?;
        let description = shared
            .try_borrow()
            .map_err(|_| ClassweaveError::InUse {
                name: name.to_string(),
            })?;
        description.class_file()
    }

    pub fn classpath(&self) -> &Classpath {
        &self.classpath
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn load(&self, name: &BinaryName) -> Result<ArtifactDescription> {
        if let Some(found) = self.local.find(name)? {
            trace!(class = %name, "resolved from local output root");
            return Ok(ArtifactDescription::new(name.clone(), found));
        }
        if let Some(found) = self.parent.find(name)? {
            trace!(class = %name, origin = %found.origin, "resolved from dependency");
            return Ok(ArtifactDescription::new(name.clone(), found));
        }
        Err(ClassweaveError::not_found(name.as_str()))
    }
}

impl std::fmt::Debug for IsolatedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedLoader")
            .field("local", &self.local.root())
            .field("dependencies", &self.parent.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ArtifactOrigin;
    use classweave_classfile::{ClassFileBuilder, access};
    use std::path::{Path, PathBuf};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cw-loader-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_class(root: &Path, internal: &str, bytes: &[u8]) {
        let path = root.join(format!("{internal}.class"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn local_root_shadows_dependency() {
        let tmp = temp_dir();
        let classes = tmp.join("classes");
        let dep = tmp.join("dep");
        let local_bytes = ClassFileBuilder::new("com/example/Shared")
            .field(access::PRIVATE, "local", "I")
            .build()
            .unwrap();
        let dep_bytes = ClassFileBuilder::new("com/example/Shared")
            .field(access::PRIVATE, "external", "I")
            .build()
            .unwrap();
        write_class(&classes, "com/example/Shared", &local_bytes);
        write_class(&dep, "com/example/Shared", &dep_bytes);

        let loader = IsolatedLoader::new(Classpath::resolve(&classes, &[dep]).unwrap());
        let shared = loader.resolve(&"com.example.Shared".into()).unwrap();
        let desc = shared.borrow();

        assert_eq!(desc.bytes(), local_bytes.as_slice());
        assert!(matches!(desc.origin(), ArtifactOrigin::File(p) if p.starts_with(&classes)));
        assert!(desc.class_file().unwrap().has_field("local"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn falls_back_to_dependency_chain() {
        let tmp = temp_dir();
        let classes = tmp.join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        let dep = tmp.join("dep");
        write_class(&dep, "com/lib/Helper", b"helper");

        let loader = IsolatedLoader::new(Classpath::resolve(&classes, &[dep.clone()]).unwrap());
        let shared = loader.resolve(&"com.lib.Helper".into()).unwrap();

        assert_eq!(shared.borrow().bytes(), b"helper");
        assert!(shared.borrow().file_path().unwrap().starts_with(&dep));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let tmp = temp_dir();
        let loader = IsolatedLoader::new(Classpath::resolve(&tmp, &[]).unwrap());

        let err = loader.resolve(&"com.example.Ghost".into()).unwrap_err();
        assert!(matches!(
            err,
            ClassweaveError::NotFound { ref name } if name == "com.example.Ghost"
        ));
        assert!(!loader.contains(&"com.example.Ghost".into()).unwrap());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn resolution_returns_cached_mutated_bytes() {
        let tmp = temp_dir();
        write_class(&tmp, "A", b"original");
        let loader = IsolatedLoader::new(Classpath::resolve(&tmp, &[]).unwrap());

        loader
            .resolve(&"A".into())
            .unwrap()
            .borrow_mut()
            .set_bytes(b"enhanced".to_vec());
        std::fs::write(tmp.join("A.class"), b"changed on disk").unwrap();

        assert_eq!(loader.resolve(&"A".into()).unwrap().borrow().bytes(), b"enhanced");
        assert_eq!(loader.cache_stats().misses, 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn inspect_reports_in_use() {
        let tmp = temp_dir();
        write_class(&tmp, "A", &ClassFileBuilder::new("A").build().unwrap());
        let loader = IsolatedLoader::new(Classpath::resolve(&tmp, &[]).unwrap());

        let shared = loader.resolve(&"A".into()).unwrap();
        assert!(loader.inspect(&"A".into()).is_ok());

        let _guard = shared.borrow_mut();
        let err = loader.inspect(&"A".into()).unwrap_err();
        assert!(matches!(err, ClassweaveError::InUse { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
