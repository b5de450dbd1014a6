//! Directory walker: enumerates candidate binary artifacts under a scan root.

use std::path::{Path, PathBuf};

use classweave_shared::{CLASS_SUFFIX, ClassweaveError, Result, SOURCE_SUFFIX};
use tracing::debug;
use walkdir::WalkDir;

/// A discovered binary artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPath {
    /// Path relative to the scan root, e.g. `com/example/User.class`.
    pub relative: PathBuf,
    /// Full path on disk.
    pub absolute: PathBuf,
}

/// Start walking `root`. With `recurse = false` only its direct children are
/// considered.
///
/// Fails immediately with a config error naming the missing path and the
/// current working directory when `root` does not exist.
pub fn walk(root: &Path, recurse: bool) -> Result<ArtifactWalk> {
    if !root.exists() {
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|e| format!("<unavailable: {e}>"));
        return Err(ClassweaveError::config(format!(
            "classes directory not found: {} (current dir: {cwd})",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(ClassweaveError::config(format!(
            "classes directory is not a directory: {}",
            root.display()
        )));
    }

    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    if !recurse {
        walker = walker.max_depth(1);
    }

    Ok(ArtifactWalk {
        root: root.to_path_buf(),
        inner: walker.into_iter(),
        skipped_sources: Vec::new(),
    })
}

/// Lazy iterator over the binary artifacts of a tree.
///
/// Source files are never yielded; each one produces a debug diagnostic and
/// is remembered in [`ArtifactWalk::skipped_sources`].
pub struct ArtifactWalk {
    root: PathBuf,
    inner: walkdir::IntoIter,
    skipped_sources: Vec<PathBuf>,
}

impl ArtifactWalk {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source-suffix files encountered so far.
    pub fn skipped_sources(&self) -> &[PathBuf] {
        &self.skipped_sources
    }
}

impl Iterator for ArtifactWalk {
    type Item = Result<ArtifactPath>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                    return Some(Err(ClassweaveError::io(path, std::io::Error::from(e))));
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            if file_name.ends_with(SOURCE_SUFFIX) {
                // Usually a build misconfiguration: sources mixed into the output tree.
                debug!(
                    file = %entry.path().display(),
                    "expecting a {CLASS_SUFFIX} file but got {file_name} ... ignoring"
                );
                self.skipped_sources.push(entry.path().to_path_buf());
                continue;
            }
            if !file_name.ends_with(CLASS_SUFFIX) {
                continue;
            }

            let absolute = entry.path().to_path_buf();
            let relative = match absolute.strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => absolute.clone(),
            };
            return Some(Ok(ArtifactPath { relative, absolute }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cw-walker-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    fn collect(walk: &mut ArtifactWalk) -> Vec<PathBuf> {
        walk.by_ref().map(|r| r.unwrap().relative).collect()
    }

    #[test]
    fn yields_class_files_recursively() {
        let tmp = temp_dir();
        touch(&tmp, "Top.class");
        touch(&tmp, "com/example/User.class");
        touch(&tmp, "com/example/User.java");
        touch(&tmp, "com/example/deep/Address.class");
        touch(&tmp, "META-INF/MANIFEST.MF");

        let mut walk = walk(&tmp, true).unwrap();
        let found = collect(&mut walk);

        assert_eq!(
            found,
            [
                PathBuf::from("Top.class"),
                PathBuf::from("com/example/User.class"),
                PathBuf::from("com/example/deep/Address.class"),
            ]
        );
        assert_eq!(walk.skipped_sources().len(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn non_recursive_stays_at_top_level() {
        let tmp = temp_dir();
        touch(&tmp, "Top.class");
        touch(&tmp, "Other.java");
        touch(&tmp, "com/example/User.class");

        let mut walk = walk(&tmp, false).unwrap();
        assert_eq!(collect(&mut walk), [PathBuf::from("Top.class")]);
        assert_eq!(walk.skipped_sources(), [tmp.join("Other.java")]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_root_names_path_and_cwd() {
        let missing = std::env::temp_dir().join("cw-walker-definitely-missing");
        let err = walk(&missing, true).err().unwrap();
        let text = err.to_string();
        assert!(matches!(err, ClassweaveError::Config { .. }));
        assert!(text.contains("cw-walker-definitely-missing"));
        let cwd = std::env::current_dir().unwrap();
        assert!(text.contains(&cwd.display().to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_package_directories() {
        let tmp = temp_dir();
        let outside = temp_dir();
        touch(&tmp, "com/example/User.class");
        touch(&outside, "Linked.class");
        std::os::unix::fs::symlink(&outside, tmp.join("com/ext")).unwrap();

        let mut walk = walk(&tmp, true).unwrap();
        assert_eq!(
            collect(&mut walk),
            [
                PathBuf::from("com/example/User.class"),
                PathBuf::from("com/ext/Linked.class"),
            ]
        );

        let _ = std::fs::remove_dir_all(&tmp);
        let _ = std::fs::remove_dir_all(&outside);
    }
}
