//! Write-back of enhanced bytes.

use std::fs;
use std::io;
use std::path::Path;

use tracing::trace;

/// Destination for enhanced bytes. Swappable so tests can induce failures.
pub trait ArtifactWriter {
    /// Replace the file at `path` with `bytes`.
    fn write(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Writes through the filesystem: temp file in the same directory, then rename.
///
/// A symlinked artifact is written through to the file it points at, and an
/// existing file keeps its permissions.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWriter;

impl ArtifactWriter for FsWriter {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let target = match fs::canonicalize(path) {
            Ok(real) => real,
            Err(e) if e.kind() == io::ErrorKind::NotFound => path.to_path_buf(),
            Err(e) => return Err(e),
        };
        let file_name = target.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "artifact path has no file name")
        })?;
        let temp = target.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

        fs::write(&temp, bytes)?;
        if let Err(e) = replace(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        trace!(
            path = %path.display(),
            target = %target.display(),
            size = bytes.len(),
            "wrote artifact"
        );
        Ok(())
    }
}

fn replace(temp: &Path, target: &Path) -> io::Result<()> {
    match fs::metadata(target) {
        Ok(meta) => fs::set_permissions(temp, meta.permissions())?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(temp, target)
}
