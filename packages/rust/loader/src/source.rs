//! Class sources: where the bytes for a binary name can come from.

use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use classweave_shared::{BinaryName, ClassweaveError, Result};
use tracing::trace;
use zip::ZipArchive;
use zip::result::ZipError;

/// Where a resolved artifact's bytes were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// A loose `.class` file; enhanced bytes are written back here.
    File(PathBuf),
    /// An entry inside a dependency archive; read-only.
    Archive { archive: PathBuf, entry: String },
}

impl std::fmt::Display for ArtifactOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Archive { archive, entry } => write!(f, "{}!/{entry}", archive.display()),
        }
    }
}

/// Raw bytes found for a binary name.
#[derive(Debug, Clone)]
pub struct FoundClass {
    pub origin: ArtifactOrigin,
    pub bytes: Vec<u8>,
}

/// A location that may supply the bytes of a binary name.
pub trait ClassSource {
    /// Look up `name`. `Ok(None)` means "not here, ask the next source".
    fn find(&self, name: &BinaryName) -> Result<Option<FoundClass>>;

    /// Human-readable location for tracing.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Loose class files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ClassSource for DirectorySource {
    fn find(&self, name: &BinaryName) -> Result<Option<FoundClass>> {
        let path = self.root.join(name.to_relative_path());
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|e| ClassweaveError::io(&path, e))?;
        trace!(class = %name, path = %path.display(), "found in directory");
        Ok(Some(FoundClass {
            origin: ArtifactOrigin::File(path),
            bytes,
        }))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Class entries inside a `.jar`/`.zip`. The archive is opened on first lookup
/// and kept open for the rest of the run.
pub struct ArchiveSource {
    path: PathBuf,
    archive: RefCell<Option<ZipArchive<File>>>,
}

impl ArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive: RefCell::new(None),
        }
    }

    fn open(&self) -> Result<ZipArchive<File>> {
        let file = File::open(&self.path).map_err(|e| ClassweaveError::io(&self.path, e))?;
        ZipArchive::new(file).map_err(|e| {
            ClassweaveError::resolution(self.path.display().to_string(), e.to_string())
        })
    }
}

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOC: usize = 1 << 20;

/// The declared size comes from the archive header and is not trusted.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |size| size.min(MAX_PREALLOC))
}

impl ClassSource for ArchiveSource {
    fn find(&self, name: &BinaryName) -> Result<Option<FoundClass>> {
        let mut slot = self.archive.borrow_mut();
        if slot.is_none() {
            *slot = Some(self.open()?);
        }
        let Some(archive) = slot.as_mut() else {
            return Ok(None);
        };

        let entry = name.to_entry_name();
        let mut file = match archive.by_name(&entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(ClassweaveError::resolution(
                    format!("{}!/{entry}", self.path.display()),
                    e.to_string(),
                ));
            }
        };

        let mut bytes = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut bytes)
            .map_err(|e| ClassweaveError::io(&self.path, e))?;
        trace!(class = %name, archive = %self.path.display(), "found in archive");

        Ok(Some(FoundClass {
            origin: ArtifactOrigin::Archive {
                archive: self.path.clone(),
                entry,
            },
            bytes,
        }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl std::fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSource")
            .field("path", &self.path)
            .field("open", &self.archive.borrow().is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Sources tried in order; the first hit wins.
#[derive(Default)]
pub struct SourceChain {
    sources: Vec<Box<dyn ClassSource>>,
}

impl SourceChain {
    pub fn new(sources: Vec<Box<dyn ClassSource>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ClassSource for SourceChain {
    fn find(&self, name: &BinaryName) -> Result<Option<FoundClass>> {
        for source in &self.sources {
            if let Some(found) = source.find(name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        format!("[{}]", parts.join(", "))
    }
}
