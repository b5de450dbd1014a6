//! Core domain types shared by the loader, the enhancers and the pipeline.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClassweaveError, Result};

/// File-name suffix of a compiled binary artifact.
pub const CLASS_SUFFIX: &str = ".class";

/// File-name suffix of a source file that should never appear among binaries.
pub const SOURCE_SUFFIX: &str = ".java";

/// Simple name of a package-level marker artifact.
pub const PACKAGE_MARKER: &str = "package-info";

/// Simple name of a module descriptor artifact.
pub const MODULE_MARKER: &str = "module-info";

// ---------------------------------------------------------------------------
// BinaryName
// ---------------------------------------------------------------------------

/// A dot-separated qualified binary name, e.g. `com.example.User$Address`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryName(String);

impl BinaryName {
    /// Wrap an already dot-separated name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive a binary name from an artifact path relative to a scan root.
    ///
    /// `com/example/User.class` becomes `com.example.User`.
    pub fn from_relative_path(path: &Path) -> Result<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    return Err(ClassweaveError::class_format(format!(
                        "artifact path escapes the scan root: {}",
                        path.display()
                    )));
                }
            }
        }

        let last = segments.pop().ok_or_else(|| {
            ClassweaveError::class_format(format!("empty artifact path: {}", path.display()))
        })?;
        let stem = last.strip_suffix(CLASS_SUFFIX).ok_or_else(|| {
            ClassweaveError::class_format(format!(
                "not a {CLASS_SUFFIX} file: {}",
                path.display()
            ))
        })?;
        if stem.is_empty() {
            return Err(ClassweaveError::class_format(format!(
                "artifact file has no name: {}",
                path.display()
            )));
        }

        segments.push(stem.to_string());
        Ok(Self(segments.join(".")))
    }

    /// Build from the JVM internal form (`com/example/User`).
    pub fn from_internal(internal: &str) -> Self {
        Self(internal.replace('/', "."))
    }

    /// The dot-separated name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The JVM internal form, `com/example/User`.
    pub fn internal_form(&self) -> String {
        self.0.replace('.', "/")
    }

    /// Path of the artifact relative to a classpath root, `com/example/User.class`.
    pub fn to_relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self.0.split('.').collect();
        let file = format!("{}{CLASS_SUFFIX}", self.simple_name());
        path.set_file_name(file);
        path
    }

    /// Archive entry name (always `/`-separated).
    pub fn to_entry_name(&self) -> String {
        format!("{}{CLASS_SUFFIX}", self.internal_form())
    }

    /// Last dot-separated segment.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for BinaryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BinaryName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ---------------------------------------------------------------------------
// EligibilityClass
// ---------------------------------------------------------------------------

/// Classification deciding whether an artifact is handed to transformers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EligibilityClass {
    Interface,
    Enum,
    ArrayType,
    PrimitiveType,
    Annotation,
    FrozenOrSealed,
    PackageMarker,
    Concrete,
}

impl EligibilityClass {
    /// Only concrete artifacts are transformed.
    pub fn is_concrete(self) -> bool {
        matches!(self, Self::Concrete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::ArrayType => "array-type",
            Self::PrimitiveType => "primitive-type",
            Self::Annotation => "annotation",
            Self::FrozenOrSealed => "frozen-or-sealed",
            Self::PackageMarker => "package-marker",
            Self::Concrete => "concrete",
        }
    }
}

impl std::fmt::Display for EligibilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EnhancerDescriptor
// ---------------------------------------------------------------------------

/// Identity of a registered transformer and its slot in the declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancerDescriptor {
    /// Identifier the enhancer was configured with.
    pub id: String,
    /// Semantic version reported by the enhancer.
    pub version: String,
    /// Zero-based position in the registry.
    pub position: usize,
}

impl std::fmt::Display for EnhancerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[version: {}]", self.id, self.version)
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 identifier for one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
