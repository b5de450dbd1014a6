//! `ArtifactDescription`: one loaded binary artifact and its current bytes.

use std::path::Path;

use classweave_classfile::ClassFile;
use classweave_shared::{BinaryName, Result};

use crate::source::{ArtifactOrigin, FoundClass};

/// A loaded binary artifact.
///
/// `original` is what was read from disk; `enhanced` is the buffer
/// transformers mutate in place across the whole chain.
#[derive(Debug, Clone)]
pub struct ArtifactDescription {
    name: BinaryName,
    origin: ArtifactOrigin,
    original: Vec<u8>,
    enhanced: Vec<u8>,
    modified: bool,
}

impl ArtifactDescription {
    pub fn new(name: BinaryName, found: FoundClass) -> Self {
        Self {
            name,
            origin: found.origin,
            enhanced: found.bytes.clone(),
            original: found.bytes,
            modified: false,
        }
    }

    pub fn name(&self) -> &BinaryName {
        &self.name
    }

    pub fn origin(&self) -> &ArtifactOrigin {
        &self.origin
    }

    /// Bytes as first read.
    pub fn original_bytes(&self) -> &[u8] {
        &self.original
    }

    /// Current (possibly enhanced) bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.enhanced
    }

    /// Whether any transformer changed the bytes.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Loose file this artifact was read from, if any.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.origin {
            ArtifactOrigin::File(path) => Some(path),
            ArtifactOrigin::Archive { .. } => None,
        }
    }

    /// Archive entries cannot be written back.
    pub fn is_frozen(&self) -> bool {
        matches!(self.origin, ArtifactOrigin::Archive { .. })
    }

    /// Parse the current bytes.
    pub fn class_file(&self) -> Result<ClassFile> {
        ClassFile::parse(&self.enhanced)
    }

    /// Replace the current bytes.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        if bytes != self.enhanced {
            self.modified = self.modified || bytes != self.original;
            self.enhanced = bytes;
        }
    }

    /// Parse, mutate and re-encode in one step.
    pub fn update<T>(&mut self, f: impl FnOnce(&mut ClassFile) -> Result<T>) -> Result<T> {
        let mut class = self.class_file()?;
        let out = f(&mut class)?;
        self.set_bytes(class.to_bytes()?);
        Ok(out)
    }
}
