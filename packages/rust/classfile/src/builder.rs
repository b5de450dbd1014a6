//! Builder for small, valid class files.
//!
//! Used for fixtures: a test can describe the shape it needs (flags,
//! interfaces, fields) without shipping compiled binaries.

use classweave_shared::{ClassweaveError, Result};

use crate::class::{Attribute, ClassFile, Member, access};
use crate::constant_pool::ConstantPool;

/// Java 8 class-file major version.
pub const JAVA_8: u16 = 52;

#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    super_class: Option<String>,
    access_flags: u16,
    major_version: u16,
    interfaces: Vec<String>,
    fields: Vec<(u16, String, String)>,
    methods: Vec<(u16, String, String)>,
    attributes: Vec<(String, Vec<u8>)>,
}

impl ClassFileBuilder {
    /// Start a public class with internal name `name` extending `java/lang/Object`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_class: Some("java/lang/Object".into()),
            access_flags: access::PUBLIC | access::SUPER,
            major_version: JAVA_8,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Public interface, as `javac` emits it.
    pub fn interface_type(name: impl Into<String>) -> Self {
        Self::new(name).access(access::PUBLIC | access::INTERFACE | access::ABSTRACT)
    }

    /// Public annotation type.
    pub fn annotation_type(name: impl Into<String>) -> Self {
        Self::new(name).access(
            access::PUBLIC | access::INTERFACE | access::ABSTRACT | access::ANNOTATION,
        )
    }

    /// Public final enum extending `java/lang/Enum`.
    pub fn enum_type(name: impl Into<String>) -> Self {
        Self::new(name)
            .access(access::PUBLIC | access::FINAL | access::SUPER | access::ENUM)
            .super_class("java/lang/Enum")
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn major_version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    pub fn super_class(mut self, name: impl Into<String>) -> Self {
        self.super_class = Some(name.into());
        self
    }

    pub fn no_super_class(mut self) -> Self {
        self.super_class = None;
        self
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn field(
        mut self,
        flags: u16,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.fields.push((flags, name.into(), descriptor.into()));
        self
    }

    pub fn method(
        mut self,
        flags: u16,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.methods.push((flags, name.into(), descriptor.into()));
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, info: Vec<u8>) -> Self {
        self.attributes.push((name.into(), info));
        self
    }

    /// Assemble the structural model.
    pub fn build_class(&self) -> Result<ClassFile> {
        let mut pool = ConstantPool::default();
        let this_class = pool.intern_class(&self.name)?;
        let super_class = match &self.super_class {
            Some(name) => pool.intern_class(name)?,
            None => 0,
        };

        let interfaces = self
            .interfaces
            .iter()
            .map(|i| pool.intern_class(i))
            .collect::<Result<Vec<_>>>()?;

        let mut members = |list: &[(u16, String, String)]| -> Result<Vec<Member>> {
            list.iter()
                .map(|(flags, name, descriptor)| {
                    Ok::<_, ClassweaveError>(Member {
                        access_flags: *flags,
                        name_index: pool.intern_utf8(name)?,
                        descriptor_index: pool.intern_utf8(descriptor)?,
                        attributes: Vec::new(),
                    })
                })
                .collect()
        };
        let fields = members(&self.fields)?;
        let methods = members(&self.methods)?;

        let attributes = self
            .attributes
            .iter()
            .map(|(name, info)| {
                Ok::<_, ClassweaveError>(Attribute {
                    name_index: pool.intern_utf8(name)?,
                    info: info.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ClassFile {
            minor_version: 0,
            major_version: self.major_version,
            constant_pool: pool,
            access_flags: self.access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Assemble and encode.
    pub fn build(&self) -> Result<Vec<u8>> {
        self.build_class()?.to_bytes()
    }
}
