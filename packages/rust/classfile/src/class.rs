//! The structural model of one class file.

use std::borrow::Cow;

use classweave_shared::{ClassweaveError, Result};
use tracing::trace;

use crate::bytes::{ByteReader, ByteWriter, count_u16};
use crate::constant_pool::ConstantPool;

/// The `0xCAFEBABE` class-file magic.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Access and property flags (JVMS §4.1, §4.5).
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const VOLATILE: u16 = 0x0040;
    pub const TRANSIENT: u16 = 0x0080;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;
    pub const MODULE: u16 = 0x8000;
}

/// An attribute kept as opaque bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

/// A field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// A decoded class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    /// Zero for `java/lang/Object` and module descriptors.
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Decode a complete class file. Trailing bytes are an error.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let magic = reader.u4()?;
        if magic != MAGIC {
            return Err(ClassweaveError::class_format(format!(
                "bad magic 0x{magic:08X}"
            )));
        }

        let minor_version = reader.u2()?;
        let major_version = reader.u2()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.u2()?;
        let this_class = reader.u2()?;
        let super_class = reader.u2()?;

        let interface_count = reader.u2()?;
        let mut interfaces = Vec::with_capacity(usize::from(interface_count));
        for _ in 0..interface_count {
            interfaces.push(reader.u2()?);
        }

        let fields = parse_members(&mut reader)?;
        let methods = parse_members(&mut reader)?;
        let attributes = parse_attributes(&mut reader)?;

        if reader.remaining() != 0 {
            return Err(ClassweaveError::class_format(format!(
                "{} trailing bytes after class file",
                reader.remaining()
            )));
        }

        let class = Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        // Fail early on a broken this_class rather than at first query.
        let name = class.internal_name()?;
        trace!(class = %name, major_version, "parsed class file");
        Ok(class)
    }

    /// Encode back to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(512);
        w.u4(MAGIC);
        w.u2(self.minor_version);
        w.u2(self.major_version);
        self.constant_pool.write(&mut w)?;
        w.u2(self.access_flags);
        w.u2(self.this_class);
        w.u2(self.super_class);
        w.u2(count_u16(self.interfaces.len(), "interfaces")?);
        for index in &self.interfaces {
            w.u2(*index);
        }
        write_members(&mut w, &self.fields, "fields")?;
        write_members(&mut w, &self.methods, "methods")?;
        write_attributes(&mut w, &self.attributes)?;
        Ok(w.into_inner())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Internal name, `com/example/User`.
    pub fn internal_name(&self) -> Result<Cow<'_, str>> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Binary name, `com.example.User`.
    pub fn name(&self) -> Result<String> {
        Ok(self.internal_name()?.replace('/', "."))
    }

    /// Binary name of the superclass, if any.
    pub fn super_name(&self) -> Result<Option<String>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        Ok(Some(
            self.constant_pool
                .class_name(self.super_class)?
                .replace('/', "."),
        ))
    }

    /// Internal names of the directly implemented interfaces.
    pub fn interface_names(&self) -> Result<Vec<String>> {
        self.interfaces
            .iter()
            .map(|i| self.constant_pool.class_name(*i).map(Cow::into_owned))
            .collect()
    }

    pub fn implements(&self, internal_name: &str) -> bool {
        self.interfaces.iter().any(|i| {
            self.constant_pool
                .class_name(*i)
                .is_ok_and(|n| n == internal_name)
        })
    }

    pub fn field_names(&self) -> Result<Vec<String>> {
        member_names(&self.constant_pool, &self.fields)
    }

    pub fn method_names(&self) -> Result<Vec<String>> {
        member_names(&self.constant_pool, &self.methods)
    }

    pub fn has_field(&self, name: &str) -> bool {
        has_member(&self.constant_pool, &self.fields, name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        has_member(&self.constant_pool, &self.methods, name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| {
            self.constant_pool
                .utf8(a.name_index)
                .is_ok_and(|n| n == name)
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & access::INTERFACE != 0
    }

    pub fn is_annotation(&self) -> bool {
        self.access_flags & access::ANNOTATION != 0
    }

    pub fn is_enum(&self) -> bool {
        self.access_flags & access::ENUM != 0
    }

    pub fn is_final(&self) -> bool {
        self.access_flags & access::FINAL != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags & access::SYNTHETIC != 0
    }

    pub fn is_module(&self) -> bool {
        self.access_flags & access::MODULE != 0
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append a field. Fails if a field with this name already exists.
    pub fn add_field(&mut self, access_flags: u16, name: &str, descriptor: &str) -> Result<()> {
        if self.has_field(name) {
            return Err(ClassweaveError::class_format(format!(
                "field {name} already exists"
            )));
        }
        let name_index = self.constant_pool.intern_utf8(name)?;
        let descriptor_index = self.constant_pool.intern_utf8(descriptor)?;
        self.fields.push(Member {
            access_flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        Ok(())
    }

    /// Add an interface by internal name. Returns `false` if already present.
    pub fn add_interface(&mut self, internal_name: &str) -> Result<bool> {
        if self.implements(internal_name) {
            return Ok(false);
        }
        let index = self.constant_pool.intern_class(internal_name)?;
        self.interfaces.push(index);
        Ok(true)
    }
}

fn parse_members(reader: &mut ByteReader<'_>) -> Result<Vec<Member>> {
    let count = reader.u2()?;
    let mut members = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        members.push(Member {
            access_flags: reader.u2()?,
            name_index: reader.u2()?,
            descriptor_index: reader.u2()?,
            attributes: parse_attributes(reader)?,
        });
    }
    Ok(members)
}

fn parse_attributes(reader: &mut ByteReader<'_>) -> Result<Vec<Attribute>> {
    let count = reader.u2()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name_index = reader.u2()?;
        let len = reader.u4()? as usize;
        attributes.push(Attribute {
            name_index,
            info: reader.bytes(len)?.to_vec(),
        });
    }
    Ok(attributes)
}

fn write_members(w: &mut ByteWriter, members: &[Member], what: &str) -> Result<()> {
    w.u2(count_u16(members.len(), what)?);
    for m in members {
        w.u2(m.access_flags);
        w.u2(m.name_index);
        w.u2(m.descriptor_index);
        write_attributes(w, &m.attributes)?;
    }
    Ok(())
}

fn write_attributes(w: &mut ByteWriter, attributes: &[Attribute]) -> Result<()> {
    w.u2(count_u16(attributes.len(), "attributes")?);
    for a in attributes {
        w.u2(a.name_index);
        let len = u32::try_from(a.info.len()).map_err(|_| {
            ClassweaveError::class_format(format!("attribute too long: {} bytes", a.info.len()))
        })?;
        w.u4(len);
        w.bytes(&a.info);
    }
    Ok(())
}

fn member_names(pool: &ConstantPool, members: &[Member]) -> Result<Vec<String>> {
    members
        .iter()
        .map(|m| pool.utf8(m.name_index).map(Cow::into_owned))
        .collect()
}

fn has_member(pool: &ConstantPool, members: &[Member], name: &str) -> bool {
    members
        .iter()
        .any(|m| pool.utf8(m.name_index).is_ok_and(|n| n == name))
}
