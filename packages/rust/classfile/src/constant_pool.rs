//! Constant pool decoding, lookup, interning and encoding.

use std::borrow::Cow;

use classweave_shared::{ClassweaveError, Result};

use crate::bytes::{ByteReader, ByteWriter};

mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// One constant pool slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0, and the second slot taken by a long or double.
    Unusable,
    /// Modified UTF-8 bytes, kept verbatim.
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }
}

/// The constant pool of one class, 1-indexed as on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.u2()?;
        if count == 0 {
            return Err(ClassweaveError::class_format("constant pool count is zero"));
        }

        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(Constant::Unusable);

        while entries.len() < usize::from(count) {
            let offset = reader.position();
            let constant = match reader.u1()? {
                tag::UTF8 => {
                    let len = reader.u2()?;
                    Constant::Utf8(reader.bytes(usize::from(len))?.to_vec())
                }
                tag::INTEGER => Constant::Integer(reader.u4()?),
                tag::FLOAT => Constant::Float(reader.u4()?),
                tag::LONG => Constant::Long(reader.u8()?),
                tag::DOUBLE => Constant::Double(reader.u8()?),
                tag::CLASS => Constant::Class {
                    name_index: reader.u2()?,
                },
                tag::STRING => Constant::String {
                    string_index: reader.u2()?,
                },
                tag::FIELDREF => Constant::Fieldref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                tag::METHODREF => Constant::Methodref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                tag::INTERFACE_METHODREF => Constant::InterfaceMethodref {
                    class_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                tag::NAME_AND_TYPE => Constant::NameAndType {
                    name_index: reader.u2()?,
                    descriptor_index: reader.u2()?,
                },
                tag::METHOD_HANDLE => Constant::MethodHandle {
                    reference_kind: reader.u1()?,
                    reference_index: reader.u2()?,
                },
                tag::METHOD_TYPE => Constant::MethodType {
                    descriptor_index: reader.u2()?,
                },
                tag::DYNAMIC => Constant::Dynamic {
                    bootstrap_method_attr_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                tag::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: reader.u2()?,
                    name_and_type_index: reader.u2()?,
                },
                tag::MODULE => Constant::Module {
                    name_index: reader.u2()?,
                },
                tag::PACKAGE => Constant::Package {
                    name_index: reader.u2()?,
                },
                other => {
                    return Err(ClassweaveError::class_format(format!(
                        "unknown constant tag {other} at offset {offset}"
                    )));
                }
            };

            let wide = constant.is_wide();
            entries.push(constant);
            if wide {
                entries.push(Constant::Unusable);
            }
        }

        if entries.len() != usize::from(count) {
            return Err(ClassweaveError::class_format(
                "wide constant overruns constant pool count",
            ));
        }

        Ok(Self { entries })
    }

    pub(crate) fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.u2(crate::bytes::count_u16(self.entries.len(), "constants")?);
        for constant in &self.entries {
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(bytes) => {
                    writer.u1(tag::UTF8);
                    writer.u2(crate::bytes::count_u16(bytes.len(), "utf8 bytes")?);
                    writer.bytes(bytes);
                }
                Constant::Integer(v) => {
                    writer.u1(tag::INTEGER);
                    writer.u4(*v);
                }
                Constant::Float(v) => {
                    writer.u1(tag::FLOAT);
                    writer.u4(*v);
                }
                Constant::Long(v) => {
                    writer.u1(tag::LONG);
                    writer.u8(*v);
                }
                Constant::Double(v) => {
                    writer.u1(tag::DOUBLE);
                    writer.u8(*v);
                }
                Constant::Class { name_index } => {
                    writer.u1(tag::CLASS);
                    writer.u2(*name_index);
                }
                Constant::String { string_index } => {
                    writer.u1(tag::STRING);
                    writer.u2(*string_index);
                }
                Constant::Fieldref {
                    class_index,
                    name_and_type_index,
                } => {
                    writer.u1(tag::FIELDREF);
                    writer.u2(*class_index);
                    writer.u2(*name_and_type_index);
                }
                Constant::Methodref {
                    class_index,
                    name_and_type_index,
                } => {
                    writer.u1(tag::METHODREF);
                    writer.u2(*class_index);
                    writer.u2(*name_and_type_index);
                }
                Constant::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    writer.u1(tag::INTERFACE_METHODREF);
                    writer.u2(*class_index);
                    writer.u2(*name_and_type_index);
                }
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    writer.u1(tag::NAME_AND_TYPE);
                    writer.u2(*name_index);
                    writer.u2(*descriptor_index);
                }
                Constant::MethodHandle {
                    reference_kind,
                    reference_index,
                } => {
                    writer.u1(tag::METHOD_HANDLE);
                    writer.u1(*reference_kind);
                    writer.u2(*reference_index);
                }
                Constant::MethodType { descriptor_index } => {
                    writer.u1(tag::METHOD_TYPE);
                    writer.u2(*descriptor_index);
                }
                Constant::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    writer.u1(tag::DYNAMIC);
                    writer.u2(*bootstrap_method_attr_index);
                    writer.u2(*name_and_type_index);
                }
                Constant::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    writer.u1(tag::INVOKE_DYNAMIC);
                    writer.u2(*bootstrap_method_attr_index);
                    writer.u2(*name_and_type_index);
                }
                Constant::Module { name_index } => {
                    writer.u1(tag::MODULE);
                    writer.u2(*name_index);
                }
                Constant::Package { name_index } => {
                    writer.u1(tag::PACKAGE);
                    writer.u2(*name_index);
                }
            }
        }
        Ok(())
    }

    /// Number of slots including the unusable slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(usize::from(index)) {
            Some(Constant::Unusable) | None => Err(ClassweaveError::class_format(format!(
                "invalid constant pool index {index}"
            ))),
            Some(constant) => Ok(constant),
        }
    }

    /// Text of a `Utf8` constant.
    pub fn utf8(&self, index: u16) -> Result<Cow<'_, str>> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Ok(String::from_utf8_lossy(bytes)),
            other => Err(ClassweaveError::class_format(format!(
                "constant {index} is not Utf8: {other:?}"
            ))),
        }
    }

    /// Internal name referenced by a `Class` constant.
    pub fn class_name(&self, index: u16) -> Result<Cow<'_, str>> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            other => Err(ClassweaveError::class_format(format!(
                "constant {index} is not Class: {other:?}"
            ))),
        }
    }

    /// Index of an existing `Utf8` constant with this text.
    pub fn find_utf8(&self, text: &str) -> Option<u16> {
        self.entries
            .iter()
            .position(|c| matches!(c, Constant::Utf8(bytes) if bytes.as_slice() == text.as_bytes()))
            .and_then(|i| u16::try_from(i).ok())
    }

    /// Index of an existing `Class` constant naming `internal_name`.
    pub fn find_class(&self, internal_name: &str) -> Option<u16> {
        let name_index = self.find_utf8(internal_name)?;
        self.entries
            .iter()
            .position(|c| matches!(c, Constant::Class { name_index: n } if *n == name_index))
            .and_then(|i| u16::try_from(i).ok())
    }

    /// Intern a `Utf8` constant, reusing an existing one.
    pub fn intern_utf8(&mut self, text: &str) -> Result<u16> {
        if let Some(index) = self.find_utf8(text) {
            return Ok(index);
        }
        if text.len() > usize::from(u16::MAX) {
            return Err(ClassweaveError::class_format(format!(
                "utf8 constant too long: {} bytes",
                text.len()
            )));
        }
        self.push(Constant::Utf8(text.as_bytes().to_vec()))
    }

    /// Intern a `Class` constant for an internal name, reusing an existing one.
    pub fn intern_class(&mut self, internal_name: &str) -> Result<u16> {
        if let Some(index) = self.find_class(internal_name) {
            return Ok(index);
        }
        let name_index = self.intern_utf8(internal_name)?;
        self.push(Constant::Class { name_index })
    }

    fn push(&mut self, constant: Constant) -> Result<u16> {
        let index = crate::bytes::count_u16(self.entries.len(), "constants")?;
        if index == u16::MAX {
            return Err(ClassweaveError::class_format("constant pool is full"));
        }
        self.entries.push(constant);
        Ok(index)
    }
}
