//! Binary class-file model for classweave.
//!
//! This crate provides:
//! - [`ClassFile`]: parse, query, mutate and re-encode a class file
//! - [`ConstantPool`]: 1-indexed pool with UTF-8/Class interning
//! - [`ClassFileBuilder`]: small valid classes for fixtures
//!
//! Parsing keeps attributes opaque, so an unmodified class re-encodes to the
//! exact bytes it was read from.

mod builder;
mod bytes;
mod class;
mod constant_pool;

pub use builder::{ClassFileBuilder, JAVA_8};
pub use class::{Attribute, ClassFile, MAGIC, Member, access};
pub use constant_pool::{Constant, ConstantPool};
