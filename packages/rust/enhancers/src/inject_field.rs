//! `inject-field`: add a field to every concrete class that lacks it.

use classweave_classfile::access;
use classweave_loader::ArtifactDescription;
use classweave_shared::{EnhancerFailure, Result};
use tracing::debug;

use crate::options::Options;
use crate::{EnhanceContext, Enhancer};

const DEFAULT_DESCRIPTOR: &str = "Ljava/lang/Object;";

#[derive(Debug, Clone)]
pub struct InjectFieldEnhancer {
    name: String,
    descriptor: String,
    access_flags: u16,
}

impl InjectFieldEnhancer {
    pub const ID: &'static str = "inject-field";

    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access_flags: u16) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags,
        }
    }

    /// Options: `name` (required), `descriptor` (default `Ljava/lang/Object;`),
    /// `access` (default `["private", "transient"]`).
    pub fn from_options(table: &toml::Table) -> Result<Self> {
        let opts = Options::new(Self::ID, table);

        let name = opts.required_string("name")?;
        if name.is_empty() || name.contains(['.', ';', '[', '/']) {
            return Err(opts.invalid_value("name", format!("is not a valid field name: {name:?}")));
        }

        let descriptor = opts
            .string("descriptor")?
            .unwrap_or_else(|| DEFAULT_DESCRIPTOR.to_string());
        if !is_field_descriptor(&descriptor) {
            return Err(opts.invalid_value(
                "descriptor",
                format!("is not a field descriptor: {descriptor:?}"),
            ));
        }

        let access_names = opts
            .string_list("access")?
            .unwrap_or_else(|| vec!["private".into(), "transient".into()]);
        let mut access_flags = 0;
        for flag in &access_names {
            access_flags |= field_flag(flag)
                .ok_or_else(|| opts.invalid_value("access", format!("has unknown flag {flag:?}")))?;
        }

        Ok(Self::new(name, descriptor, access_flags))
    }
}

impl Enhancer for InjectFieldEnhancer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn enhance(
        &self,
        artifact: &mut ArtifactDescription,
        _ctx: &EnhanceContext<'_>,
    ) -> std::result::Result<(), EnhancerFailure> {
        let added = artifact.update(|class| {
            if class.has_field(&self.name) {
                return Ok(false);
            }
            class.add_field(self.access_flags, &self.name, &self.descriptor)?;
            Ok(true)
        })?;

        debug!(class = %artifact.name(), field = %self.name, added, "inject-field applied");
        Ok(())
    }
}

fn field_flag(name: &str) -> Option<u16> {
    Some(match name {
        "public" => access::PUBLIC,
        "private" => access::PRIVATE,
        "protected" => access::PROTECTED,
        "static" => access::STATIC,
        "final" => access::FINAL,
        "volatile" => access::VOLATILE,
        "transient" => access::TRANSIENT,
        "synthetic" => access::SYNTHETIC,
        _ => return None,
    })
}

fn is_field_descriptor(descriptor: &str) -> bool {
    let element = descriptor.trim_start_matches('[');
    match element.as_bytes() {
        [b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z'] => true,
        [b'L', rest @ ..] => {
            rest.len() > 1 && rest.ends_with(b";") && !rest[..rest.len() - 1].contains(&b';')
        }
        _ => false,
    }
}
