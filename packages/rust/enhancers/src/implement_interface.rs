//! `implement-interface`: mark concrete classes with an interface.
//!
//! With `when_field`, only classes that already declare that field are
//! marked, which lets this enhancer build on one that runs earlier in the
//! chain. With `require_resolvable`, the interface must exist on the
//! classpath.

use classweave_loader::ArtifactDescription;
use classweave_shared::{BinaryName, EnhancerFailure, Result};
use tracing::debug;

use crate::options::Options;
use crate::{EnhanceContext, Enhancer};

#[derive(Debug, Clone)]
pub struct ImplementInterfaceEnhancer {
    /// Internal form, `com/example/Tracked`.
    interface: String,
    when_field: Option<String>,
    require_resolvable: bool,
}

impl ImplementInterfaceEnhancer {
    pub const ID: &'static str = "implement-interface";

    /// `interface` accepts either `com.example.Tracked` or `com/example/Tracked`.
    pub fn new(interface: &str) -> Self {
        Self {
            interface: interface.replace('.', "/"),
            when_field: None,
            require_resolvable: false,
        }
    }

    pub fn when_field(mut self, field: impl Into<String>) -> Self {
        self.when_field = Some(field.into());
        self
    }

    pub fn require_resolvable(mut self, require: bool) -> Self {
        self.require_resolvable = require;
        self
    }

    pub fn from_options(table: &toml::Table) -> Result<Self> {
        let opts = Options::new(Self::ID, table);
        let interface = opts.required_string("interface")?;
        if interface.trim().is_empty() {
            return Err(opts.invalid_value("interface", "must not be empty"));
        }

        let mut enhancer = Self::new(interface.trim())
            .require_resolvable(opts.bool("require_resolvable")?.unwrap_or(false));
        if let Some(field) = opts.string("when_field")? {
            enhancer = enhancer.when_field(field);
        }
        Ok(enhancer)
    }
}

impl Enhancer for ImplementInterfaceEnhancer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn enhance(
        &self,
        artifact: &mut ArtifactDescription,
        ctx: &EnhanceContext<'_>,
    ) -> std::result::Result<(), EnhancerFailure> {
        if let Some(field) = &self.when_field {
            if !artifact.class_file()?.has_field(field) {
                debug!(class = %artifact.name(), field = %field, "gating field absent, skipping");
                return Ok(());
            }
        }

        if self.require_resolvable {
            let name = BinaryName::from_internal(&self.interface);
            if !ctx.loader.contains(&name)? {
                return Err(format!("interface {name} is not on the classpath").into());
            }
        }

        let added = artifact.update(|class| class.add_interface(&self.interface))?;
        debug!(
            class = %artifact.name(),
            interface = %self.interface,
            added,
            "implement-interface applied"
        );
        Ok(())
    }
}
