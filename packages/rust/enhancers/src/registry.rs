//! Enhancer catalog and the ordered registry built from configuration.

use std::collections::BTreeMap;

use classweave_shared::{ClassweaveError, EnhancerDescriptor, EnhancerEntry, Result};
use tracing::{debug, info};

use crate::{Enhancer, ImplementInterfaceEnhancer, InjectFieldEnhancer};

/// Builds an enhancer from its `[enhancers.options]` table.
pub type EnhancerFactory = Box<dyn Fn(&toml::Table) -> Result<Box<dyn Enhancer>>>;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Known enhancer identifiers and how to construct them.
#[derive(Default)]
pub struct EnhancerCatalog {
    factories: BTreeMap<String, EnhancerFactory>,
}

impl EnhancerCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with every built-in enhancer registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(InjectFieldEnhancer::ID, |options| {
            Ok(Box::new(InjectFieldEnhancer::from_options(options)?))
        });
        catalog.register(ImplementInterfaceEnhancer::ID, |options| {
            Ok(Box::new(ImplementInterfaceEnhancer::from_options(options)?))
        });
        catalog
    }

    /// Register (or replace) the factory for `id`.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        factory: impl Fn(&toml::Table) -> Result<Box<dyn Enhancer>> + 'static,
    ) {
        self.factories.insert(id.into(), Box::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    fn create(&self, entry: &EnhancerEntry) -> Result<Box<dyn Enhancer>> {
        let factory = self.factories.get(&entry.id).ok_or_else(|| {
            let known: Vec<&str> = self.ids().collect();
            ClassweaveError::config(format!(
                "unknown enhancer `{}` (known: {})",
                entry.id,
                known.join(", ")
            ))
        })?;
        factory(&entry.options)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// One enhancer bound to its slot in the registry.
pub struct RegisteredEnhancer {
    descriptor: EnhancerDescriptor,
    enhancer: Box<dyn Enhancer>,
}

impl RegisteredEnhancer {
    pub fn descriptor(&self) -> &EnhancerDescriptor {
        &self.descriptor
    }

    pub fn enhancer(&self) -> &dyn Enhancer {
        self.enhancer.as_ref()
    }
}

/// Enhancers in the order configuration declared them. Never re-sorted.
#[derive(Default)]
pub struct EnhancerRegistry {
    entries: Vec<RegisteredEnhancer>,
}

impl EnhancerRegistry {
    /// Build the registry from configured entries, in declared order.
    pub fn from_config(entries: &[EnhancerEntry], catalog: &EnhancerCatalog) -> Result<Self> {
        let enhancers = entries
            .iter()
            .map(|entry| catalog.create(entry))
            .collect::<Result<Vec<_>>>()?;
        let registry = Self::from_enhancers(enhancers);

        info!(
            enhancers = ?registry.descriptors().iter().map(ToString::to_string).collect::<Vec<_>>(),
            "enhancer registry loaded"
        );
        Ok(registry)
    }

    /// Wrap already-constructed enhancers, keeping their order.
    pub fn from_enhancers(enhancers: Vec<Box<dyn Enhancer>>) -> Self {
        let entries = enhancers
            .into_iter()
            .enumerate()
            .map(|(position, enhancer)| {
                let descriptor = EnhancerDescriptor {
                    id: enhancer.id().to_string(),
                    version: enhancer.version().to_string(),
                    position,
                };
                debug!(%descriptor, position, "registered enhancer");
                RegisteredEnhancer {
                    descriptor,
                    enhancer,
                }
            })
            .collect();
        Self { entries }
    }

    /// Enhancers in application order.
    pub fn ordered(&self) -> &[RegisteredEnhancer] {
        &self.entries
    }

    pub fn descriptors(&self) -> Vec<EnhancerDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
