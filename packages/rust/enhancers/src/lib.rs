//! Transformer plugins and the registry that orders them.
//!
//! This crate provides:
//! - [`Enhancer`]: the contract every transformer implements
//! - [`EnhancerCatalog`]: identifier → factory lookup used to build a registry
//! - [`EnhancerRegistry`]: the ordered list applied to every eligible artifact
//! - Built-ins: [`InjectFieldEnhancer`], [`ImplementInterfaceEnhancer`]

mod implement_interface;
mod inject_field;
mod options;
pub mod registry;

use classweave_loader::{ArtifactDescription, IsolatedLoader};
use classweave_shared::EnhancerFailure;

pub use implement_interface::ImplementInterfaceEnhancer;
pub use inject_field::InjectFieldEnhancer;
pub use registry::{EnhancerCatalog, EnhancerFactory, EnhancerRegistry, RegisteredEnhancer};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// What an enhancer may consult while transforming one artifact.
#[derive(Debug, Clone, Copy)]
pub struct EnhanceContext<'a> {
    /// Loader for structural queries about other classes ("does this type exist?").
    pub loader: &'a IsolatedLoader,
    /// Configured source encoding.
    pub encoding: &'a str,
}

/// A pluggable transformation unit.
///
/// `enhance` mutates the description's byte buffer in place. Returning an
/// error aborts the whole run; the orchestrator wraps it with this
/// enhancer's identity and the artifact's binary name.
pub trait Enhancer {
    /// Identifier used in configuration, logs and error messages.
    fn id(&self) -> &str;

    /// Semantic version, reported alongside the identifier.
    fn version(&self) -> &str;

    fn enhance(
        &self,
        artifact: &mut ArtifactDescription,
        ctx: &EnhanceContext<'_>,
    ) -> Result<(), EnhancerFailure>;
}
