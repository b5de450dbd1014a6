//! Shared types, error model, and configuration for classweave.
//!
//! This crate is the foundation depended on by all other classweave crates.
//! It provides:
//! - [`ClassweaveError`]: the unified error type, plus [`PersistenceWarning`]
//! - Domain types ([`BinaryName`], [`EligibilityClass`], [`EnhancerDescriptor`], [`RunId`])
//! - Configuration ([`AppConfig`], [`EnhancerEntry`], layered config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, DEFAULT_ENCODING, DefaultsConfig, EnhancerEntry, config_dir,
    config_file_path, init_config, load_config, load_config_from, load_layered,
    load_layered_or_default, profile_path, validate_config,
};
pub use error::{ClassweaveError, EnhancerFailure, PersistenceWarning, Result};
pub use types::{
    BinaryName, CLASS_SUFFIX, EligibilityClass, EnhancerDescriptor, MODULE_MARKER,
    PACKAGE_MARKER, RunId, SOURCE_SUFFIX,
};
