//! Application configuration for classweave.
//!
//! User config lives at `~/.classweave/classweave.toml`. Profile overlays
//! (`classweave.<profile>.toml`) sit next to the base file and are applied in
//! the order given. CLI flags override config file values, which override
//! defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClassweaveError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "classweave.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".classweave";

/// Encoding used when none (or a blank one) is configured.
pub const DEFAULT_ENCODING: &str = "utf-8";

// ---------------------------------------------------------------------------
// Config structs (matching classweave.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Build layout: where the classes are and what they depend on.
    #[serde(default)]
    pub build: BuildConfig,

    /// Transformers, in the order they are applied.
    #[serde(default)]
    pub enhancers: Vec<EnhancerEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Source encoding handed to enhancers.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Log level used when no `-v` flag is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether the walker descends into subdirectories.
    #[serde(default = "default_true")]
    pub recurse: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            log_level: default_log_level(),
            recurse: true,
        }
    }
}

impl DefaultsConfig {
    /// The configured encoding, falling back to [`DEFAULT_ENCODING`] when blank.
    pub fn effective_encoding(&self) -> &str {
        let trimmed = self.encoding.trim();
        if trimmed.is_empty() {
            DEFAULT_ENCODING
        } else {
            trimmed
        }
    }
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_true() -> bool {
    true
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory holding the compiled classes to enhance.
    #[serde(default = "default_classes_dir")]
    pub classes_dir: String,

    /// Resolved dependency locations (directories or archives), in order.
    #[serde(default)]
    pub classpath: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            classes_dir: default_classes_dir(),
            classpath: Vec::new(),
        }
    }
}

fn default_classes_dir() -> String {
    "target/classes".into()
}

/// `[[enhancers]]` entry: one transformer and its options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancerEntry {
    /// Identifier looked up in the enhancer catalog.
    pub id: String,
    /// Enhancer-specific options, passed through verbatim.
    #[serde(default)]
    pub options: toml::Table,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.classweave/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ClassweaveError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.classweave/classweave.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    load_layered(path, &[])
}

/// Path of the overlay for `profile` next to `base`: `classweave.toml` →
/// `classweave.<profile>.toml`.
pub fn profile_path(base: &Path, profile: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "classweave".into());
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "toml".into());
    base.with_file_name(format!("{stem}.{profile}.{ext}"))
}

/// Load `base` and apply each profile overlay in order.
///
/// Tables merge key by key; arrays (including `[[enhancers]]`) and scalars
/// in an overlay replace the base value. A missing overlay is skipped with a
/// warning; a missing base file is an error.
pub fn load_layered(base: &Path, profiles: &[String]) -> Result<AppConfig> {
    let merged = read_table(base)?;
    apply_profiles(merged, base, profiles)
}

/// Like [`load_layered`], but a missing `base` starts from the defaults.
///
/// Overlays are still looked up next to `base`, so `--profile` works before
/// the base file has been created.
pub fn load_layered_or_default(base: &Path, profiles: &[String]) -> Result<AppConfig> {
    if base.exists() {
        return load_layered(base, profiles);
    }
    tracing::debug!(path = ?base, "config file not found, layering over defaults");
    let defaults = toml::Table::try_from(AppConfig::default()).map_err(|e| {
        ClassweaveError::config(format!("failed to serialize default config: {e}"))
    })?;
    apply_profiles(defaults, base, profiles)
}

fn apply_profiles(mut merged: toml::Table, base: &Path, profiles: &[String]) -> Result<AppConfig> {
    for profile in profiles {
        let overlay_path = profile_path(base, profile);
        if !overlay_path.exists() {
            tracing::warn!(path = ?overlay_path, profile, "profile overlay not found, skipping");
            continue;
        }
        let overlay = read_table(&overlay_path)?;
        merge_tables(&mut merged, overlay);
        tracing::debug!(path = ?overlay_path, profile, "applied profile overlay");
    }

    let config: AppConfig = toml::Value::Table(merged).try_into().map_err(|e| {
        ClassweaveError::config(format!("failed to parse {}: {e}", base.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path).map_err(|e| ClassweaveError::io(path, e))?;
    toml::from_str::<toml::Table>(&content).map_err(|e| {
        ClassweaveError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Reject configs the registry could not be built from.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if let Some(pos) = config.enhancers.iter().position(|e| e.id.trim().is_empty()) {
        return Err(ClassweaveError::config(format!(
            "enhancer #{} has an empty id",
            pos + 1
        )));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ClassweaveError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ClassweaveError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ClassweaveError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
