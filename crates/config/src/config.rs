//! Configuration management
//!
//! This module handles loading the modlink configuration file and turning its
//! application sections into typed values.

use crate::rules::ValidationRules;
use crate::{Error, Result};
use indexmap::IndexMap;
use modlink_core::PathStyle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration version this build understands
pub const SUPPORTED_VERSION: &str = "1.0";

/// Top-level keys that are never application sections
pub const RESERVED_KEYS: &[&str] = &[
    "version",
    "library_path",
    "RollBacks",
    "validation",
    "expansion",
    "Template",
];

/// Installer that produced an application's directory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallerKind {
    /// Pinokio browser installs
    Pinokio,
    /// Plain git checkouts and manual installs
    General,
    /// Stability launcher installs
    Stability,
    /// `StabilityMatrix` managed packages
    StabilityMatrix,
}

impl InstallerKind {
    /// Every installer kind, in declaration order
    pub const ALL: [InstallerKind; 4] = [
        Self::Pinokio,
        Self::General,
        Self::Stability,
        Self::StabilityMatrix,
    ];

    /// Tag used for this installer in configuration files
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pinokio => "Pinokio",
            Self::General => "General",
            Self::Stability => "Stability",
            Self::StabilityMatrix => "StabilityMatrix",
        }
    }

    /// Parse an installer tag found in `section`
    pub fn parse(section: &str, tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| Error::InstallerKind {
                section: section.to_string(),
                value: tag.to_string(),
                valid: Self::ALL.iter().map(|k| k.as_str()).collect(),
            })
    }
}

impl fmt::Display for InstallerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source/target template pair as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplatePair {
    /// Where the application expects the directory
    pub source: String,
    /// Where the content should live in the library
    pub target: String,
}

/// Expansion engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Separator style used when normalizing expanded paths
    #[serde(default)]
    pub path_style: PathStyle,

    /// Skip the expansion cache entirely
    #[serde(default)]
    pub lazy: bool,

    /// Maximum number of cached expansions before the oldest is evicted
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Check that drive letters refer to mounted drives
    #[serde(default = "default_validate_drive_letters")]
    pub validate_drive_letters: bool,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            path_style: PathStyle::default(),
            lazy: false,
            cache_capacity: default_cache_capacity(),
            validate_drive_letters: default_validate_drive_letters(),
        }
    }
}

fn default_cache_capacity() -> usize {
    128
}

fn default_validate_drive_letters() -> bool {
    true
}

fn default_version() -> String {
    SUPPORTED_VERSION.to_string()
}

/// One or many path pairs (a lone table is accepted as a single pair)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathList {
    One(PathTemplatePair),
    Many(Vec<PathTemplatePair>),
}

impl Default for PathList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl From<PathList> for Vec<PathTemplatePair> {
    fn from(list: PathList) -> Self {
        match list {
            PathList::One(pair) => vec![pair],
            PathList::Many(pairs) => pairs,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(default)]
    create_sym_links: bool,
    #[serde(default)]
    base_path: PathList,
    #[serde(default)]
    outputs: PathList,
    #[serde(default)]
    special_folders: IndexMap<String, String>,
}

/// A typed application section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationSection {
    /// Section name (the application's display name)
    pub name: String,
    /// Installer that produced the application's layout
    pub installer: InstallerKind,
    /// Package name, bound to the `Package` variable while expanding
    pub package: String,
    /// Whether migration should replace directories with symlinks
    pub create_sym_links: bool,
    /// Model directory pairs
    pub base_path: Vec<PathTemplatePair>,
    /// Output directory pairs
    pub outputs: Vec<PathTemplatePair>,
    /// Special folder name (under the first base source) to library-relative path
    pub special_folders: IndexMap<String, String>,
}

impl ApplicationSection {
    /// Build a section from its raw TOML table
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when `Installer` or `Package` is absent or empty,
    /// `InstallerKind` for unknown installer tags, and `InvalidSection` when the
    /// remaining fields have the wrong shape.
    pub fn from_value(name: &str, value: &toml::Value) -> Result<Self> {
        let table = value.as_table().ok_or_else(|| Error::InvalidSection {
            section: name.to_string(),
            message: "expected a table".to_string(),
        })?;

        let installer = required_str(name, table, "Installer")?;
        let installer = InstallerKind::parse(name, installer)?;
        let package = required_str(name, table, "Package")?.to_string();

        let raw: RawSection = value
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| Error::InvalidSection {
                section: name.to_string(),
                message: e.message().to_string(),
            })?;

        Ok(Self {
            name: name.to_string(),
            installer,
            package,
            create_sym_links: raw.create_sym_links,
            base_path: raw.base_path.into(),
            outputs: raw.outputs.into(),
            special_folders: raw.special_folders,
        })
    }
}

/// Look up a required string field, also accepting its lowercase spelling
fn required_str<'a>(section: &str, table: &'a toml::Table, field: &'static str) -> Result<&'a str> {
    let value = table
        .get(field)
        .or_else(|| table.get(&field.to_lowercase()));
    match value {
        None => Err(Error::MissingField {
            section: section.to_string(),
            field,
        }),
        Some(toml::Value::String(s)) if s.trim().is_empty() => Err(Error::MissingField {
            section: section.to_string(),
            field,
        }),
        Some(toml::Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(Error::InvalidSection {
            section: section.to_string(),
            message: format!("{field} must be a string, found {}", other.type_str()),
        }),
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Library variables (e.g. `base_path_library`)
    #[serde(default)]
    pub library_path: IndexMap<String, String>,

    /// Rollback variables (e.g. `base_path_rollbacks`)
    #[serde(default, rename = "RollBacks")]
    pub rollbacks: IndexMap<String, String>,

    /// Path validation rules
    #[serde(default)]
    pub validation: ValidationRules,

    /// Expansion engine settings
    #[serde(default)]
    pub expansion: ExpansionConfig,

    /// Every other top-level key, in file order
    #[serde(flatten)]
    pub sections: IndexMap<String, toml::Value>,

    /// File this configuration was loaded from
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            library_path: IndexMap::new(),
            rollbacks: IndexMap::new(),
            validation: ValidationRules::default(),
            expansion: ExpansionConfig::default(),
            sections: IndexMap::new(),
            source_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let mut config = Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })?;
        config.source_file = Some(path.to_path_buf());

        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(toml_content: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_content)
            .map_err(|e| Error::Config(format!("Failed to parse config TOML: {e}")))?;

        if config.version != SUPPORTED_VERSION {
            tracing::warn!(
                version = %config.version,
                "Unsupported configuration version, attempting to parse anyway"
            );
        }

        Ok(config)
    }

    /// Names of every application section, in file order
    pub fn application_names(&self) -> Vec<&str> {
        self.section_values().map(|(name, _)| name).collect()
    }

    /// Every application section, typed
    ///
    /// Sections that fail to parse yield their error in place so callers can
    /// skip them individually.
    pub fn applications(&self) -> impl Iterator<Item = (&str, Result<ApplicationSection>)> {
        self.section_values()
            .map(|(name, value)| (name, ApplicationSection::from_value(name, value)))
    }

    /// Raw application section tables, in file order
    pub fn section_values(&self) -> impl Iterator<Item = (&str, &toml::Value)> {
        self.sections
            .iter()
            .filter(|(name, value)| value.is_table() && !RESERVED_KEYS.contains(&name.as_str()))
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Variables defined by `library_path` followed by `RollBacks`
    pub fn variables(&self) -> IndexMap<String, String> {
        self.library_path
            .iter()
            .chain(&self.rollbacks)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
version = "1.0"

[library_path]
base_path_library = "/data/models"
base_path_outputs = "/data/outputs"

[RollBacks]
base_path_rollbacks = "/data/rollbacks"

[ComfyUI]
Installer = "Pinokio"
Package = "comfyui.git"
create_sym_links = true
base_path = [{ source = "/apps/{Package}/models", target = "{base_path_library}" }]
outputs = [{ source = "/apps/{Package}/output", target = "{base_path_outputs}/{Package}" }]

[ComfyUI.special_folders]
embeddings = "textual_inversion"

[Forge]
Installer = "StabilityMatrix"
Package = "forge"
base_path = { source = "/sm/{Package}/models", target = "{base_path_library}" }
"#;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert!(config.library_path.is_empty());
        assert!(config.sections.is_empty());
        assert_eq!(config.expansion.cache_capacity, 128);
        assert!(config.validation.create_missing);
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.application_names(), vec!["ComfyUI", "Forge"]);

        let vars = config.variables();
        assert_eq!(vars["base_path_library"], "/data/models");
        assert_eq!(vars["base_path_rollbacks"], "/data/rollbacks");

        let apps: Vec<_> = config.applications().map(|(_, app)| app.unwrap()).collect();
        assert_eq!(apps[0].installer, InstallerKind::Pinokio);
        assert_eq!(apps[0].package, "comfyui.git");
        assert!(apps[0].create_sym_links);
        assert_eq!(apps[0].base_path[0].target, "{base_path_library}");
        assert_eq!(apps[0].special_folders["embeddings"], "textual_inversion");

        // A single table is a single pair; create_sym_links defaults to false
        assert_eq!(apps[1].base_path.len(), 1);
        assert!(!apps[1].create_sym_links);
        assert!(apps[1].outputs.is_empty());
    }

    #[test]
    fn test_reserved_and_scalar_keys_are_not_sections() {
        let config = Config::from_toml_str(
            r#"
stray = "value"

[Template]
Installer = "General"
Package = "x"

[validation]
max_path_length = 100
"#,
        )
        .unwrap();
        assert!(config.application_names().is_empty());
        assert_eq!(config.validation.max_path_length, 100);
    }

    #[test]
    fn test_invalid_installer_is_section_scoped() {
        let config = Config::from_toml_str(
            r#"
[Bad]
Installer = "Conda"
Package = "x"

[Good]
Installer = "General"
Package = "y"
"#,
        )
        .unwrap();

        let results: Vec<_> = config.applications().collect();
        match &results[0].1 {
            Err(Error::InstallerKind { section, value, valid }) => {
                assert_eq!(section, "Bad");
                assert_eq!(value, "Conda");
                assert_eq!(valid.len(), 4);
            }
            other => panic!("expected installer error, got {other:?}"),
        }
        assert!(results[1].1.is_ok());
    }

    #[test]
    fn test_missing_package() {
        let config = Config::from_toml_str(
            r#"
[NoPackage]
Installer = "General"
"#,
        )
        .unwrap();
        let (_, result) = config.applications().next().unwrap();
        assert!(matches!(
            result,
            Err(Error::MissingField {
                field: "Package",
                ..
            })
        ));
    }

    #[test]
    fn test_lowercase_field_names_accepted() {
        let value: toml::Value = toml::from_str(
            r#"
installer = "Stability"
package = "sd"
"#,
        )
        .unwrap();
        let section = ApplicationSection::from_value("Sd", &value).unwrap();
        assert_eq!(section.installer, InstallerKind::Stability);
        assert_eq!(section.package, "sd");
    }

    #[test]
    fn test_malformed_paths_are_invalid_section() {
        let value: toml::Value = toml::from_str(
            r#"
Installer = "General"
Package = "x"
base_path = "not a table"
"#,
        )
        .unwrap();
        let err = ApplicationSection::from_value("X", &value).unwrap_err();
        assert!(matches!(err, Error::InvalidSection { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.source_file.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/modlink.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_parse_error_mentions_toml() {
        let err = Config::from_toml_str("[library_path\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config TOML"));
    }

    #[test]
    fn test_expansion_settings() {
        let config = Config::from_toml_str(
            r#"
[expansion]
path_style = "windows"
lazy = true
cache_capacity = 4
"#,
        )
        .unwrap();
        assert_eq!(config.expansion.path_style, PathStyle::Windows);
        assert!(config.expansion.lazy);
        assert_eq!(config.expansion.cache_capacity, 4);
        assert!(config.expansion.validate_drive_letters);
    }
}
