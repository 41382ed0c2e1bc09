//! Overlay configuration types

use crate::error::{OverlayError, OverlayResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default file name looked up next to the generated sources
pub const CONFIG_FILE_NAME: &str = "protocast.toml";

/// Naming convention applied to extension names when they become tag fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCase {
    /// `ssz_size` stays `ssz_size`
    #[default]
    Snake,
    /// `ssz_size` becomes `ssz-size`
    Kebab,
    /// `ssz_size` becomes `sszSize`
    Camel,
}

/// Configuration for one overlay run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Name of the `FieldOptions` extension that declares the override type
    pub cast_extension: String,

    /// Prefix that marks a zero-argument accessor method (`get_` + field name)
    ///
    /// `prost-build` itself names getters after the field with no prefix
    /// (`fn slot(&self)`); set this to `""` to match those.
    pub accessor_prefix: String,

    /// Attribute that carries tag fragments on a field or oneof variant
    ///
    /// Fragments render as `#[cast(ssz_size = "32")]` with the default value.
    pub tag_attribute: String,

    /// Case conversion applied to extension names before they become fragments
    pub tag_case: TagCase,

    /// Override type names whose zero value is a fixed-size byte array
    ///
    /// Keys are bare type names (no origin), values are array lengths.
    pub zero_arrays: BTreeMap<String, usize>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            cast_extension: "cast_type".to_string(),
            accessor_prefix: "get_".to_string(),
            tag_attribute: "cast".to_string(),
            tag_case: TagCase::default(),
            zero_arrays: default_zero_arrays(),
        }
    }
}

fn default_zero_arrays() -> BTreeMap<String, usize> {
    [
        ("Domain", 32),
        ("Hash", 32),
        ("PublicKey", 48),
        ("Root", 32),
        ("Signature", 96),
        ("Version", 4),
    ]
    .into_iter()
    .map(|(name, size)| (name.to_string(), size))
    .collect()
}

impl OverlayConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// Missing keys take their default values. A `[zero_arrays]` table is
    /// merged over the built-in entries instead of replacing them.
    pub fn from_toml_str(content: &str) -> OverlayResult<Self> {
        let mut config: OverlayConfig = toml::from_str(content)?;
        for (name, size) in default_zero_arrays() {
            config.zero_arrays.entry(name).or_insert(size);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> OverlayResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| OverlayError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Load `protocast.toml` from a directory if present, defaults otherwise
    pub fn discover(dir: impl AsRef<Path>) -> OverlayResult<Self> {
        let candidate = dir.as_ref().join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> OverlayResult<()> {
        if self.cast_extension.trim().is_empty() {
            return Err(OverlayError::Config(
                "cast_extension cannot be empty".to_string(),
            ));
        }

        if !self
            .accessor_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(OverlayError::Config(format!(
                "accessor_prefix `{}` can only contain letters, digits and `_`",
                self.accessor_prefix
            )));
        }

        if syn::parse_str::<syn::Ident>(&self.tag_attribute).is_err() {
            return Err(OverlayError::Config(format!(
                "tag_attribute `{}` is not a valid attribute name",
                self.tag_attribute
            )));
        }

        if let Some((name, _)) = self.zero_arrays.iter().find(|(_, size)| **size == 0) {
            return Err(OverlayError::Config(format!(
                "zero_arrays entry `{name}` must have a size greater than zero"
            )));
        }

        Ok(())
    }

    /// Array length registered for a bare override type name
    pub fn zero_array_len(&self, type_name: &str) -> Option<usize> {
        self.zero_arrays.get(type_name).copied()
    }
}
