//! Path validation rules
//!
//! Rules are read once from the `[validation]` table and stay fixed for the
//! whole run.

use serde::{Deserialize, Serialize};

/// Toggles and limits applied by the path validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    /// Check that sources and targets exist
    pub check_existence: bool,
    /// Reject pairs where one path contains the other, or paths reused across pairs
    pub detect_cycles: bool,
    /// Enforce `max_path_length`
    pub validate_length: bool,
    /// Reject relative paths
    pub require_absolute: bool,
    /// Longest accepted path, in characters
    pub max_path_length: usize,
    /// Create missing directories instead of reporting them
    pub create_missing: bool,
    /// Permission bits for directories created by the validator (Unix only)
    #[serde(with = "octal_mode")]
    pub create_missing_mode: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            check_existence: true,
            detect_cycles: true,
            validate_length: true,
            require_absolute: true,
            max_path_length: 260,
            create_missing: true,
            create_missing_mode: 0o755,
        }
    }
}

/// Accept the mode either as an integer or as an octal string like `"0o755"`
mod octal_mode {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mode {
        Int(u32),
        Text(String),
    }

    pub fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0o{mode:o}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        match Mode::deserialize(deserializer)? {
            Mode::Int(mode) => Ok(mode),
            Mode::Text(text) => {
                let digits = text.trim_start_matches("0o").trim_start_matches('0');
                if digits.is_empty() {
                    return Ok(0);
                }
                u32::from_str_radix(digits, 8)
                    .map_err(|_| de::Error::custom(format!("invalid octal mode '{text}'")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        validation: ValidationRules,
    }

    #[test]
    fn test_defaults() {
        let rules = ValidationRules::default();
        assert!(rules.check_existence);
        assert!(rules.detect_cycles);
        assert!(rules.validate_length);
        assert!(rules.require_absolute);
        assert_eq!(rules.max_path_length, 260);
        assert!(rules.create_missing);
        assert_eq!(rules.create_missing_mode, 0o755);
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let holder: Holder = toml::from_str("[validation]\ncreate_missing = false\n").unwrap();
        assert!(!holder.validation.create_missing);
        assert!(holder.validation.check_existence);
        assert_eq!(holder.validation.max_path_length, 260);
    }

    #[test]
    fn test_mode_as_octal_string() {
        let holder: Holder =
            toml::from_str("[validation]\ncreate_missing_mode = \"0o700\"\n").unwrap();
        assert_eq!(holder.validation.create_missing_mode, 0o700);

        let holder: Holder = toml::from_str("[validation]\ncreate_missing_mode = 493\n").unwrap();
        assert_eq!(holder.validation.create_missing_mode, 0o755);
    }

    #[test]
    fn test_bad_mode_rejected() {
        let result: Result<Holder, _> =
            toml::from_str("[validation]\ncreate_missing_mode = \"rwx\"\n");
        assert!(result.is_err());
    }
}
