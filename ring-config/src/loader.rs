//! TOML config file loading (spec.md §6: "configuration file parsing" is an
//! external concern; this is the idiomatic Rust substitute for the
//! original's ad hoc `readconf` INI-style parser — see SPEC_FULL.md §6).

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{ConfigError, Result};

/// Load and parse a TOML config file, falling back to `T::default()` when
/// `path` does not exist (matching the original's tolerance for an absent
/// config file: recognized options simply keep their built-in defaults).
pub fn load<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        interval: u64,
        name: String,
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let parsed: Sample = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(parsed, Sample::default());
    }

    #[test]
    fn parses_present_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring-master.toml");
        std::fs::write(&path, "interval = 42\nname = \"x\"\n").unwrap();
        let parsed: Sample = load(&path).unwrap();
        assert_eq!(
            parsed,
            Sample {
                interval: 42,
                name: "x".into()
            }
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring-master.toml");
        std::fs::write(&path, "not = [valid\n").unwrap();
        let err = load::<Sample>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
