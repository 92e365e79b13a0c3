//! Settings file handling

use anyhow::Context;
use metaquery_codegen::{SynthesisConfig, TypeTarget};
use metaquery_core::DatabaseType;
use std::path::Path;

/// Settings file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "metaquery.toml";

/// Load settings from `path`, or from `metaquery.toml` when it exists.
///
/// An explicit path that cannot be read is an error; a missing default file
/// is not.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<SynthesisConfig> {
    match path {
        Some(path) => read_settings(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            read_settings(Path::new(DEFAULT_CONFIG_FILE))
        }
        None => Ok(SynthesisConfig::default()),
    }
}

fn read_settings(path: &Path) -> anyhow::Result<SynthesisConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let config: SynthesisConfig = toml::from_str(&raw)
        .with_context(|| format!("invalid settings file '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), database = %config.database, "Loaded settings");
    Ok(config)
}

/// Apply command-line overrides
pub fn apply_overrides(
    mut config: SynthesisConfig,
    database: Option<DatabaseType>,
    target: Option<TypeTarget>,
) -> SynthesisConfig {
    if let Some(db) = database {
        config = config.with_database(db);
    }
    if let Some(target) = target {
        config = config.with_type_target(target);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_explicit_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database = \"sqlite\"\nroute_prefix = \"internal\"").unwrap();

        let config = load_settings(Some(file.path())).unwrap();
        assert_eq!(config.database, DatabaseType::SQLite);
        assert_eq!(config.route_prefix, "internal");
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_missing_explicit_settings_fail() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read settings file"));
    }

    #[test]
    fn test_invalid_settings_fail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database = \"oracle\"").unwrap();
        assert!(load_settings(Some(file.path())).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let config = apply_overrides(
            SynthesisConfig::default(),
            Some(DatabaseType::MySQL),
            Some(TypeTarget::TypeScript),
        );
        assert_eq!(config.database, DatabaseType::MySQL);
        assert_eq!(config.type_target, TypeTarget::TypeScript);

        let untouched = apply_overrides(SynthesisConfig::default(), None, None);
        assert_eq!(untouched, SynthesisConfig::default());
    }
}
