//! Configuration presets for common scenarios

use super::{Config, DisplayConfig, Fields, Format};

impl Config {
    /// Create configuration from environment variables
    ///
    /// - `KEYTURN_LOG`, then `RUST_LOG`: filter directive
    /// - `DEBUG=true`: `debug` level when no directive is set
    /// - `KEYTURN_LOG_FORMAT`: `pretty`, `compact` or `json`
    /// - `KEYTURN_SERVICE`, `KEYTURN_ENV`: root span fields
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(level) = lookup("KEYTURN_LOG").or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        } else if lookup("DEBUG").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            config.level = "debug".to_string();
        }

        if let Some(format) = lookup("KEYTURN_LOG_FORMAT") {
            config.format = format.parse().unwrap_or(Format::Compact);
        }

        if config.format == Format::Json {
            config.display.colors = false;
        }

        config.fields = Fields {
            service: lookup("KEYTURN_SERVICE"),
            env: lookup("KEYTURN_ENV"),
            version: None,
        };

        config
    }

    /// Local troubleshooting: pretty output, keyturn crates at `debug`,
    /// dependencies (AWS SDK, hyper) kept at `info`
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "info,keyturn_credential=debug,keyturn_cli=debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                source: true,
                ..DisplayConfig::default()
            },
            fields: Fields {
                env: Some("development".to_string()),
                ..Fields::default()
            },
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                flatten: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[rstest]
    #[case::keyturn_log_wins(&[("KEYTURN_LOG", "warn"), ("RUST_LOG", "trace")], "warn")]
    #[case::rust_log_fallback(&[("RUST_LOG", "trace")], "trace")]
    #[case::debug_flag(&[("DEBUG", "true")], "debug")]
    #[case::debug_flag_ignored_with_directive(&[("DEBUG", "true"), ("RUST_LOG", "error")], "error")]
    #[case::debug_flag_false(&[("DEBUG", "false")], "info")]
    #[case::nothing_set(&[], "info")]
    fn test_level_from_env(#[case] vars: &[(&str, &str)], #[case] expected: &str) {
        assert_eq!(Config::from_lookup(lookup(vars)).level, expected);
    }

    #[test]
    fn test_json_format_disables_colors() {
        let config = Config::from_lookup(lookup(&[("KEYTURN_LOG_FORMAT", "JSON")]));
        assert_eq!(config.format, Format::Json);
        assert!(!config.display.colors);
    }

    #[test]
    fn test_root_fields_from_env() {
        let config = Config::from_lookup(lookup(&[("KEYTURN_SERVICE", "reaper")]));
        assert_eq!(config.fields.service.as_deref(), Some("reaper"));
        assert!(!config.fields.is_empty());
    }

    #[test]
    fn test_development_keeps_dependencies_quiet() {
        let config = Config::development();
        assert_eq!(config.format, Format::Pretty);
        assert!(config.level.starts_with("info,"));
        assert!(config.level.contains("keyturn_credential=debug"));
        assert_eq!(config.fields.env.as_deref(), Some("development"));
    }

    #[test]
    fn test_production_is_json() {
        let config = Config::production();
        assert_eq!(config.format, Format::Json);
        assert!(config.display.flatten);
    }
}
