use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use lingo_core::{FallbackLocale, FallbackStrategy, ResolverOptions};
use miette::{IntoDiagnostic, miette};
use serde::Deserialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub const PROJECT_FILE: &str = "lingo.toml";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "lingo=info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.log_level = log_level;
        } else if let Ok(log_level) = env::var("LINGO_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(log_format) = env::var("LINGO_LOG_FORMAT") {
            config.log_format = match log_format.to_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    eprintln!(
                        "Warning: Invalid LINGO_LOG_FORMAT value '{}', using default text",
                        log_format
                    );
                    LogFormat::Text
                }
            };
        }

        config
    }

    /// Raises the level for `-v` (debug) and `-vv` (trace). The `lingo` target prefix covers every crate.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let level = match verbose {
            0 => return self,
            1 => "debug",
            _ => "trace",
        };
        self.log_level = format!("lingo={level}");
        self
    }
}

/// Installs the global subscriber. Logs go to stderr so command output stays clean.
pub fn init_tracing(config: &Config, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new(&config.log_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into())
    };

    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    if let Err(err) = result {
        eprintln!("Warning: Failed to initialize logging: {}", err);
    }
}

/// What `resolve` prints for a key no locale defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Print the key itself.
    #[default]
    Key,
    /// Fail with an error.
    Unresolved,
    /// Render the key as a message source.
    Format,
}

/// Contents of `lingo.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub locale: Option<String>,
    pub fallback_locale: Option<FallbackLocale>,
    pub fallback_strategy: Option<FallbackStrategy>,
    pub missing: Option<MissingPolicy>,
    pub escape_parameter: Option<bool>,
    pub messages: Vec<PathBuf>,
}

impl ProjectConfig {
    pub fn from_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|err| miette!("Invalid {}: {}", PROJECT_FILE, err))
    }

    pub fn load(path: &Path) -> miette::Result<Self> {
        let content = fs::read_to_string(path).into_diagnostic()?;
        let mut config = Self::from_toml(&content)?;

        if let Some(dir) = path.parent() {
            config.messages = config.messages.into_iter().map(|file| dir.join(file)).collect();
        }

        Ok(config)
    }

    /// Loads `lingo.toml` from `dir` when it exists.
    pub fn discover(dir: &Path) -> miette::Result<Option<Self>> {
        let path = dir.join(PROJECT_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        tracing::debug!(path = %path.display(), "loading project config");
        Self::load(&path).map(Some)
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        let mut options = ResolverOptions::default();

        if let Some(locale) = &self.locale {
            options.locale = locale.as_str().into();
        }
        if let Some(fallback) = &self.fallback_locale {
            options.fallback_locale = fallback.clone();
        }
        if let Some(strategy) = self.fallback_strategy {
            options.fallback_strategy = strategy;
        }
        if let Some(missing) = self.missing {
            apply_missing_policy(&mut options, missing);
        }
        if let Some(escape) = self.escape_parameter {
            options.escape_parameter = escape;
        }

        options
    }
}

pub fn apply_missing_policy(options: &mut ResolverOptions, missing: MissingPolicy) {
    options.unresolving = missing == MissingPolicy::Unresolved;
    options.fallback_format = missing == MissingPolicy::Format;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, "lingo=info");
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[rstest]
    #[case::quiet(0, "lingo=info")]
    #[case::debug(1, "lingo=debug")]
    #[case::trace(3, "lingo=trace")]
    fn test_with_verbosity(#[case] verbose: u8, #[case] expected: &str) {
        assert_eq!(Config::default().with_verbosity(verbose).log_level, expected);
    }

    #[test]
    fn test_config_from_env() {
        let original_log_format = env::var("LINGO_LOG_FORMAT").ok();

        unsafe {
            env::set_var("LINGO_LOG_FORMAT", "json");
        }

        let config = Config::from_env();
        assert_eq!(config.log_format, LogFormat::Json);

        unsafe {
            env::set_var("LINGO_LOG_FORMAT", "xml");
        }

        let config = Config::from_env();
        assert_eq!(config.log_format, LogFormat::Text);

        unsafe {
            match original_log_format {
                Some(val) => env::set_var("LINGO_LOG_FORMAT", val),
                None => env::remove_var("LINGO_LOG_FORMAT"),
            }
        }
    }

    #[test]
    fn test_project_config_from_toml() {
        let config = ProjectConfig::from_toml(
            r#"
locale = "de-CH"
fallback_strategy = "locale_chain"
missing = "unresolved"
escape_parameter = true
messages = ["locales/en-US.json"]

[fallback_locale]
de-CH = ["fr", "it"]
default = ["en"]
"#,
        )
        .unwrap();

        let options = config.resolver_options();
        assert_eq!(options.locale, "de-CH");
        assert_eq!(options.fallback_strategy, FallbackStrategy::LocaleChain);
        assert!(options.unresolving);
        assert!(!options.fallback_format);
        assert!(options.escape_parameter);
        assert!(matches!(options.fallback_locale, FallbackLocale::Map(_)));
        assert_eq!(config.messages, vec![PathBuf::from("locales/en-US.json")]);
    }

    #[rstest]
    #[case::single(r#"fallback_locale = "en""#, FallbackLocale::Single("en".into()))]
    #[case::list(r#"fallback_locale = ["ja", "en"]"#, FallbackLocale::List(vec!["ja".into(), "en".into()]))]
    fn test_project_config_fallback_shapes(#[case] content: &str, #[case] expected: FallbackLocale) {
        let config = ProjectConfig::from_toml(content).unwrap();
        assert_eq!(config.resolver_options().fallback_locale, expected);
    }

    #[test]
    fn test_project_config_rejects_unknown_fields() {
        assert!(ProjectConfig::from_toml("locales = 1").is_err());
    }

    #[test]
    fn test_discover_without_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProjectConfig::discover(dir.path()).unwrap(), None);
    }

    #[rstest]
    #[case::key(MissingPolicy::Key, false, false)]
    #[case::unresolved(MissingPolicy::Unresolved, true, false)]
    #[case::format(MissingPolicy::Format, false, true)]
    fn test_apply_missing_policy(#[case] missing: MissingPolicy, #[case] unresolving: bool, #[case] fallback_format: bool) {
        let mut options = ResolverOptions::default();
        apply_missing_policy(&mut options, missing);
        assert_eq!(options.unresolving, unresolving);
        assert_eq!(options.fallback_format, fallback_format);
    }
}
