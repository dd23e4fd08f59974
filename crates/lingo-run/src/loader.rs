use std::fs;
use std::path::{Path, PathBuf};

use lingo_core::MessageValue;
use miette::{IntoDiagnostic, miette};
use serde_json::Value;

/// Encoding of a locale message file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Toml,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("json") => Ok(FileFormat::Json),
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("toml") => Ok(FileFormat::Toml),
            _ => Err(miette!(
                "Unsupported message file: {} (expected .json, .yaml, .yml or .toml)",
                path.display()
            )),
        }
    }

    pub fn parse(&self, content: &str) -> miette::Result<Value> {
        match self {
            FileFormat::Json => serde_json::from_str(content).into_diagnostic(),
            FileFormat::Yaml => serde_yaml::from_str(content).into_diagnostic(),
            FileFormat::Toml => toml::from_str(content).into_diagnostic(),
        }
    }
}

/// A `--messages` argument: `PATH` or `LOCALE=PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSource {
    pub locale: Option<String>,
    pub path: PathBuf,
}

impl std::str::FromStr for MessageSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((locale, path)) if is_locale_tag(locale) => Ok(MessageSource {
                locale: Some(locale.to_string()),
                path: PathBuf::from(path),
            }),
            Some((locale, _)) => Err(format!("'{}' is not a locale tag", locale)),
            None => Ok(MessageSource {
                locale: None,
                path: PathBuf::from(s),
            }),
        }
    }
}

impl From<PathBuf> for MessageSource {
    fn from(path: PathBuf) -> Self {
        MessageSource { locale: None, path }
    }
}

/// Reads a message file into `(locale, tree)` pairs.
///
/// The locale comes from the argument or the file stem when it looks like a language tag
/// (`en-US.json`). Otherwise the top level must map locales to trees (`messages.yaml`).
pub fn load_messages(source: &MessageSource) -> miette::Result<Vec<(String, MessageValue)>> {
    let path = &source.path;
    if !path.exists() {
        return Err(miette!("File not found: {}", path.display()));
    }

    let format = FileFormat::from_path(path)?;
    let content = fs::read_to_string(path).into_diagnostic()?;
    let value = format.parse(&content)?;

    let locale = source.locale.clone().or_else(|| {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| is_locale_tag(stem))
            .map(str::to_string)
    });

    tracing::debug!(path = %path.display(), ?format, ?locale, "loading messages");

    match (locale, value) {
        (Some(locale), value @ Value::Object(_)) => Ok(vec![(locale, MessageValue::from_json(value)?)]),
        (Some(_), _) => Err(miette!("{}: expected an object of messages", path.display())),
        (None, Value::Object(locales)) => locales
            .into_iter()
            .map(|(locale, messages)| {
                if !is_locale_tag(&locale) || !messages.is_object() {
                    return Err(miette!(
                        "{}: top-level key '{}' is not a locale with messages",
                        path.display(),
                        locale
                    ));
                }
                Ok((locale, MessageValue::from_json(messages)?))
            })
            .collect(),
        (None, _) => Err(miette!("{}: expected an object of locales", path.display())),
    }
}

/// Loose language tag check: a 2-3 letter language followed by alphanumeric subtags.
pub fn is_locale_tag(tag: &str) -> bool {
    let mut subtags = tag.split(['-', '_']);
    let language_ok = subtags
        .next()
        .is_some_and(|language| (2..=3).contains(&language.len()) && language.chars().all(|c| c.is_ascii_alphabetic()));

    language_ok && subtags.all(|subtag| (1..=8).contains(&subtag.len()) && subtag.chars().all(|c| c.is_ascii_alphanumeric()))
}
