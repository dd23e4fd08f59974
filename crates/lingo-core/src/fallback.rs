use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Locales to try after the requested one.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FallbackLocale {
    Single(String),
    List(Vec<String>),
    /// Per-locale lists; `default` applies to every locale.
    Map(BTreeMap<String, Vec<String>>),
}

impl Default for FallbackLocale {
    fn default() -> Self {
        FallbackLocale::List(Vec::new())
    }
}

impl From<&str> for FallbackLocale {
    fn from(locale: &str) -> Self {
        FallbackLocale::Single(locale.to_string())
    }
}

impl From<Vec<&str>> for FallbackLocale {
    fn from(locales: Vec<&str>) -> Self {
        FallbackLocale::List(locales.into_iter().map(str::to_string).collect())
    }
}

impl FallbackLocale {
    fn defaults(&self) -> &[String] {
        match self {
            FallbackLocale::Single(locale) => std::slice::from_ref(locale),
            FallbackLocale::List(locales) => locales,
            FallbackLocale::Map(map) => map.get("default").map(Vec::as_slice).unwrap_or_default(),
        }
    }

    fn entries(&self, locale: &str) -> &[String] {
        match self {
            FallbackLocale::Map(map) => map.get(locale).map(Vec::as_slice).unwrap_or_default(),
            _ => &[],
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// The requested locale, then the configured fallbacks.
    #[default]
    Simple,
    /// Also walks up language tags (`en-US` to `en`) and follows per-locale entries.
    LocaleChain,
}

impl Display for FallbackStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            FallbackStrategy::Simple => write!(f, "simple"),
            FallbackStrategy::LocaleChain => write!(f, "locale_chain"),
        }
    }
}

impl FromStr for FallbackStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(FallbackStrategy::Simple),
            "locale_chain" | "locale-chain" | "chain" => Ok(FallbackStrategy::LocaleChain),
            _ => Err(format!("Unknown fallback strategy: {}", s)),
        }
    }
}

/// Candidate locales for `locale`, without duplicates, in the order they are tried.
pub fn fallback_chain(locale: &str, fallback: &FallbackLocale, strategy: FallbackStrategy) -> Vec<SmolStr> {
    let mut chain = Vec::new();

    match strategy {
        FallbackStrategy::Simple => {
            push_unique(&mut chain, locale);
            let entries = match fallback {
                FallbackLocale::Map(map) => map.get(locale).or_else(|| map.get("default")).map(Vec::as_slice),
                _ => Some(fallback.defaults()),
            };
            for entry in entries.unwrap_or_default() {
                push_unique(&mut chain, entry);
            }
        }
        FallbackStrategy::LocaleChain => {
            visit(&mut chain, locale, fallback);
            for entry in fallback.defaults() {
                visit(&mut chain, entry, fallback);
            }
        }
    }

    chain
}

fn push_unique(chain: &mut Vec<SmolStr>, locale: &str) -> bool {
    if locale.is_empty() || chain.iter().any(|existing| existing == locale) {
        false
    } else {
        chain.push(SmolStr::from(locale));
        true
    }
}

/// Adds `locale`, its mapped fallbacks, then its parent tag.
///
/// A trailing `!` keeps the tag from being truncated.
fn visit(chain: &mut Vec<SmolStr>, locale: &str, fallback: &FallbackLocale) {
    let (locale, explicit) = match locale.strip_suffix('!') {
        Some(locale) => (locale, true),
        None => (locale, false),
    };

    if !push_unique(chain, locale) {
        return;
    }

    for entry in fallback.entries(locale) {
        visit(chain, entry, fallback);
    }

    if explicit {
        return;
    }

    if let Some((parent, _)) = locale.rsplit_once('-') {
        visit(chain, parent, fallback);
    }
}

/// Memoized [`fallback_chain`] results for one configuration.
#[derive(Debug, Default)]
pub struct FallbackChains {
    chains: DashMap<SmolStr, Arc<[SmolStr]>, FxBuildHasher>,
}

impl FallbackChains {
    pub fn get(&self, locale: &str, fallback: &FallbackLocale, strategy: FallbackStrategy) -> Arc<[SmolStr]> {
        if let Some(chain) = self.chains.get(locale) {
            return Arc::clone(chain.value());
        }

        let chain: Arc<[SmolStr]> = fallback_chain(locale, fallback, strategy).into();
        tracing::debug!(locale, chain = ?chain, "computed fallback chain");
        self.chains.insert(SmolStr::from(locale), Arc::clone(&chain));
        chain
    }

    pub fn clear(&self) {
        self.chains.clear();
    }
}
