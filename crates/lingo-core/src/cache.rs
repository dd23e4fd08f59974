use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lingo_compiler::CompileError;
use rustc_hash::{FxBuildHasher, FxHasher};
use serde::Serialize;
use smol_str::SmolStr;

use crate::function::MessageFunction;
use crate::path::normalize_path;

/// Identifies one compiled message. `key` is stored normalized, so every spelling of a path shares one entry.
#[derive(PartialEq, Eq, Debug, Clone, Hash)]
pub struct CacheKey {
    pub locale: SmolStr,
    pub key: String,
    pub fingerprint: u64,
}

impl CacheKey {
    pub fn new(locale: impl Into<SmolStr>, key: impl AsRef<str>, fingerprint: u64) -> Self {
        Self {
            locale: locale.into(),
            key: normalize_path(key.as_ref()).into_owned(),
            fingerprint,
        }
    }
}

/// Hash of a message source, or of anything else that compiles to a message.
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub compiles: u64,
    pub entries: usize,
}

/// Compiled messages shared between resolutions.
///
/// Concurrent misses on the same key may both compile; the first insert wins and both callers
/// get that function.
#[derive(Default)]
pub struct CompileCache {
    entries: DashMap<CacheKey, MessageFunction, FxBuildHasher>,
    hits: AtomicU64,
    misses: AtomicU64,
    compiles: AtomicU64,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<MessageFunction> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Failed compilations are not cached.
    pub fn get_or_compile(
        &self,
        key: CacheKey,
        compile: impl FnOnce() -> Result<MessageFunction, CompileError>,
    ) -> Result<MessageFunction, CompileError> {
        if let Some(function) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(locale = %key.locale, key = %key.key, "compile cache hit");
            return Ok(function);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(locale = %key.locale, key = %key.key, "compile cache miss");

        let function = compile()?;
        self.compiles.fetch_add(1, Ordering::Relaxed);

        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => Ok(entry.insert(function).value().clone()),
        }
    }

    pub fn invalidate_locale(&self, locale: &str) {
        self.entries.retain(|key, _| key.locale != locale);
    }

    /// Drops `key` and every message nested below it.
    pub fn invalidate_key(&self, locale: &str, key: &str) {
        let key = normalize_path(key);
        let key = key.as_ref();
        self.entries.retain(|entry, _| {
            entry.locale != locale
                || !(entry.key == key
                    || entry
                        .key
                        .strip_prefix(key)
                        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('[')))
        });
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compiles: self.compiles.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl std::fmt::Debug for CompileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileCache").field("stats", &self.stats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MessageContext;
    use crate::function::compile_source;
    use lingo_compiler::CompileErrorKind;
    use rstest::rstest;
    use std::sync::Arc;

    fn key(locale: &str, key: &str) -> CacheKey {
        CacheKey::new(locale, key, fingerprint(key))
    }

    #[test]
    fn test_get_or_compile_compiles_once() {
        let cache = CompileCache::new();
        let first = cache.get_or_compile(key("en", "a"), || compile_source("hi")).unwrap();
        let second = cache
            .get_or_compile(key("en", "a"), || panic!("served from cache"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second(&MessageContext::new("en")), "hi");
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                compiles: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = CompileCache::new();
        let err = cache
            .get_or_compile(key("en", "a"), || {
                Err(CompileError::new(CompileErrorKind::EmptyPlaceholder, None))
            })
            .err()
            .unwrap();

        assert_eq!(err.kind, CompileErrorKind::EmptyPlaceholder);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().compiles, 0);
    }

    #[test]
    fn test_fingerprint_separates_sources() {
        let cache = CompileCache::new();
        cache
            .get_or_compile(CacheKey::new("en", "a", fingerprint("one")), || compile_source("one"))
            .unwrap();
        let changed = cache
            .get_or_compile(CacheKey::new("en", "a", fingerprint("two")), || compile_source("two"))
            .unwrap();

        assert_eq!(changed(&MessageContext::new("en")), "two");
        assert_eq!(cache.stats().compiles, 2);
    }

    #[rstest]
    #[case::with_children("a", vec!["ab", "c"])]
    #[case::nested("a.b", vec!["a", "a.0", "ab", "c"])]
    #[case::quoted_nested("a['b']", vec!["a", "a.0", "ab", "c"])]
    #[case::index("a[0]", vec!["a", "a.b", "ab", "c"])]
    #[case::leaf("c", vec!["a", "a.0", "a.b", "ab"])]
    fn test_invalidate_key(#[case] target: &str, #[case] expected: Vec<&str>) {
        let cache = CompileCache::new();
        for name in ["a", "a.b", "a[0]", "ab", "c"] {
            cache.get_or_compile(key("en", name), || compile_source(name)).unwrap();
        }
        cache.get_or_compile(key("ja", target), || compile_source("x")).unwrap();

        cache.invalidate_key("en", target);

        let mut remaining: Vec<_> = cache
            .entries
            .iter()
            .filter(|entry| entry.key().locale == "en")
            .map(|entry| entry.key().key.clone())
            .collect();
        remaining.sort();
        assert_eq!(remaining, expected);
        assert!(cache.get(&key("ja", target)).is_some());
    }

    #[test]
    fn test_invalidate_locale_and_clear() {
        let cache = CompileCache::new();
        for locale in ["en", "ja"] {
            cache.get_or_compile(key(locale, "a"), || compile_source("a")).unwrap();
        }

        cache.invalidate_locale("en");
        assert!(cache.get(&key("en", "a")).is_none());
        assert!(cache.get(&key("ja", "a")).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
