use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use dashmap::DashMap;
use itertools::Itertools;
use lingo_compiler::CompileError;
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;

use crate::cache::{CacheKey, CacheStats, CompileCache, fingerprint};
use crate::context::{DEFAULT_MAX_LINKED_DEPTH, DefaultProcessor, MessageContext, MessageLookup, MessageProcessor};
use crate::error::Error;
use crate::events::{EventBus, ResolverEvent};
use crate::fallback::{FallbackChains, FallbackLocale, FallbackStrategy};
use crate::function::{MessageFunction, compile_resource, compile_source};
use crate::modifier::Modifiers;
use crate::path::{parse_path, resolve_value};
use crate::plural::{DefaultPluralRule, PluralRule};
use crate::value::MessageValue;

/// Called with `(locale, key)` when no locale has the key; `Some` becomes the result.
pub type MissingHandler = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Used by [`Resolver::translate`].
    pub locale: SmolStr,
    pub fallback_locale: FallbackLocale,
    pub fallback_strategy: FallbackStrategy,
    /// Return [`Resolution::Unresolved`] instead of echoing missing keys.
    pub unresolving: bool,
    /// Render a missing key as message source.
    pub fallback_format: bool,
    /// HTML-escape string arguments.
    pub escape_parameter: bool,
    pub max_linked_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            locale: SmolStr::new_static("en-US"),
            fallback_locale: FallbackLocale::default(),
            fallback_strategy: FallbackStrategy::default(),
            unresolving: false,
            fallback_format: false,
            escape_parameter: false,
            max_linked_depth: DEFAULT_MAX_LINKED_DEPTH,
        }
    }
}

/// Arguments of a single resolution.
#[derive(Clone, Default)]
pub struct ResolveOptions {
    pub list: Vec<Value>,
    pub named: Map<String, Value>,
    pub plural: Option<i64>,
    /// Overrides the locale's rule.
    pub plural_rule: Option<Arc<dyn PluralRule>>,
    /// Rendered when no locale has the key.
    pub default_message: Option<String>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, list: Vec<Value>) -> Self {
        self.list = list;
        self
    }

    pub fn with_named(mut self, named: Map<String, Value>) -> Self {
        self.named = named;
        self
    }

    pub fn named(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(key.into(), value.into());
        self
    }

    pub fn with_plural(mut self, plural: i64) -> Self {
        self.plural = Some(plural);
        self
    }

    pub fn with_plural_rule(mut self, rule: impl PluralRule + 'static) -> Self {
        self.plural_rule = Some(Arc::new(rule));
        self
    }

    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = Some(message.into());
        self
    }
}

impl fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("list", &self.list)
            .field("named", &self.named)
            .field("plural", &self.plural)
            .field("plural_rule", &self.plural_rule.is_some())
            .field("default_message", &self.default_message)
            .finish()
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Resolution {
    Resolved(String),
    /// Only returned in unresolving mode.
    Unresolved,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(text) => Some(text.as_str()),
            Resolution::Unresolved => None,
        }
    }

    pub fn into_option(self) -> Option<String> {
        match self {
            Resolution::Resolved(text) => Some(text),
            Resolution::Unresolved => None,
        }
    }
}

enum Compilable {
    Source(SmolStr),
    Ast(Arc<lingo_compiler::Resource>),
    Function(MessageFunction),
}

/// Resolves keys against per-locale message trees.
pub struct Resolver {
    options: ResolverOptions,
    messages: DashMap<SmolStr, MessageValue, FxBuildHasher>,
    cache: Arc<CompileCache>,
    chains: FallbackChains,
    events: EventBus,
    modifiers: Modifiers,
    plural_rules: FxHashMap<SmolStr, Arc<dyn PluralRule>>,
    processor: Arc<dyn MessageProcessor>,
    missing_handler: Option<MissingHandler>,
    parent: Option<Arc<Resolver>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            options,
            messages: DashMap::default(),
            cache: Arc::new(CompileCache::new()),
            chains: FallbackChains::default(),
            events: EventBus::new(),
            modifiers: Modifiers::default(),
            plural_rules: FxHashMap::default(),
            processor: Arc::new(DefaultProcessor),
            missing_handler: None,
            parent: None,
        }
    }

    /// Shares compiled messages with other resolvers.
    pub fn with_cache(mut self, cache: Arc<CompileCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Consulted when no candidate locale has a key, including linked keys.
    pub fn with_parent(mut self, parent: Arc<Resolver>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn locale(&self) -> &str {
        &self.options.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<SmolStr>) {
        self.options.locale = locale.into();
    }

    pub fn set_fallback_locale(&mut self, fallback: FallbackLocale) {
        self.options.fallback_locale = fallback;
        self.chains.clear();
    }

    pub fn set_fallback_strategy(&mut self, strategy: FallbackStrategy) {
        self.options.fallback_strategy = strategy;
        self.chains.clear();
    }

    pub fn set_plural_rule(&mut self, locale: impl Into<SmolStr>, rule: impl PluralRule + 'static) {
        self.plural_rules.insert(locale.into(), Arc::new(rule));
    }

    pub fn register_modifier(
        &mut self,
        name: impl Into<SmolStr>,
        modifier: impl Fn(&str) -> String + Send + Sync + 'static,
    ) {
        self.modifiers.register(name, modifier);
    }

    pub fn set_processor(&mut self, processor: impl MessageProcessor + 'static) {
        self.processor = Arc::new(processor);
    }

    pub fn on_missing(&mut self, handler: impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static) {
        self.missing_handler = Some(Arc::new(handler));
    }

    /// Replaces the whole tree of `locale`.
    pub fn set_locale_messages(&self, locale: impl Into<SmolStr>, messages: MessageValue) {
        let locale = locale.into();
        self.cache.invalidate_locale(&locale);
        self.messages.insert(locale, messages);
    }

    /// Deep-merges `messages` into the tree of `locale`.
    pub fn merge_locale_messages(&self, locale: impl Into<SmolStr>, messages: MessageValue) {
        let locale = locale.into();
        let keys = messages.keys();
        self.messages
            .entry(locale.clone())
            .or_insert_with(MessageValue::object)
            .merge(messages);
        for key in keys {
            self.cache.invalidate_key(&locale, &key);
        }
    }

    /// Sets one message; `path` uses the same syntax as resolution.
    pub fn set_message(&self, locale: impl Into<SmolStr>, path: &str, value: impl Into<MessageValue>) -> Result<(), Error> {
        let segments = parse_path(path).ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        let locale = locale.into();

        self.messages
            .entry(locale.clone())
            .or_insert_with(MessageValue::object)
            .insert_path(&segments, value.into())?;
        self.cache.invalidate_key(&locale, path);
        Ok(())
    }

    pub fn locale_messages(&self, locale: &str) -> Option<MessageValue> {
        self.messages.get(locale).map(|messages| messages.value().clone())
    }

    pub fn available_locales(&self) -> Vec<SmolStr> {
        self.messages.iter().map(|entry| entry.key().clone()).sorted().collect()
    }

    /// Whether `locale` itself has a message at `key`, ignoring fallbacks.
    pub fn exists(&self, locale: &str, key: &str) -> bool {
        self.messages
            .get(locale)
            .and_then(|messages| resolve_value(messages.value(), key).map(MessageValue::is_message))
            .unwrap_or(false)
    }

    pub fn clear_compile_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn subscribe(&self) -> Receiver<ResolverEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Resolves `key` in the default locale.
    pub fn translate(&self, key: &str, options: &ResolveOptions) -> Resolution {
        self.resolve(&self.options.locale, key, options)
    }

    /// Finds `key` in `locale` or its fallbacks and renders it.
    pub fn resolve(&self, locale: &str, key: &str, options: &ResolveOptions) -> Resolution {
        if let Some((found, message)) = self.find(locale, key) {
            return Resolution::Resolved(self.render(&found, &message, options));
        }

        tracing::warn!(locale, key, "message not found");
        self.events.emit(ResolverEvent::Missing {
            key: key.to_string(),
            locale: SmolStr::from(locale),
        });

        if let Some(text) = self.missing_handler.as_ref().and_then(|handler| handler(locale, key)) {
            return Resolution::Resolved(text);
        }

        if let Some(source) = &options.default_message {
            return Resolution::Resolved(self.render_source(locale, key, source, options));
        }

        if self.options.unresolving {
            return Resolution::Unresolved;
        }

        if self.options.fallback_format {
            return Resolution::Resolved(self.render_source(locale, key, key, options));
        }

        Resolution::Resolved(key.to_string())
    }

    /// Walks the candidate locales, then the parent.
    fn find(&self, locale: &str, key: &str) -> Option<(SmolStr, MessageFunction)> {
        let chain = self
            .chains
            .get(locale, &self.options.fallback_locale, self.options.fallback_strategy);

        for candidate in chain.iter() {
            match self.compile_message(candidate, key) {
                Some(Ok(message)) => {
                    if candidate != locale {
                        tracing::debug!(key, requested = locale, used = %candidate, "fallback locale used");
                        self.events.emit(ResolverEvent::FallbackUsed {
                            key: key.to_string(),
                            requested: SmolStr::from(locale),
                            used: candidate.clone(),
                        });
                    }
                    return Some((candidate.clone(), message));
                }
                Some(Err(err)) => self.compile_failed(candidate, key, &err),
                None => {}
            }
        }

        self.parent.as_ref().and_then(|parent| parent.find(locale, key))
    }

    /// `None` when `locale` has no message at `key`.
    fn compile_message(&self, locale: &str, key: &str) -> Option<Result<MessageFunction, CompileError>> {
        let compilable = {
            let messages = self.messages.get(locale)?;
            match resolve_value(messages.value(), key)? {
                MessageValue::Text(source) => Compilable::Source(source.clone()),
                MessageValue::Ast(resource) => Compilable::Ast(Arc::clone(resource)),
                MessageValue::Function(function) => Compilable::Function(Arc::clone(function)),
                MessageValue::Object(_) | MessageValue::Array(_) => return None,
            }
        };

        Some(match compilable {
            Compilable::Source(source) => self.cache.get_or_compile(
                CacheKey::new(locale, key, fingerprint(source.as_str())),
                || compile_source(&source),
            ),
            Compilable::Ast(resource) => self.cache.get_or_compile(
                CacheKey::new(locale, key, fingerprint(resource.as_ref())),
                || compile_resource(&resource),
            ),
            Compilable::Function(function) => Ok(function),
        })
    }

    fn compile_failed(&self, locale: &str, key: &str, err: &CompileError) {
        tracing::warn!(locale, key, code = err.code(), "failed to compile message: {}", err);
        self.events.emit(ResolverEvent::CompileFailed {
            key: key.to_string(),
            locale: SmolStr::from(locale),
            code: err.code(),
            message: err.to_string(),
        });
    }

    /// Renders a source that is not part of any tree; falls back to the raw source.
    fn render_source(&self, locale: &str, key: &str, source: &str, options: &ResolveOptions) -> String {
        match self
            .cache
            .get_or_compile(CacheKey::new(locale, key, fingerprint(source)), || compile_source(source))
        {
            Ok(message) => self.render(locale, &message, options),
            Err(err) => {
                self.compile_failed(locale, key, &err);
                source.to_string()
            }
        }
    }

    fn render(&self, locale: &str, message: &MessageFunction, options: &ResolveOptions) -> String {
        let (list, named): (Cow<'_, [Value]>, Cow<'_, Map<String, Value>>) = if self.options.escape_parameter {
            (
                Cow::Owned(options.list.iter().map(escape_value).collect()),
                Cow::Owned(
                    options
                        .named
                        .iter()
                        .map(|(key, value)| (key.clone(), escape_value(value)))
                        .collect(),
                ),
            )
        } else {
            (Cow::Borrowed(options.list.as_slice()), Cow::Borrowed(&options.named))
        };

        let plural_rule: &dyn PluralRule = options
            .plural_rule
            .as_deref()
            .or_else(|| self.plural_rules.get(locale).map(Arc::as_ref))
            .unwrap_or(&DefaultPluralRule);

        let ctx = MessageContext::new(locale)
            .with_list(&list)
            .with_named(&named)
            .with_plural(options.plural)
            .with_plural_rule(plural_rule)
            .with_lookup(self)
            .with_modifiers(&self.modifiers)
            .with_processor(self.processor.as_ref())
            .with_max_depth(self.options.max_linked_depth);

        message(&ctx)
    }
}

impl MessageLookup for Resolver {
    fn lookup(&self, locale: &str, key: &str) -> Option<MessageFunction> {
        self.find(locale, key).map(|(_, message)| message)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("options", &self.options)
            .field("locales", &self.available_locales())
            .field("cache", &self.cache)
            .field("modifiers", &self.modifiers)
            .field("parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

fn escape_value(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(escape_html(text)),
        other => other.clone(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn resolver(messages: Value) -> Resolver {
        let resolver = Resolver::default();
        for (locale, tree) in messages.as_object().cloned().unwrap() {
            resolver.set_locale_messages(locale, MessageValue::from_json(tree).unwrap());
        }
        resolver
    }

    #[rstest]
    #[case::plain("a < b", "a &lt; b")]
    #[case::all("&<>\"'", "&amp;&lt;&gt;&quot;&#39;")]
    #[case::untouched("hello", "hello")]
    fn test_escape_html(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(escape_html(text), expected);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ResolverOptions =
            serde_json::from_value(json!({"locale": "ja", "fallback_strategy": "locale_chain"})).unwrap();

        assert_eq!(options.locale, "ja");
        assert_eq!(options.fallback_strategy, FallbackStrategy::LocaleChain);
        assert_eq!(options.max_linked_depth, DEFAULT_MAX_LINKED_DEPTH);
        assert!(!options.unresolving);
    }

    #[test]
    fn test_object_value_is_not_a_message() {
        let resolver = resolver(json!({"en-US": {"greeting": {"hello": "hi"}}}));

        assert_eq!(
            resolver.translate("greeting", &ResolveOptions::new()),
            Resolution::Resolved("greeting".to_string())
        );
        assert!(!resolver.exists("en-US", "greeting"));
        assert!(resolver.exists("en-US", "greeting.hello"));
    }

    #[test]
    fn test_set_message_invalid_path() {
        let resolver = Resolver::default();
        assert_eq!(
            resolver.set_message("en", "a..b", "x"),
            Err(Error::InvalidPath("a..b".to_string()))
        );
    }

    #[test]
    fn test_set_message_recompiles() {
        let resolver = resolver(json!({"en-US": {"a": {"b": "old"}}}));
        assert_eq!(resolver.translate("a.b", &ResolveOptions::new()).as_deref(), Some("old"));

        resolver.set_message("en-US", "a.b", "new").unwrap();

        assert_eq!(resolver.cache_stats().entries, 0);
        assert_eq!(resolver.translate("a.b", &ResolveOptions::new()).as_deref(), Some("new"));
    }

    #[test]
    fn test_merge_invalidates_only_merged_keys() {
        let resolver = resolver(json!({"en-US": {"a": "1", "b": "2"}}));
        resolver.translate("a", &ResolveOptions::new());
        resolver.translate("b", &ResolveOptions::new());

        resolver.merge_locale_messages("en-US", MessageValue::from_json(json!({"b": "3"})).unwrap());

        assert_eq!(resolver.cache_stats().entries, 1);
        assert_eq!(resolver.translate("b", &ResolveOptions::new()).as_deref(), Some("3"));
        assert_eq!(resolver.translate("a", &ResolveOptions::new()).as_deref(), Some("1"));
    }

    #[rstest]
    #[case::single_quote("a['b']")]
    #[case::double_quote("a[\"b\"]")]
    #[case::dotted("a.b")]
    fn test_merge_invalidates_every_spelling(#[case] spelling: &str) {
        let resolver = resolver(json!({"en-US": {"a": {"b": "old"}}}));
        assert_eq!(resolver.translate(spelling, &ResolveOptions::new()).as_deref(), Some("old"));
        assert_eq!(resolver.translate("a.b", &ResolveOptions::new()).as_deref(), Some("old"));
        assert_eq!(resolver.cache_stats().entries, 1);

        resolver.merge_locale_messages("en-US", MessageValue::from_json(json!({"a": {"b": "new"}})).unwrap());

        assert_eq!(resolver.cache_stats().entries, 0);
        assert_eq!(resolver.translate(spelling, &ResolveOptions::new()).as_deref(), Some("new"));
        assert_eq!(resolver.translate("a.b", &ResolveOptions::new()).as_deref(), Some("new"));
        assert_eq!(resolver.cache_stats().entries, 1);
    }

    #[test]
    fn test_set_message_invalidates_quoted_spelling() {
        let resolver = resolver(json!({"en-US": {"a": {"b": "old"}}}));
        resolver.translate("a['b']", &ResolveOptions::new());

        resolver.set_message("en-US", "a.b", "new").unwrap();

        assert_eq!(resolver.cache_stats().entries, 0);
        assert_eq!(resolver.translate("a['b']", &ResolveOptions::new()).as_deref(), Some("new"));
    }

    #[test]
    fn test_available_locales_sorted() {
        let resolver = resolver(json!({"ja": {}, "en": {}, "de": {}}));
        assert_eq!(resolver.available_locales(), vec!["de", "en", "ja"]);
    }
}
