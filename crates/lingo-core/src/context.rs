use std::fmt;
use std::sync::LazyLock;

use serde_json::{Map, Value};

use crate::function::MessageFunction;
use crate::modifier::Modifiers;
use crate::plural::{DefaultPluralRule, PluralRule};

/// Linked messages nested deeper than this render as empty text.
pub const DEFAULT_MAX_LINKED_DEPTH: usize = 32;

static DEFAULT_MODIFIERS: LazyLock<Modifiers> = LazyLock::new(Modifiers::default);
static EMPTY_NAMED: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);
static NULL: Value = Value::Null;

/// Hooks turning argument values and rendered parts into text.
pub trait MessageProcessor: Send + Sync {
    fn normalize(&self, parts: Vec<String>) -> String {
        parts.concat()
    }

    fn interpolate(&self, value: &Value) -> String {
        to_display_string(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProcessor;

impl MessageProcessor for DefaultProcessor {}

/// Finds the compiled message for a linked key.
pub trait MessageLookup: Send + Sync {
    fn lookup(&self, locale: &str, key: &str) -> Option<MessageFunction>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl MessageLookup for NoLookup {
    fn lookup(&self, _locale: &str, _key: &str) -> Option<MessageFunction> {
        None
    }
}

/// Text form of an argument: strings as-is, `null` as empty, containers as pretty JSON.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_default(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
    }
}

/// Everything a compiled message reads while rendering.
#[derive(Clone)]
pub struct MessageContext<'a> {
    locale: &'a str,
    list: &'a [Value],
    named: &'a Map<String, Value>,
    plural_index: Option<i64>,
    plural_value: Option<Value>,
    plural_rule: &'a dyn PluralRule,
    lookup: &'a dyn MessageLookup,
    modifiers: &'a Modifiers,
    processor: &'a dyn MessageProcessor,
    depth: usize,
    max_depth: usize,
}

impl<'a> MessageContext<'a> {
    pub fn new(locale: &'a str) -> Self {
        Self {
            locale,
            list: &[],
            named: &*EMPTY_NAMED,
            plural_index: None,
            plural_value: None,
            plural_rule: &DefaultPluralRule,
            lookup: &NoLookup,
            modifiers: &*DEFAULT_MODIFIERS,
            processor: &DefaultProcessor,
            depth: 0,
            max_depth: DEFAULT_MAX_LINKED_DEPTH,
        }
    }

    pub fn with_list(mut self, list: &'a [Value]) -> Self {
        self.list = list;
        self
    }

    pub fn with_named(mut self, named: &'a Map<String, Value>) -> Self {
        self.named = named;
        self
    }

    /// An explicit plural index; also readable as `{count}` and `{n}` unless those are passed.
    pub fn with_plural(mut self, plural: Option<i64>) -> Self {
        self.plural_index = plural;
        self.plural_value = plural.map(Value::from);
        self
    }

    pub fn with_plural_rule(mut self, plural_rule: &'a dyn PluralRule) -> Self {
        self.plural_rule = plural_rule;
        self
    }

    pub fn with_lookup(mut self, lookup: &'a dyn MessageLookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_modifiers(mut self, modifiers: &'a Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_processor(mut self, processor: &'a dyn MessageProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn locale(&self) -> &str {
        self.locale
    }

    pub fn plural_index(&self) -> Option<i64> {
        self.plural_index
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn named(&self, key: &str) -> &Value {
        match self.named.get(key) {
            Some(value) => value,
            None if key == "count" || key == "n" => self.plural_value.as_ref().unwrap_or(&NULL),
            None => &NULL,
        }
    }

    /// Negative indexes count from the end.
    pub fn list(&self, index: i64) -> &Value {
        let index = if index < 0 {
            self.list.len().checked_sub(index.unsigned_abs() as usize)
        } else {
            Some(index as usize)
        };

        index.and_then(|index| self.list.get(index)).unwrap_or(&NULL)
    }

    pub fn interpolate(&self, value: &Value) -> String {
        self.processor.interpolate(value)
    }

    pub fn normalize(&self, parts: Vec<String>) -> String {
        self.processor.normalize(parts)
    }

    /// Index of the plural case to render among `cases`.
    ///
    /// Without an explicit index the `count` or `n` argument decides, then `1`.
    pub fn plural(&self, cases: usize) -> usize {
        if cases == 0 {
            return 0;
        }

        let choice = self
            .plural_index
            .or_else(|| self.named.get("count").and_then(Value::as_i64))
            .or_else(|| self.named.get("n").and_then(Value::as_i64))
            .unwrap_or(1);

        self.plural_rule.select(choice, cases).min(cases - 1)
    }

    /// Renders the message at `key` with the same arguments, then applies `modifier`.
    pub fn linked(&self, key: &str, modifier: Option<&str>) -> String {
        if self.depth >= self.max_depth {
            tracing::warn!(key, depth = self.depth, "linked message nesting too deep");
            return String::new();
        }

        match self.lookup.lookup(self.locale, key) {
            Some(message) => {
                let child = MessageContext {
                    depth: self.depth + 1,
                    ..self.clone()
                };
                self.modify(message(&child), modifier)
            }
            None => {
                tracing::debug!(key, locale = self.locale, "linked message not found");
                String::new()
            }
        }
    }

    pub fn modify(&self, text: String, modifier: Option<&str>) -> String {
        match modifier {
            Some(name) => self.modifiers.apply(name, text),
            None => text,
        }
    }
}

impl fmt::Debug for MessageContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("locale", &self.locale)
            .field("list", &self.list)
            .field("named", &self.named)
            .field("plural_index", &self.plural_index)
            .field("modifiers", &self.modifiers)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
