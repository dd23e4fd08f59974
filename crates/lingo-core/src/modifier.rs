use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Transforms the rendered text of a linked message.
pub type Modifier = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Named modifiers available to `@.name:key` references.
#[derive(Clone)]
pub struct Modifiers(FxHashMap<SmolStr, Modifier>);

impl Default for Modifiers {
    fn default() -> Self {
        let mut modifiers = Self::empty();
        modifiers.register("upper", str::to_uppercase);
        modifiers.register("lower", str::to_lowercase);
        modifiers.register("capitalize", capitalize);
        modifiers
    }
}

impl Modifiers {
    pub fn empty() -> Self {
        Self(FxHashMap::default())
    }

    pub fn register(&mut self, name: impl Into<SmolStr>, modifier: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.0.insert(name.into(), Arc::new(modifier));
    }

    pub fn get(&self, name: &str) -> Option<&Modifier> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Unknown modifiers pass the text through unchanged.
    pub fn apply(&self, name: &str, text: String) -> String {
        match self.get(name) {
            Some(modifier) => modifier(&text),
            None => {
                tracing::debug!(modifier = name, "unknown modifier");
                text
            }
        }
    }
}

impl fmt::Debug for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.0.keys().collect();
        names.sort();
        f.debug_tuple("Modifiers").field(&names).finish()
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
