//! `lingo-core` resolves message keys against per-locale message trees and renders them.
//!
//! Messages are compiled on first use into closures and kept in a [`CompileCache`]. Missing
//! keys walk the fallback locale chain; fallbacks and misses are reported as [`ResolverEvent`]s.
//!
//! ## Examples
//!
//! ```rs
//! use lingo_core::{MessageValue, ResolveOptions, Resolver};
//! use serde_json::json;
//!
//! let resolver = Resolver::default();
//! resolver.set_locale_messages("en-US", MessageValue::from_json(json!({"hello": "hi {name}"})).unwrap());
//!
//! let text = resolver.translate("hello", &ResolveOptions::new().named("name", "lingo"));
//! assert_eq!(text.as_deref(), Some("hi lingo"));
//!
//! // Interpret a single message
//! let message = lingo_core::compile_source("no apples | one apple | {count} apples").unwrap();
//! let ctx = lingo_core::MessageContext::new("en").with_plural(Some(3));
//! assert_eq!(message(&ctx), "3 apples");
//! ```
mod cache;
mod context;
mod error;
mod events;
mod fallback;
mod function;
mod modifier;
mod path;
mod plural;
mod resolver;
mod value;

pub use cache::{CacheKey, CacheStats, CompileCache, fingerprint};
pub use context::{
    DEFAULT_MAX_LINKED_DEPTH, DefaultProcessor, MessageContext, MessageLookup, MessageProcessor, NoLookup,
    to_display_string,
};
pub use error::Error;
pub use events::{EventBus, ResolverEvent};
pub use fallback::{FallbackChains, FallbackLocale, FallbackStrategy, fallback_chain};
pub use function::{MessageFunction, compile_resource, compile_source};
pub use modifier::{Modifier, Modifiers};
pub use path::{normalize_path, parse_path, resolve_value};
pub use plural::{DefaultPluralRule, PluralRule};
pub use resolver::{MissingHandler, Resolution, ResolveOptions, Resolver, ResolverOptions, escape_html};
pub use value::MessageValue;
