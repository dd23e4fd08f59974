use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use lingo_compiler::{MinifiedNode, Node, Resource};
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::Error;
use crate::function::MessageFunction;

/// A node of a locale's message tree.
#[derive(Clone)]
pub enum MessageValue {
    /// Message source, compiled on first use.
    Text(SmolStr),
    /// Pre-parsed message, also produced from minified bundles.
    Ast(Arc<Resource>),
    Function(MessageFunction),
    Object(BTreeMap<String, MessageValue>),
    Array(Vec<MessageValue>),
}

impl MessageValue {
    pub fn object() -> Self {
        MessageValue::Object(BTreeMap::new())
    }

    pub fn function(function: impl Fn(&crate::MessageContext<'_>) -> String + Send + Sync + 'static) -> Self {
        MessageValue::Function(Arc::new(function))
    }

    /// Builds a tree from JSON.
    ///
    /// Objects shaped like a minified (`{"t": 0, "b": ...}`) or full (`{"type": "Resource", ...}`)
    /// resource become [`MessageValue::Ast`]. Nulls inside objects are dropped.
    pub fn from_json(value: Value) -> Result<Self, Error> {
        match value {
            Value::String(text) => Ok(MessageValue::Text(text.into())),
            Value::Number(_) | Value::Bool(_) => Ok(MessageValue::Text(value.to_string().into())),
            Value::Null => Ok(MessageValue::Text(SmolStr::default())),
            Value::Array(values) => values
                .into_iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(MessageValue::Array),
            Value::Object(object) => Self::from_json_object(object),
        }
    }

    fn from_json_object(object: serde_json::Map<String, Value>) -> Result<Self, Error> {
        if is_minified_resource(&object) {
            return MinifiedNode::from_json(&Value::Object(object))
                .and_then(MinifiedNode::into_resource)
                .map(|resource| MessageValue::Ast(Arc::new(resource)))
                .map_err(|err| Error::InvalidBundle(err.to_string()));
        }

        if object.get("type").and_then(Value::as_str) == Some("Resource") {
            return match serde_json::from_value::<Node>(Value::Object(object)) {
                Ok(Node::Resource(resource)) => Ok(MessageValue::Ast(Arc::new(resource))),
                Ok(node) => Err(Error::InvalidBundle(format!("expected a resource, found {}", node.kind()))),
                Err(err) => Err(Error::InvalidBundle(err.to_string())),
            };
        }

        object
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| Self::from_json(value).map(|value| (key, value)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(MessageValue::Object)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Whether this value renders as a message rather than holding other messages.
    pub fn is_message(&self) -> bool {
        matches!(
            self,
            MessageValue::Text(_) | MessageValue::Ast(_) | MessageValue::Function(_)
        )
    }

    pub fn child(&self, segment: &str) -> Option<&MessageValue> {
        match self {
            MessageValue::Object(object) => object.get(segment),
            MessageValue::Array(values) => segment.parse::<usize>().ok().and_then(|index| values.get(index)),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut MessageValue> {
        match self {
            MessageValue::Object(object) => object.get_mut(segment),
            MessageValue::Array(values) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| values.get_mut(index)),
            _ => None,
        }
    }

    /// Sets `value` at `segments`, creating intermediate objects.
    pub fn insert_path(&mut self, segments: &[SmolStr], value: MessageValue) -> Result<(), Error> {
        let Some((last, parents)) = segments.split_last() else {
            *self = value;
            return Ok(());
        };

        let mut current = self;
        for segment in parents {
            current = match current {
                MessageValue::Object(object) => object
                    .entry(segment.to_string())
                    .or_insert_with(MessageValue::object),
                other => other
                    .child_mut(segment)
                    .ok_or_else(|| not_an_object(segments, segment))?,
            };
        }

        match current {
            MessageValue::Object(object) => {
                object.insert(last.to_string(), value);
                Ok(())
            }
            MessageValue::Array(values) => match last.parse::<usize>().ok().and_then(|index| values.get_mut(index)) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(not_an_object(segments, last)),
            },
            _ => Err(not_an_object(segments, parents.last().unwrap_or(last))),
        }
    }

    /// Deep-merges `other` into `self`; non-object values in `other` win.
    pub fn merge(&mut self, other: MessageValue) {
        match (self, other) {
            (MessageValue::Object(target), MessageValue::Object(source)) => {
                for (key, value) in source {
                    match target.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            target.insert(key, value);
                        }
                    }
                }
            }
            (target, other) => *target = other,
        }
    }

    /// Dotted keys of every message in the tree.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_keys(String::new(), &mut keys);
        keys
    }

    fn collect_keys(&self, prefix: String, keys: &mut Vec<String>) {
        match self {
            MessageValue::Object(object) => {
                for (key, value) in object {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    value.collect_keys(path, keys);
                }
            }
            MessageValue::Array(values) => {
                for (index, value) in values.iter().enumerate() {
                    value.collect_keys(format!("{}[{}]", prefix, index), keys);
                }
            }
            _ => keys.push(prefix),
        }
    }
}

fn is_minified_resource(object: &serde_json::Map<String, Value>) -> bool {
    object.get("t").and_then(Value::as_u64) == Some(0) && object.contains_key("b")
}

fn not_an_object(segments: &[SmolStr], segment: &str) -> Error {
    Error::NotAnObject {
        path: segments.iter().join("."),
        segment: segment.to_string(),
    }
}

impl fmt::Debug for MessageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            MessageValue::Ast(resource) => f.debug_tuple("Ast").field(resource).finish(),
            MessageValue::Function(_) => f.write_str("Function"),
            MessageValue::Object(object) => f.debug_map().entries(object.iter()).finish(),
            MessageValue::Array(values) => f.debug_list().entries(values.iter()).finish(),
        }
    }
}

impl From<&str> for MessageValue {
    fn from(text: &str) -> Self {
        MessageValue::Text(text.into())
    }
}

impl From<String> for MessageValue {
    fn from(text: String) -> Self {
        MessageValue::Text(text.into())
    }
}

impl From<Resource> for MessageValue {
    fn from(resource: Resource) -> Self {
        MessageValue::Ast(Arc::new(resource))
    }
}

impl<const N: usize> From<[(&str, MessageValue); N]> for MessageValue {
    fn from(entries: [(&str, MessageValue); N]) -> Self {
        MessageValue::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }
}
