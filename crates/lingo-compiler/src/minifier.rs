use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use smol_str::SmolStr;

use crate::ast::{
    Linked, LinkedKey, LinkedModifier, List, Literal, Message, Named, Node, NodeKind, Plural, Resource, StaticText,
    Text,
};
use crate::error::{CompileError, CompileErrorKind, ErrorDomain};

/// Location-free AST with single-letter keys, for shipping precompiled messages.
///
/// | key | meaning |
/// |-----|---------|
/// | `t` | node kind tag |
/// | `b` | resource body |
/// | `c` | plural cases |
/// | `i` | message items, or a list index |
/// | `s` | folded static text |
/// | `v` | text value |
/// | `k` | named key, or linked key node |
/// | `m` | linked modifier node |
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum MinifiedNode {
    Resource(Box<MinifiedNode>),
    Plural(Vec<MinifiedNode>),
    Message {
        items: Vec<MinifiedNode>,
        static_text: Option<String>,
    },
    Text(Option<String>),
    Named(SmolStr),
    List(i64),
    Literal(Option<String>),
    Linked {
        key: Box<MinifiedNode>,
        modifier: Option<Box<MinifiedNode>>,
    },
    LinkedKey(String),
    LinkedModifier(SmolStr),
}

impl MinifiedNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            MinifiedNode::Resource(_) => NodeKind::Resource,
            MinifiedNode::Plural(_) => NodeKind::Plural,
            MinifiedNode::Message { .. } => NodeKind::Message,
            MinifiedNode::Text(_) => NodeKind::Text,
            MinifiedNode::Named(_) => NodeKind::Named,
            MinifiedNode::List(_) => NodeKind::List,
            MinifiedNode::Literal(_) => NodeKind::Literal,
            MinifiedNode::Linked { .. } => NodeKind::Linked,
            MinifiedNode::LinkedKey(_) => NodeKind::LinkedKey,
            MinifiedNode::LinkedModifier(_) => NodeKind::LinkedModifier,
        }
    }

    /// Decodes the JSON form produced by [`Serialize`].
    pub fn from_json(value: &Value) -> Result<Self, CompileError> {
        let object = value.as_object().ok_or_else(|| unhandled(value.to_string()))?;
        let tag = object
            .get("t")
            .and_then(Value::as_u64)
            .ok_or_else(|| unhandled(object.get("t").map(Value::to_string).unwrap_or_else(|| "null".to_string())))?;
        let kind = NodeKind::from_tag(tag).ok_or_else(|| unhandled(tag.to_string()))?;
        let shape_error = || unhandled(kind.to_string());

        let string = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        let child = |key: &str| object.get(key).map(Self::from_json).transpose();
        let children = |key: &str| -> Result<Vec<MinifiedNode>, CompileError> {
            match object.get(key) {
                Some(Value::Array(values)) => values.iter().map(Self::from_json).collect(),
                None => Ok(Vec::new()),
                Some(_) => Err(shape_error()),
            }
        };

        let node = match kind {
            NodeKind::Resource => MinifiedNode::Resource(Box::new(child("b")?.ok_or_else(shape_error)?)),
            NodeKind::Plural => MinifiedNode::Plural(children("c")?),
            NodeKind::Message => MinifiedNode::Message {
                items: children("i")?,
                static_text: string("s"),
            },
            NodeKind::Text => MinifiedNode::Text(string("v")),
            NodeKind::Literal => MinifiedNode::Literal(string("v")),
            NodeKind::Named => MinifiedNode::Named(string("k").ok_or_else(shape_error)?.into()),
            NodeKind::List => MinifiedNode::List(object.get("i").and_then(Value::as_i64).ok_or_else(shape_error)?),
            NodeKind::Linked => MinifiedNode::Linked {
                key: Box::new(child("k")?.ok_or_else(shape_error)?),
                modifier: child("m")?.map(Box::new),
            },
            NodeKind::LinkedKey => MinifiedNode::LinkedKey(string("v").unwrap_or_default()),
            NodeKind::LinkedModifier => MinifiedNode::LinkedModifier(string("v").unwrap_or_default().into()),
        };

        Ok(node)
    }

    /// Rebuilds a location-free [`Node`].
    pub fn expand(&self) -> Result<Node, CompileError> {
        let node = match self {
            MinifiedNode::Resource(body) => Node::Resource(Resource::new(body.expand()?)),
            MinifiedNode::Plural(cases) => Node::Plural(Plural {
                cases: cases.iter().map(Self::expand_message).collect::<Result<_, _>>()?,
                location: None,
            }),
            MinifiedNode::Message { .. } => Node::Message(self.expand_message()?),
            MinifiedNode::Text(value) => Node::Text(Text {
                value: value.clone(),
                location: None,
            }),
            MinifiedNode::Literal(value) => Node::Literal(Literal {
                value: value.clone(),
                location: None,
            }),
            MinifiedNode::Named(key) => Node::Named(Named::new(key.clone())),
            MinifiedNode::List(index) => Node::List(List::new(*index)),
            MinifiedNode::Linked { key, modifier } => {
                let modifier = match modifier.as_deref() {
                    Some(MinifiedNode::LinkedModifier(value)) => Some(LinkedModifier::new(value.clone())),
                    Some(other) => return Err(unhandled(other.kind().to_string())),
                    None => None,
                };
                Node::Linked(Linked::new(key.expand()?, modifier))
            }
            MinifiedNode::LinkedKey(value) => Node::LinkedKey(LinkedKey::new(value.clone())),
            MinifiedNode::LinkedModifier(value) => Node::LinkedModifier(LinkedModifier::new(value.clone())),
        };

        Ok(node)
    }

    fn expand_message(&self) -> Result<Message, CompileError> {
        match self {
            MinifiedNode::Message { items, static_text } => Ok(Message {
                items: items.iter().map(Self::expand).collect::<Result<_, _>>()?,
                static_text: static_text.clone().map(StaticText::Full),
                location: None,
            }),
            other => Err(unhandled(other.kind().to_string())),
        }
    }

    /// Rebuilds a [`Resource`] from a minified resource or a bare message body.
    pub fn into_resource(self) -> Result<Resource, CompileError> {
        match self.expand()? {
            Node::Resource(resource) => Ok(resource),
            body @ (Node::Message(_) | Node::Plural(_)) => Ok(Resource::new(body)),
            other => Err(unhandled(other.kind().to_string())),
        }
    }
}

impl Serialize for MinifiedNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("t", &self.kind().tag())?;

        match self {
            MinifiedNode::Resource(body) => map.serialize_entry("b", body)?,
            MinifiedNode::Plural(cases) => map.serialize_entry("c", cases)?,
            MinifiedNode::Message { items, static_text } => {
                map.serialize_entry("i", items)?;
                if let Some(text) = static_text {
                    map.serialize_entry("s", text)?;
                }
            }
            MinifiedNode::Text(value) | MinifiedNode::Literal(value) => {
                if let Some(value) = value {
                    map.serialize_entry("v", value)?;
                }
            }
            MinifiedNode::Named(key) => map.serialize_entry("k", key.as_str())?,
            MinifiedNode::List(index) => map.serialize_entry("i", index)?,
            MinifiedNode::Linked { key, modifier } => {
                map.serialize_entry("k", key)?;
                if let Some(modifier) = modifier {
                    map.serialize_entry("m", modifier)?;
                }
            }
            MinifiedNode::LinkedKey(value) => map.serialize_entry("v", value)?,
            MinifiedNode::LinkedModifier(value) => map.serialize_entry("v", value.as_str())?,
        }

        map.end()
    }
}

fn unhandled(found: String) -> CompileError {
    CompileError::new(CompileErrorKind::UnhandledMinifierNodeType(found), None).with_domain(ErrorDomain::Minifier)
}

/// Strips locations and shortens keys.
///
/// A `Resource` anywhere below the root is rejected.
pub fn minify(resource: &Resource) -> Result<MinifiedNode, CompileError> {
    Ok(MinifiedNode::Resource(Box::new(minify_node(&resource.body)?)))
}

fn minify_node(node: &Node) -> Result<MinifiedNode, CompileError> {
    let minified = match node {
        Node::Resource(_) => return Err(unhandled(node.kind().to_string())),
        Node::Plural(plural) => MinifiedNode::Plural(plural.cases.iter().map(minify_message).collect::<Result<_, _>>()?),
        Node::Message(message) => minify_message(message)?,
        Node::Text(text) => MinifiedNode::Text(text.value.clone()),
        Node::Literal(literal) => MinifiedNode::Literal(literal.value.clone()),
        Node::Named(named) => MinifiedNode::Named(named.key.clone()),
        Node::List(list) => MinifiedNode::List(list.index),
        Node::Linked(linked) => MinifiedNode::Linked {
            key: Box::new(minify_node(&linked.key)?),
            modifier: linked
                .modifier
                .as_ref()
                .map(|modifier| Box::new(MinifiedNode::LinkedModifier(modifier.value.clone()))),
        },
        Node::LinkedKey(key) => MinifiedNode::LinkedKey(key.value.clone()),
        Node::LinkedModifier(modifier) => MinifiedNode::LinkedModifier(modifier.value.clone()),
    };

    Ok(minified)
}

fn minify_message(message: &Message) -> Result<MinifiedNode, CompileError> {
    let static_text = match &message.static_text {
        Some(StaticText::Full(text)) => Some(text.clone()),
        _ => None,
    };

    Ok(MinifiedNode::Message {
        items: message.items.iter().map(minify_node).collect::<Result<_, _>>()?,
        static_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Parser, ParserOptions};
    use crate::error::{CompileErrorCodes, Diagnostics};
    use crate::optimizer::optimize;
    use rstest::rstest;
    use serde_json::json;

    fn parse(source: &str) -> Resource {
        Parser::new(ParserOptions::default(), Diagnostics::default())
            .parse(source)
            .unwrap()
    }

    #[rstest]
    #[case::named("hi {name}", json!({"t": 0, "b": {"t": 2, "i": [{"t": 3, "v": "hi "}, {"t": 4, "k": "name"}]}}))]
    #[case::list("{1}", json!({"t": 0, "b": {"t": 2, "i": [{"t": 5, "i": 1}]}}))]
    #[case::linked("@.upper:a.b", json!({"t": 0, "b": {"t": 2, "i": [{"t": 6, "k": {"t": 7, "v": "a.b"}, "m": {"t": 8, "v": "upper"}}]}}))]
    #[case::plural("a | b", json!({"t": 0, "b": {"t": 1, "c": [{"t": 2, "i": [{"t": 3, "v": "a"}]}, {"t": 2, "i": [{"t": 3, "v": "b"}]}]}}))]
    fn test_minify(#[case] source: &str, #[case] expected: Value) {
        let minified = minify(&parse(source)).unwrap();
        assert_eq!(serde_json::to_value(&minified).unwrap(), expected);
    }

    #[test]
    fn test_minify_optimized_message() {
        let mut resource = parse("hello");
        optimize(&mut resource);
        let minified = minify(&resource).unwrap();

        assert_eq!(
            serde_json::to_value(&minified).unwrap(),
            json!({"t": 0, "b": {"t": 2, "i": [{"t": 3}], "s": "hello"}})
        );
    }

    #[test]
    fn test_expand_restores_structure() {
        let resource = parse("hi {name} @.lower:foo | {0}");
        let minified = minify(&resource).unwrap();
        let decoded = MinifiedNode::from_json(&serde_json::to_value(&minified).unwrap()).unwrap();
        assert_eq!(decoded, minified);

        let expanded = decoded.into_resource().unwrap();
        assert_eq!(minify(&expanded).unwrap(), minified);
        assert!(expanded.location.is_none());
    }

    #[test]
    fn test_into_resource_from_bare_message() {
        let value = json!({"t": 2, "i": [{"t": 3, "v": "x"}]});
        let resource = MinifiedNode::from_json(&value).unwrap().into_resource().unwrap();
        assert_eq!(resource.messages().len(), 1);
    }

    #[rstest]
    #[case::unknown_tag(json!({"t": 42}))]
    #[case::missing_tag(json!({"v": "x"}))]
    #[case::not_object(json!("x"))]
    #[case::named_without_key(json!({"t": 4}))]
    #[case::items_not_array(json!({"t": 2, "i": 3}))]
    #[case::plural_of_text(json!({"t": 0, "b": {"t": 1, "c": [{"t": 3, "v": "x"}]}}))]
    fn test_from_json_unhandled(#[case] value: Value) {
        let err = MinifiedNode::from_json(&value)
            .and_then(MinifiedNode::into_resource)
            .unwrap_err();
        assert_eq!(err.code(), CompileErrorCodes::UNHANDLED_MINIFIER_NODE_TYPE);
        assert_eq!(err.domain, ErrorDomain::Minifier);
    }

    #[test]
    fn test_minify_rejects_nested_resource() {
        let resource = Resource::new(Node::Resource(Resource::new(Node::Message(Message::new(vec![])))));
        assert!(minify(&resource).unwrap_err().kind.is_fatal());
    }
}
