use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::range::SourceLocation;

/// Kind tags of [`Node`], in their stable numeric order.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    Resource = 0,
    Plural = 1,
    Message = 2,
    Text = 3,
    Named = 4,
    List = 5,
    Linked = 6,
    LinkedKey = 7,
    LinkedModifier = 8,
    Literal = 9,
}

impl NodeKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(NodeKind::Resource),
            1 => Some(NodeKind::Plural),
            2 => Some(NodeKind::Message),
            3 => Some(NodeKind::Text),
            4 => Some(NodeKind::Named),
            5 => Some(NodeKind::List),
            6 => Some(NodeKind::Linked),
            7 => Some(NodeKind::LinkedKey),
            8 => Some(NodeKind::LinkedModifier),
            9 => Some(NodeKind::Literal),
            _ => None,
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:?}", self)
    }
}

/// Runtime helpers referenced by generated code.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Helper {
    Normalize,
    Interpolate,
    Named,
    List,
    Plural,
    Linked,
}

impl Helper {
    pub fn as_str(&self) -> &'static str {
        match self {
            Helper::Normalize => "normalize",
            Helper::Interpolate => "interpolate",
            Helper::Named => "named",
            Helper::List => "list",
            Helper::Plural => "plural",
            Helper::Linked => "linked",
        }
    }
}

impl Display for Helper {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.as_str())
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    Resource(Resource),
    Plural(Plural),
    Message(Message),
    Text(Text),
    Named(Named),
    List(List),
    Literal(Literal),
    Linked(Linked),
    LinkedKey(LinkedKey),
    LinkedModifier(LinkedModifier),
}

#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub body: Box<Node>,
    /// Filled by the transformer, consumed by the generator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub helpers: Vec<Helper>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Plural {
    pub cases: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// Static text folded by the optimizer.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticText {
    /// Every item was static; the items no longer carry their values.
    Full(String),
    /// The first `parts` items were static.
    Prefix { text: String, parts: usize },
}

#[derive(PartialEq, Eq, Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct Message {
    pub items: Vec<Node>,
    #[serde(default, rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_text: Option<StaticText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct Text {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct Named {
    pub key: SmolStr,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub modulo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct List {
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct Literal {
    /// Escape-decoded value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct Linked {
    /// One of `LinkedKey`, `Named`, `List` or `Literal`.
    pub key: Box<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<LinkedModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct LinkedKey {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct LinkedModifier {
    pub value: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Resource(_) => NodeKind::Resource,
            Node::Plural(_) => NodeKind::Plural,
            Node::Message(_) => NodeKind::Message,
            Node::Text(_) => NodeKind::Text,
            Node::Named(_) => NodeKind::Named,
            Node::List(_) => NodeKind::List,
            Node::Literal(_) => NodeKind::Literal,
            Node::Linked(_) => NodeKind::Linked,
            Node::LinkedKey(_) => NodeKind::LinkedKey,
            Node::LinkedModifier(_) => NodeKind::LinkedModifier,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Node::Resource(node) => node.location.as_ref(),
            Node::Plural(node) => node.location.as_ref(),
            Node::Message(node) => node.location.as_ref(),
            Node::Text(node) => node.location.as_ref(),
            Node::Named(node) => node.location.as_ref(),
            Node::List(node) => node.location.as_ref(),
            Node::Literal(node) => node.location.as_ref(),
            Node::Linked(node) => node.location.as_ref(),
            Node::LinkedKey(node) => node.location.as_ref(),
            Node::LinkedModifier(node) => node.location.as_ref(),
        }
    }

    /// Start offset in the source.
    pub fn start(&self) -> Option<usize> {
        self.location().map(|location| location.start.offset)
    }

    /// End offset in the source.
    pub fn end(&self) -> Option<usize> {
        self.location().map(|location| location.end.offset)
    }

    /// Value of a `Text` or `Literal` node that still carries one.
    pub fn static_value(&self) -> Option<&str> {
        match self {
            Node::Text(Text { value, .. }) | Node::Literal(Literal { value, .. }) => value.as_deref(),
            _ => None,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Node::Text(_) | Node::Literal(_))
    }
}

impl Resource {
    pub fn new(body: Node) -> Self {
        Self {
            body: Box::new(body),
            helpers: Vec::new(),
            cache_key: None,
            location: None,
        }
    }

    /// Cases of the body, a single message counting as one case.
    pub fn messages(&self) -> Vec<&Message> {
        match self.body.as_ref() {
            Node::Plural(plural) => plural.cases.iter().collect(),
            Node::Message(message) => vec![message],
            _ => Vec::new(),
        }
    }
}

impl Message {
    pub fn new(items: Vec<Node>) -> Self {
        Self {
            items,
            static_text: None,
            location: None,
        }
    }
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            location: None,
        }
    }
}

impl Literal {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            location: None,
        }
    }
}

impl Named {
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self {
            key: key.into(),
            modulo: false,
            location: None,
        }
    }
}

impl List {
    pub fn new(index: i64) -> Self {
        Self { index, location: None }
    }
}

impl LinkedKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            location: None,
        }
    }
}

impl LinkedModifier {
    pub fn new(value: impl Into<SmolStr>) -> Self {
        Self {
            value: value.into(),
            location: None,
        }
    }
}

impl Linked {
    pub fn new(key: Node, modifier: Option<LinkedModifier>) -> Self {
        Self {
            key: Box::new(key),
            modifier,
            location: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::text(Node::Text(Text::new("hi")), NodeKind::Text, 3)]
    #[case::named(Node::Named(Named::new("name")), NodeKind::Named, 4)]
    #[case::list(Node::List(List::new(0)), NodeKind::List, 5)]
    #[case::linked(Node::Linked(Linked::new(Node::LinkedKey(LinkedKey::new("a")), None)), NodeKind::Linked, 6)]
    #[case::literal(Node::Literal(Literal::new("x")), NodeKind::Literal, 9)]
    fn test_kind(#[case] node: Node, #[case] kind: NodeKind, #[case] tag: u8) {
        assert_eq!(node.kind(), kind);
        assert_eq!(kind.tag(), tag);
        assert_eq!(NodeKind::from_tag(tag as u64), Some(kind));
    }

    #[test]
    fn test_serialize_message() {
        let node = Node::Message(Message::new(vec![Node::Text(Text::new("hi ")), Node::Named(Named::new("name"))]));

        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            serde_json::json!({
                "type": "Message",
                "items": [
                    {"type": "Text", "value": "hi "},
                    {"type": "Named", "key": "name"},
                ],
            })
        );
    }

    #[test]
    fn test_messages_of_single_message() {
        let resource = Resource::new(Node::Message(Message::new(vec![])));
        assert_eq!(resource.messages().len(), 1);
    }
}
