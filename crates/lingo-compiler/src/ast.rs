pub mod node;
pub mod parser;

pub use node::{
    Helper, Linked, LinkedKey, LinkedModifier, List, Literal, Message, Named, Node, NodeKind, Plural, Resource,
    StaticText, Text,
};
pub use parser::{CacheKeyHandler, Parser, ParserOptions, decode_escapes};
