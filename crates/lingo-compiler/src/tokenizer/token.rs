use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::range::SourceLocation;

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<SmolStr>,
    pub location: Option<SourceLocation>,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub enum TokenKind {
    Text,
    Pipe,
    BraceLeft,
    BraceRight,
    Modulo,
    Named,
    List,
    Literal,
    LinkedAlias,
    LinkedDot,
    LinkedDelimiter,
    LinkedKey,
    LinkedModifier,
    InvalidPlace,
    Eof,
}

impl Token {
    /// Text used when a diagnostic has to cite this token.
    pub fn caption(&self) -> String {
        match &self.value {
            Some(value) => value.to_string(),
            None => self.kind.to_string(),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.caption())
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            TokenKind::Text => write!(f, "text"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::BraceLeft => write!(f, "{{"),
            TokenKind::BraceRight => write!(f, "}}"),
            TokenKind::Modulo => write!(f, "%"),
            TokenKind::Named => write!(f, "named"),
            TokenKind::List => write!(f, "list"),
            TokenKind::Literal => write!(f, "literal"),
            TokenKind::LinkedAlias => write!(f, "@"),
            TokenKind::LinkedDot => write!(f, "."),
            TokenKind::LinkedDelimiter => write!(f, ":"),
            TokenKind::LinkedKey => write!(f, "linked key"),
            TokenKind::LinkedModifier => write!(f, "linked modifier"),
            TokenKind::InvalidPlace => write!(f, "invalid placeholder"),
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}
