use std::fmt::{self, Display, Formatter};

use miette::{Diagnostic, LabeledSpan, SourceSpan};
use serde::Serialize;

use crate::range::SourceLocation;

/// Stable numeric codes of [`CompileErrorKind`].
pub struct CompileErrorCodes;

impl CompileErrorCodes {
    pub const EXPECTED_TOKEN: u16 = 0;
    pub const INVALID_TOKEN_IN_PLACEHOLDER: u16 = 1;
    pub const UNTERMINATED_SINGLE_QUOTE_IN_PLACEHOLDER: u16 = 2;
    pub const UNKNOWN_ESCAPE_SEQUENCE: u16 = 3;
    pub const INVALID_UNICODE_ESCAPE_SEQUENCE: u16 = 4;
    pub const UNBALANCED_CLOSING_BRACE: u16 = 5;
    pub const UNTERMINATED_CLOSING_BRACE: u16 = 6;
    pub const EMPTY_PLACEHOLDER: u16 = 7;
    pub const NOT_ALLOW_NEST_PLACEHOLDER: u16 = 8;
    pub const INVALID_LINKED_FORMAT: u16 = 9;
    pub const MUST_HAVE_MESSAGES_IN_PLURAL: u16 = 10;
    pub const UNEXPECTED_EMPTY_LINKED_MODIFIER: u16 = 11;
    pub const UNEXPECTED_EMPTY_LINKED_KEY: u16 = 12;
    pub const UNEXPECTED_LEXICAL_ANALYSIS: u16 = 13;
    pub const UNHANDLED_CODEGEN_NODE_TYPE: u16 = 14;
    pub const UNHANDLED_MINIFIER_NODE_TYPE: u16 = 15;
    /// First code available to compilers layered on top of this one.
    pub const EXTEND_POINT: u16 = 16;
}

/// Stable numeric codes of [`CompileWarnKind`].
pub struct CompileWarnCodes;

impl CompileWarnCodes {
    pub const USE_MODULO_SYNTAX: u16 = 0;
    pub const EXTEND_POINT: u16 = 1;
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorDomain {
    Tokenizer,
    Parser,
    Transformer,
    Generator,
    Minifier,
    Compiler,
}

impl Display for ErrorDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let name = match self {
            ErrorDomain::Tokenizer => "tokenizer",
            ErrorDomain::Parser => "parser",
            ErrorDomain::Transformer => "transformer",
            ErrorDomain::Generator => "generator",
            ErrorDomain::Minifier => "minifier",
            ErrorDomain::Compiler => "compiler",
        };
        write!(f, "{name}")
    }
}

#[derive(thiserror::Error, PartialEq, Eq, Debug, Clone)]
pub enum CompileErrorKind {
    #[error("Expected token: '{0}'")]
    ExpectedToken(String),
    #[error("Invalid token in placeholder: '{0}'")]
    InvalidTokenInPlaceholder(String),
    #[error("Unterminated single quote in placeholder")]
    UnterminatedSingleQuoteInPlaceholder,
    #[error("Unknown escape sequence: \\{0}")]
    UnknownEscapeSequence(String),
    #[error("Invalid unicode escape sequence: {0}")]
    InvalidUnicodeEscapeSequence(String),
    #[error("Unbalanced closing brace")]
    UnbalancedClosingBrace,
    #[error("Unterminated closing brace")]
    UnterminatedClosingBrace,
    #[error("Empty placeholder")]
    EmptyPlaceholder,
    #[error("Not allowed nest placeholder")]
    NotAllowNestPlaceholder,
    #[error("Invalid linked format")]
    InvalidLinkedFormat,
    #[error("Plural must have messages")]
    MustHaveMessagesInPlural,
    #[error("Unexpected empty linked modifier")]
    UnexpectedEmptyLinkedModifier,
    #[error("Unexpected empty linked key")]
    UnexpectedEmptyLinkedKey,
    #[error("Unexpected lexical analysis in token: '{0}'")]
    UnexpectedLexicalAnalysis(String),
    #[error("Unhandled codegen node type: '{0}'")]
    UnhandledCodegenNodeType(String),
    #[error("Unhandled minifier node type: '{0}'")]
    UnhandledMinifierNodeType(String),
}

impl CompileErrorKind {
    pub fn code(&self) -> u16 {
        match self {
            CompileErrorKind::ExpectedToken(_) => CompileErrorCodes::EXPECTED_TOKEN,
            CompileErrorKind::InvalidTokenInPlaceholder(_) => CompileErrorCodes::INVALID_TOKEN_IN_PLACEHOLDER,
            CompileErrorKind::UnterminatedSingleQuoteInPlaceholder => {
                CompileErrorCodes::UNTERMINATED_SINGLE_QUOTE_IN_PLACEHOLDER
            }
            CompileErrorKind::UnknownEscapeSequence(_) => CompileErrorCodes::UNKNOWN_ESCAPE_SEQUENCE,
            CompileErrorKind::InvalidUnicodeEscapeSequence(_) => CompileErrorCodes::INVALID_UNICODE_ESCAPE_SEQUENCE,
            CompileErrorKind::UnbalancedClosingBrace => CompileErrorCodes::UNBALANCED_CLOSING_BRACE,
            CompileErrorKind::UnterminatedClosingBrace => CompileErrorCodes::UNTERMINATED_CLOSING_BRACE,
            CompileErrorKind::EmptyPlaceholder => CompileErrorCodes::EMPTY_PLACEHOLDER,
            CompileErrorKind::NotAllowNestPlaceholder => CompileErrorCodes::NOT_ALLOW_NEST_PLACEHOLDER,
            CompileErrorKind::InvalidLinkedFormat => CompileErrorCodes::INVALID_LINKED_FORMAT,
            CompileErrorKind::MustHaveMessagesInPlural => CompileErrorCodes::MUST_HAVE_MESSAGES_IN_PLURAL,
            CompileErrorKind::UnexpectedEmptyLinkedModifier => CompileErrorCodes::UNEXPECTED_EMPTY_LINKED_MODIFIER,
            CompileErrorKind::UnexpectedEmptyLinkedKey => CompileErrorCodes::UNEXPECTED_EMPTY_LINKED_KEY,
            CompileErrorKind::UnexpectedLexicalAnalysis(_) => CompileErrorCodes::UNEXPECTED_LEXICAL_ANALYSIS,
            CompileErrorKind::UnhandledCodegenNodeType(_) => CompileErrorCodes::UNHANDLED_CODEGEN_NODE_TYPE,
            CompileErrorKind::UnhandledMinifierNodeType(_) => CompileErrorCodes::UNHANDLED_MINIFIER_NODE_TYPE,
        }
    }

    pub fn domain(&self) -> ErrorDomain {
        match self.code() {
            0..=9 => ErrorDomain::Tokenizer,
            10..=13 => ErrorDomain::Parser,
            CompileErrorCodes::UNHANDLED_CODEGEN_NODE_TYPE => ErrorDomain::Generator,
            CompileErrorCodes::UNHANDLED_MINIFIER_NODE_TYPE => ErrorDomain::Minifier,
            _ => ErrorDomain::Compiler,
        }
    }

    /// Pipeline invariant violations. These are never routed through an error handler.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CompileErrorKind::UnhandledCodegenNodeType(_) | CompileErrorKind::UnhandledMinifierNodeType(_)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            CompileErrorKind::ExpectedToken(_) => "ExpectedToken",
            CompileErrorKind::InvalidTokenInPlaceholder(_) => "InvalidTokenInPlaceholder",
            CompileErrorKind::UnterminatedSingleQuoteInPlaceholder => "UnterminatedSingleQuoteInPlaceholder",
            CompileErrorKind::UnknownEscapeSequence(_) => "UnknownEscapeSequence",
            CompileErrorKind::InvalidUnicodeEscapeSequence(_) => "InvalidUnicodeEscapeSequence",
            CompileErrorKind::UnbalancedClosingBrace => "UnbalancedClosingBrace",
            CompileErrorKind::UnterminatedClosingBrace => "UnterminatedClosingBrace",
            CompileErrorKind::EmptyPlaceholder => "EmptyPlaceholder",
            CompileErrorKind::NotAllowNestPlaceholder => "NotAllowNestPlaceholder",
            CompileErrorKind::InvalidLinkedFormat => "InvalidLinkedFormat",
            CompileErrorKind::MustHaveMessagesInPlural => "MustHaveMessagesInPlural",
            CompileErrorKind::UnexpectedEmptyLinkedModifier => "UnexpectedEmptyLinkedModifier",
            CompileErrorKind::UnexpectedEmptyLinkedKey => "UnexpectedEmptyLinkedKey",
            CompileErrorKind::UnexpectedLexicalAnalysis(_) => "UnexpectedLexicalAnalysis",
            CompileErrorKind::UnhandledCodegenNodeType(_) => "UnhandledCodegenNodeType",
            CompileErrorKind::UnhandledMinifierNodeType(_) => "UnhandledMinifierNodeType",
        }
    }
}

/// A diagnostic produced while compiling a message.
#[derive(thiserror::Error, PartialEq, Eq, Debug, Clone)]
#[error("{kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub domain: ErrorDomain,
    pub location: Option<SourceLocation>,
    /// Message source, attached for rendering.
    pub source_code: Option<String>,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, location: Option<SourceLocation>) -> Self {
        Self {
            domain: kind.domain(),
            kind,
            location,
            source_code: None,
        }
    }

    pub fn with_domain(mut self, domain: ErrorDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_source_code(mut self, source_code: impl Into<String>) -> Self {
        self.source_code = Some(source_code.into());
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    fn span(&self) -> Option<SourceSpan> {
        self.location
            .as_ref()
            .map(|location| SourceSpan::new(location.start.offset.into(), std::cmp::max(location.len(), 1)))
    }
}

impl Diagnostic for CompileError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(format!("{}::{}({})", self.domain, self.kind.name(), self.kind.code())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let msg = match &self.kind {
            CompileErrorKind::ExpectedToken(token) => Some(format!("Insert '{token}' here.")),
            CompileErrorKind::InvalidTokenInPlaceholder(_) => Some(
                "A placeholder holds a list index like {0}, a name like {name} or a literal like {'text'}.".to_string(),
            ),
            CompileErrorKind::UnterminatedSingleQuoteInPlaceholder => {
                Some("Close the literal with a single quote before the end of the line.".to_string())
            }
            CompileErrorKind::UnknownEscapeSequence(_) => {
                Some("Supported escapes are \\\\, \\', \\uXXXX and \\UXXXXXX.".to_string())
            }
            CompileErrorKind::InvalidUnicodeEscapeSequence(_) => {
                Some("Unicode escapes need exactly 4 (\\u) or 6 (\\U) hex digits.".to_string())
            }
            CompileErrorKind::UnbalancedClosingBrace => {
                Some("Remove the '}' or open a placeholder with '{' before it.".to_string())
            }
            CompileErrorKind::UnterminatedClosingBrace => Some("Close the placeholder with '}'.".to_string()),
            CompileErrorKind::EmptyPlaceholder => Some("Put a name, index or literal between the braces.".to_string()),
            CompileErrorKind::NotAllowNestPlaceholder => Some("Placeholders cannot contain placeholders.".to_string()),
            CompileErrorKind::InvalidLinkedFormat => {
                Some("Linked messages are written as @:key or @.modifier:key without spaces.".to_string())
            }
            CompileErrorKind::MustHaveMessagesInPlural => {
                Some("Every case separated by '|' needs some content.".to_string())
            }
            CompileErrorKind::UnexpectedEmptyLinkedModifier => Some("Write a modifier name after '@.'.".to_string()),
            CompileErrorKind::UnexpectedEmptyLinkedKey => Some("Write a message key after ':'.".to_string()),
            CompileErrorKind::UnexpectedLexicalAnalysis(_) => None,
            CompileErrorKind::UnhandledCodegenNodeType(_) | CompileErrorKind::UnhandledMinifierNodeType(_) => {
                Some("This is an internal error. Please report it.".to_string())
            }
        };

        msg.map(|m| Box::new(m) as Box<dyn Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span()?;
        self.source_code.as_ref()?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.kind.to_string()),
            span,
        ))))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_code.as_ref().map(|source| source as &dyn miette::SourceCode)
    }
}

#[derive(thiserror::Error, PartialEq, Eq, Debug, Clone)]
pub enum CompileWarnKind {
    #[error("Use modulo before '{{{0}}}'.")]
    UseModuloSyntax(String),
}

/// A non-fatal notice about deprecated syntax.
#[derive(thiserror::Error, PartialEq, Eq, Debug, Clone)]
#[error("{kind}")]
pub struct CompileWarn {
    pub kind: CompileWarnKind,
    pub location: Option<SourceLocation>,
}

impl CompileWarn {
    pub fn new(kind: CompileWarnKind, location: Option<SourceLocation>) -> Self {
        Self { kind, location }
    }

    pub fn code(&self) -> u16 {
        match self.kind {
            CompileWarnKind::UseModuloSyntax(_) => CompileWarnCodes::USE_MODULO_SYNTAX,
        }
    }
}

pub type ErrorHandler<'a> = Box<dyn FnMut(CompileError) + 'a>;
pub type WarnHandler<'a> = Box<dyn FnMut(CompileWarn) + 'a>;

/// Sinks for recoverable diagnostics.
///
/// Without an error handler the first error aborts compilation. Without a warning handler
/// warnings go to the `tracing` subscriber.
#[derive(Default)]
pub struct Diagnostics<'a> {
    on_error: Option<ErrorHandler<'a>>,
    on_warn: Option<WarnHandler<'a>>,
}

impl<'a> Diagnostics<'a> {
    pub fn new(on_error: Option<ErrorHandler<'a>>, on_warn: Option<WarnHandler<'a>>) -> Self {
        Self { on_error, on_warn }
    }

    pub fn has_error_handler(&self) -> bool {
        self.on_error.is_some()
    }

    pub(crate) fn error(&mut self, error: CompileError) -> Result<(), CompileError> {
        match self.on_error.as_mut() {
            Some(handler) => {
                handler(error);
                Ok(())
            }
            None => Err(error),
        }
    }

    pub(crate) fn warn(&mut self, warn: CompileWarn) {
        match self.on_warn.as_mut() {
            Some(handler) => handler(warn),
            None => tracing::warn!(code = warn.code(), "{}", warn),
        }
    }
}

impl fmt::Debug for Diagnostics<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("on_error", &self.on_error.is_some())
            .field("on_warn", &self.on_warn.is_some())
            .finish()
    }
}
