use std::fmt;

use crate::{
    ast::node::{
        Linked, LinkedKey, LinkedModifier, List, Literal, Message, Named, Node, Plural, Resource, Text,
    },
    error::{CompileError, CompileErrorKind, CompileWarn, CompileWarnKind, Diagnostics},
    range::{Position, SourceLocation},
    tokenizer::{
        Tokenizer, TokenizerOptions,
        token::{Token, TokenKind},
    },
};

pub type CacheKeyHandler<'a> = Box<dyn Fn(&str) -> String + 'a>;

pub struct ParserOptions<'a> {
    pub location: bool,
    pub on_cache_key: Option<CacheKeyHandler<'a>>,
}

impl Default for ParserOptions<'_> {
    fn default() -> Self {
        Self {
            location: true,
            on_cache_key: None,
        }
    }
}

impl fmt::Debug for ParserOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("location", &self.location)
            .field("on_cache_key", &self.on_cache_key.is_some())
            .finish()
    }
}

/// Recursive descent parser building a [`Resource`] from the token stream.
///
/// Syntax errors go to the error handler and parsing continues with a well-formed tree.
/// Without a handler the first error is returned.
#[derive(Debug)]
pub struct Parser<'a> {
    options: ParserOptions<'a>,
    diagnostics: Diagnostics<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(options: ParserOptions<'a>, diagnostics: Diagnostics<'a>) -> Self {
        Self { options, diagnostics }
    }

    pub fn into_diagnostics(self) -> Diagnostics<'a> {
        self.diagnostics
    }

    pub fn parse(&mut self, source: &str) -> Result<Resource, CompileError> {
        let mut tokenizer = Tokenizer::new(
            source,
            TokenizerOptions {
                location: self.options.location,
            },
            std::mem::take(&mut self.diagnostics),
        );
        let result = self.parse_source(&mut tokenizer, source);
        self.diagnostics = tokenizer.into_diagnostics();
        result
    }

    fn parse_source(&self, tokenizer: &mut Tokenizer<'a>, source: &str) -> Result<Resource, CompileError> {
        let start = tokenizer.context().start_loc;
        let body = self.parse_resource(tokenizer)?;
        let cache_key = self.options.on_cache_key.as_ref().map(|on_cache_key| on_cache_key(source));

        if tokenizer.context().current_type != TokenKind::Eof || !tokenizer.is_eof() {
            let offset = tokenizer.context().offset;
            let rest = source
                .get(offset..)
                .and_then(|rest| rest.chars().next())
                .map(String::from)
                .unwrap_or_default();
            let start = tokenizer.context().last_start_loc;
            self.emit_error(tokenizer, CompileErrorKind::UnexpectedLexicalAnalysis(rest), start)?;
        }

        let location = self.location(start, tokenizer.current_position()).map(|mut location| {
            location.source = Some(source.to_string());
            location
        });

        Ok(Resource {
            body: Box::new(body),
            helpers: Vec::new(),
            cache_key,
            location,
        })
    }

    fn location(&self, start: Position, end: Position) -> Option<SourceLocation> {
        self.options.location.then(|| SourceLocation::new(start, end))
    }

    fn emit_error(
        &self,
        tokenizer: &mut Tokenizer<'a>,
        kind: CompileErrorKind,
        start: Position,
    ) -> Result<(), CompileError> {
        let location = self.location(start, tokenizer.current_position());
        tokenizer.diagnostics().error(CompileError::new(kind, location))
    }

    fn emit_warn(&self, tokenizer: &mut Tokenizer<'a>, kind: CompileWarnKind, start: Position) {
        let location = self.location(start, tokenizer.current_position());
        tokenizer.diagnostics().warn(CompileWarn::new(kind, location));
    }

    fn parse_resource(&self, tokenizer: &mut Tokenizer<'a>) -> Result<Node, CompileError> {
        let start = tokenizer.context().start_loc;
        let message = self.parse_message(tokenizer)?;

        if tokenizer.context().current_type == TokenKind::Eof {
            Ok(Node::Message(message))
        } else {
            self.parse_plural(tokenizer, start, message).map(Node::Plural)
        }
    }

    fn parse_plural(
        &self,
        tokenizer: &mut Tokenizer<'a>,
        start: Position,
        first: Message,
    ) -> Result<Plural, CompileError> {
        let mut has_empty_message = first.items.is_empty();
        let mut cases = vec![first];

        loop {
            let message = self.parse_message(tokenizer)?;
            has_empty_message |= message.items.is_empty();
            cases.push(message);

            if tokenizer.context().current_type == TokenKind::Eof {
                break;
            }
        }

        if has_empty_message {
            self.emit_error(tokenizer, CompileErrorKind::MustHaveMessagesInPlural, start)?;
        }

        Ok(Plural {
            cases,
            location: self.location(start, tokenizer.current_position()),
        })
    }

    fn parse_message(&self, tokenizer: &mut Tokenizer<'a>) -> Result<Message, CompileError> {
        let context = tokenizer.context();
        let start = if context.current_type == TokenKind::Pipe {
            context.end_loc
        } else {
            context.start_loc
        };
        let mut items = Vec::new();
        let mut pending: Option<Token> = None;
        let mut modulo = false;

        loop {
            let token = match pending.take() {
                Some(token) => token,
                None => tokenizer.next_token()?,
            };

            match token.kind {
                TokenKind::Text => items.push(self.parse_text(tokenizer, &token)),
                TokenKind::List => items.push(self.parse_list(tokenizer, &token)?),
                TokenKind::Modulo => modulo = true,
                TokenKind::Named => {
                    items.push(self.parse_named(tokenizer, &token, modulo)?);
                    if modulo {
                        let start = tokenizer.context().last_start_loc;
                        self.emit_warn(tokenizer, CompileWarnKind::UseModuloSyntax(token.caption()), start);
                        modulo = false;
                    }
                }
                TokenKind::Literal => items.push(self.parse_literal(tokenizer, &token)?),
                TokenKind::LinkedAlias => {
                    let (linked, next) = self.parse_linked(tokenizer)?;
                    items.push(Node::Linked(linked));
                    pending = next;
                }
                _ => {}
            }

            if matches!(tokenizer.context().current_type, TokenKind::Eof | TokenKind::Pipe) {
                break;
            }
        }

        let context = tokenizer.context();
        let end = if context.current_type == TokenKind::Pipe {
            context.last_end_loc
        } else {
            tokenizer.current_position()
        };

        Ok(Message {
            items,
            static_text: None,
            location: self.location(start, end),
        })
    }

    fn parse_text(&self, tokenizer: &mut Tokenizer<'a>, token: &Token) -> Node {
        let start = tokenizer.context().start_loc;

        Node::Text(Text {
            value: Some(token.value.as_deref().unwrap_or_default().to_string()),
            location: self.location(start, tokenizer.current_position()),
        })
    }

    fn parse_list(&self, tokenizer: &mut Tokenizer<'a>, token: &Token) -> Result<Node, CompileError> {
        // placeholders start at the brace
        let start = tokenizer.context().last_start_loc;
        let index = parse_list_index(token.value.as_deref().unwrap_or_default());
        tokenizer.next_token()?;

        Ok(Node::List(List {
            index,
            location: self.location(start, tokenizer.current_position()),
        }))
    }

    fn parse_named(&self, tokenizer: &mut Tokenizer<'a>, token: &Token, modulo: bool) -> Result<Node, CompileError> {
        let start = tokenizer.context().last_start_loc;
        let key = token.value.clone().unwrap_or_default();
        tokenizer.next_token()?;

        Ok(Node::Named(Named {
            key,
            modulo,
            location: self.location(start, tokenizer.current_position()),
        }))
    }

    fn parse_literal(&self, tokenizer: &mut Tokenizer<'a>, token: &Token) -> Result<Node, CompileError> {
        let start = tokenizer.context().last_start_loc;
        let value = decode_escapes(token.value.as_deref().unwrap_or_default());
        tokenizer.next_token()?;

        Ok(Node::Literal(Literal {
            value: Some(value),
            location: self.location(start, tokenizer.current_position()),
        }))
    }

    fn parse_linked_modifier(
        &self,
        tokenizer: &mut Tokenizer<'a>,
    ) -> Result<(LinkedModifier, Option<Token>), CompileError> {
        let token = tokenizer.next_token()?;
        // the modifier starts at the dot
        let start = tokenizer.context().last_start_loc;

        if token.kind != TokenKind::LinkedModifier {
            self.emit_error(tokenizer, CompileErrorKind::UnexpectedEmptyLinkedModifier, start)?;
            let modifier = LinkedModifier {
                value: Default::default(),
                location: self.location(start, start),
            };
            return Ok((modifier, Some(token)));
        }

        Ok((
            LinkedModifier {
                value: token.value.unwrap_or_default(),
                location: self.location(start, tokenizer.current_position()),
            },
            None,
        ))
    }

    fn parse_linked(&self, tokenizer: &mut Tokenizer<'a>) -> Result<(Linked, Option<Token>), CompileError> {
        let start = tokenizer.context().start_loc;
        let mut token = tokenizer.next_token()?;
        let mut modifier = None;

        if token.kind == TokenKind::LinkedDot {
            let (parsed, next) = self.parse_linked_modifier(tokenizer)?;
            modifier = Some(parsed);
            token = match next {
                Some(next) => next,
                None => tokenizer.next_token()?,
            };
        }

        if token.kind != TokenKind::LinkedDelimiter {
            let error_start = tokenizer.context().last_start_loc;
            self.emit_error(
                tokenizer,
                CompileErrorKind::UnexpectedLexicalAnalysis(token.caption()),
                error_start,
            )?;
        }

        token = tokenizer.next_token()?;
        if token.kind == TokenKind::BraceLeft {
            token = tokenizer.next_token()?;
        }

        let key = match token.kind {
            TokenKind::LinkedKey => {
                let start = tokenizer.context().start_loc;
                Node::LinkedKey(LinkedKey {
                    value: token.value.as_deref().unwrap_or_default().to_string(),
                    location: self.location(start, tokenizer.current_position()),
                })
            }
            TokenKind::Named => self.parse_named(tokenizer, &token, false)?,
            TokenKind::List => self.parse_list(tokenizer, &token)?,
            TokenKind::Literal => self.parse_literal(tokenizer, &token)?,
            _ => {
                let error_start = tokenizer.context().last_start_loc;
                self.emit_error(tokenizer, CompileErrorKind::UnexpectedEmptyLinkedKey, error_start)?;
                let at = tokenizer.context().start_loc;
                let linked = Linked {
                    key: Box::new(Node::LinkedKey(LinkedKey {
                        value: String::new(),
                        location: self.location(at, at),
                    })),
                    modifier,
                    location: self.location(start, at),
                };
                return Ok((linked, Some(token)));
            }
        };

        Ok((
            Linked {
                key: Box::new(key),
                modifier,
                location: self.location(start, tokenizer.current_position()),
            },
            None,
        ))
    }
}

/// Decodes the escapes a literal token keeps verbatim.
///
/// A unicode escape with too few digits, a surrogate or an out of range code point
/// decodes to U+FFFD.
pub fn decode_escapes(value: &str) -> String {
    let mut decoded = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            decoded.push(ch);
            continue;
        }

        match chars.next() {
            Some(escaped @ ('\\' | '\'')) => decoded.push(escaped),
            Some(unicode @ ('u' | 'U')) => {
                let digits = if unicode == 'u' { 4 } else { 6 };
                let mut hex = String::with_capacity(digits);

                while hex.len() < digits {
                    match chars.peek() {
                        Some(ch) if ch.is_ascii_hexdigit() => {
                            hex.push(*ch);
                            chars.next();
                        }
                        _ => break,
                    }
                }

                let decoded_char = if hex.len() == digits {
                    u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|code_point| *code_point <= 0xd7ff || *code_point >= 0xe000)
                        .and_then(char::from_u32)
                } else {
                    None
                };

                decoded.push(decoded_char.unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Some(other) => {
                decoded.push('\\');
                decoded.push(other);
            }
            None => decoded.push('\\'),
        }
    }

    decoded
}

/// Out-of-range indexes saturate so they still address nothing at runtime.
fn parse_list_index(digits: &str) -> i64 {
    digits
        .parse::<i64>()
        .unwrap_or(if digits.starts_with('-') { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompileErrorCodes, CompileWarnCodes};
    use rstest::rstest;

    fn parse(source: &str) -> Resource {
        Parser::new(ParserOptions { location: false, on_cache_key: None }, Diagnostics::default())
            .parse(source)
            .unwrap()
    }

    fn parse_with_errors(source: &str) -> (Resource, Vec<u16>) {
        let mut errors = Vec::new();
        let resource = {
            let mut parser = Parser::new(
                ParserOptions { location: false, on_cache_key: None },
                Diagnostics::new(Some(Box::new(|e: CompileError| errors.push(e.code()))), None),
            );
            parser.parse(source).unwrap()
        };
        (resource, errors)
    }

    fn message(items: Vec<Node>) -> Node {
        Node::Message(Message::new(items))
    }

    #[rstest]
    #[case::text("hello", message(vec![Node::Text(Text::new("hello"))]))]
    #[case::empty("", message(vec![]))]
    #[case::list("hi {0} !", message(vec![
        Node::Text(Text::new("hi ")),
        Node::List(List::new(0)),
        Node::Text(Text::new(" !")),
    ]))]
    #[case::negative_list("{-1}", message(vec![Node::List(List::new(-1))]))]
    #[case::overflowing_list("{99999999999999999999}", message(vec![Node::List(List::new(i64::MAX))]))]
    #[case::overflowing_negative_list("{-99999999999999999999}", message(vec![Node::List(List::new(i64::MIN))]))]
    #[case::named("{name}", message(vec![Node::Named(Named::new("name"))]))]
    #[case::literal(r"{'A\\\''}", message(vec![Node::Literal(Literal::new("A\\'"))]))]
    #[case::linked_key("@:message.hello", message(vec![
        Node::Linked(Linked::new(Node::LinkedKey(LinkedKey::new("message.hello")), None)),
    ]))]
    #[case::linked_modifier("hi @.upper:{'name'} !", message(vec![
        Node::Text(Text::new("hi ")),
        Node::Linked(Linked::new(Node::Literal(Literal::new("name")), Some(LinkedModifier::new("upper")))),
        Node::Text(Text::new(" !")),
    ]))]
    #[case::linked_named("@:{key}", message(vec![
        Node::Linked(Linked::new(Node::Named(Named::new("key")), None)),
    ]))]
    #[case::linked_list("@.lower:{0}", message(vec![
        Node::Linked(Linked::new(Node::List(List::new(0)), Some(LinkedModifier::new("lower")))),
    ]))]
    #[case::plural("no apples | one apple | {count} apples", Node::Plural(Plural {
        cases: vec![
            Message::new(vec![Node::Text(Text::new("no apples"))]),
            Message::new(vec![Node::Text(Text::new("one apple"))]),
            Message::new(vec![Node::Named(Named::new("count")), Node::Text(Text::new(" apples"))]),
        ],
        location: None,
    }))]
    fn test_parse(#[case] source: &str, #[case] expected: Node) {
        assert_eq!(*parse(source).body, expected);
    }

    #[test]
    fn test_plural_with_empty_cases() {
        let (resource, errors) = parse_with_errors(" | | |");

        assert_eq!(errors, vec![CompileErrorCodes::MUST_HAVE_MESSAGES_IN_PLURAL]);
        match *resource.body {
            Node::Plural(plural) => {
                assert_eq!(plural.cases.len(), 4);
                assert!(plural.cases.iter().all(|case| case.items.is_empty()));
            }
            node => panic!("expected plural, got {node:?}"),
        }
    }

    #[rstest]
    #[case::empty_modifier("@.:foo", vec![CompileErrorCodes::UNEXPECTED_EMPTY_LINKED_MODIFIER])]
    #[case::empty_key("@:", vec![CompileErrorCodes::UNEXPECTED_EMPTY_LINKED_KEY])]
    #[case::missing_delimiter("@.upper", vec![
        CompileErrorCodes::UNEXPECTED_LEXICAL_ANALYSIS,
        CompileErrorCodes::UNEXPECTED_EMPTY_LINKED_KEY,
    ])]
    fn test_linked_errors(#[case] source: &str, #[case] expected: Vec<u16>) {
        let (resource, errors) = parse_with_errors(source);

        assert_eq!(errors, expected);
        assert!(matches!(*resource.body, Node::Message(_)));
    }

    #[test]
    fn test_nested_placeholder_recovers() {
        let (resource, errors) = parse_with_errors("hi {{name}} x");

        assert_eq!(errors, vec![CompileErrorCodes::NOT_ALLOW_NEST_PLACEHOLDER]);
        assert_eq!(
            *resource.body,
            message(vec![
                Node::Text(Text::new("hi ")),
                Node::Named(Named::new("name")),
                Node::Text(Text::new(" x")),
            ])
        );
    }

    #[test]
    fn test_empty_key_synthesizes_node() {
        let (resource, _) = parse_with_errors("@:");

        assert_eq!(
            *resource.body,
            message(vec![Node::Linked(Linked::new(Node::LinkedKey(LinkedKey::new("")), None))])
        );
    }

    #[test]
    fn test_modulo_named() {
        let mut warnings = Vec::new();
        let resource = {
            let mut parser = Parser::new(
                ParserOptions { location: false, on_cache_key: None },
                Diagnostics::new(None, Some(Box::new(|w: CompileWarn| warnings.push(w.code())))),
            );
            parser.parse("hi %{name}").unwrap()
        };

        assert_eq!(warnings, vec![CompileWarnCodes::USE_MODULO_SYNTAX]);
        assert_eq!(
            *resource.body,
            message(vec![
                Node::Text(Text::new("hi ")),
                Node::Named(Named {
                    key: "name".into(),
                    modulo: true,
                    location: None
                }),
            ])
        );
    }

    #[test]
    fn test_cache_key() {
        let mut parser = Parser::new(
            ParserOptions {
                location: false,
                on_cache_key: Some(Box::new(|source: &str| format!("key:{source}"))),
            },
            Diagnostics::default(),
        );

        assert_eq!(parser.parse("hello").unwrap().cache_key, Some("key:hello".to_string()));
    }

    #[test]
    fn test_locations() {
        let resource = Parser::new(ParserOptions::default(), Diagnostics::default())
            .parse("hi {name}")
            .unwrap();
        let location = resource.location.unwrap();

        assert_eq!(location.source.as_deref(), Some("hi {name}"));
        assert_eq!(location.end, Position::new(1, 10, 9));

        match *resource.body {
            Node::Message(message) => {
                assert_eq!(message.items[1].start(), Some(3));
                assert_eq!(message.items[1].end(), Some(9));
            }
            node => panic!("expected message, got {node:?}"),
        }
    }

    #[test]
    fn test_first_error_aborts_without_handler() {
        let result = Parser::new(ParserOptions::default(), Diagnostics::default()).parse("a | | b");
        assert_eq!(
            result.map_err(|e| e.code()),
            Err(CompileErrorCodes::MUST_HAVE_MESSAGES_IN_PLURAL)
        );
    }

    #[rstest]
    #[case::quote(r"\'", "'")]
    #[case::backslash(r"\\", "\\")]
    #[case::bmp(r"\u3042", "あ")]
    #[case::astral(r"\U01F600", "😀")]
    #[case::surrogate(r"\uD800", "\u{FFFD}")]
    #[case::too_short(r"\u00", "\u{FFFD}")]
    #[case::out_of_range(r"\UFFFFFF", "\u{FFFD}")]
    #[case::plain("abc", "abc")]
    fn test_decode_escapes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(decode_escapes(input), expected);
    }
}
