pub mod token;

use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::{
    error::{CompileError, CompileErrorKind, Diagnostics},
    range::{Position, SourceLocation},
    scanner::Scanner,
};

const CHAR_SP: char = ' ';
const CHAR_LF: char = '\n';
const BRACE_LEFT: char = '{';
const BRACE_RIGHT: char = '}';
const PIPE: char = '|';
const MODULO: char = '%';
const LINKED_ALIAS: char = '@';
const LINKED_DOT: char = '.';
const LINKED_DELIMITER: char = ':';
const LITERAL_DELIMITER: char = '\'';

/// Mutable state of the tokenizer, readable by the parser.
///
/// `offset`/`start_loc`/`end_loc` describe the token currently being produced,
/// the `last_*` fields the one before it.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeContext {
    pub current_type: TokenKind,
    pub offset: usize,
    pub start_loc: Position,
    pub end_loc: Position,
    pub last_type: TokenKind,
    pub last_offset: usize,
    pub last_start_loc: Position,
    pub last_end_loc: Position,
    pub brace_nest: usize,
    pub in_linked: bool,
}

impl TokenizeContext {
    fn new(position: Position) -> Self {
        Self {
            current_type: TokenKind::Eof,
            offset: position.offset,
            start_loc: position,
            end_loc: position,
            last_type: TokenKind::Eof,
            last_offset: position.offset,
            last_start_loc: position,
            last_end_loc: position,
            brace_nest: 0,
            in_linked: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizerOptions {
    pub location: bool,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self { location: true }
    }
}

#[inline(always)]
fn is_identifier_start(ch: Option<char>) -> bool {
    matches!(ch, Some('a'..='z' | 'A'..='Z' | '_'))
}

#[inline(always)]
fn is_number_start(ch: Option<char>) -> bool {
    matches!(ch, Some('0'..='9'))
}

#[inline(always)]
fn is_identifier(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

#[inline(always)]
fn is_named_identifier(ch: char) -> bool {
    is_identifier(ch) || ch == '-'
}

#[inline(always)]
fn is_literal(ch: char) -> bool {
    ch != LITERAL_DELIMITER && ch != CHAR_LF
}

#[inline(always)]
fn is_invalid_identifier(ch: char) -> bool {
    ch != BRACE_LEFT && ch != BRACE_RIGHT && ch != CHAR_SP && ch != CHAR_LF
}

#[inline(always)]
fn is_linked_refer_end(ch: char) -> bool {
    matches!(
        ch,
        BRACE_LEFT | BRACE_RIGHT | MODULO | LINKED_ALIAS | LINKED_DELIMITER | PIPE | '(' | ')' | CHAR_SP | CHAR_LF
    )
}

/// Hand-written state machine turning message source into [`Token`]s.
///
/// The meaning of a character depends on whether the cursor is inside a `{...}`
/// placeholder (`brace_nest > 0`) or an `@...:` linked expression (`in_linked`).
pub struct Tokenizer<'a> {
    scanner: Scanner,
    context: TokenizeContext,
    location: bool,
    diagnostics: Diagnostics<'a>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &str, options: TokenizerOptions, diagnostics: Diagnostics<'a>) -> Self {
        let scanner = Scanner::new(source);
        let position = scanner.position();

        Self {
            scanner,
            context: TokenizeContext::new(position),
            location: options.location,
            diagnostics,
        }
    }

    pub fn context(&self) -> &TokenizeContext {
        &self.context
    }

    pub fn current_offset(&self) -> usize {
        self.scanner.offset()
    }

    pub fn current_position(&self) -> Position {
        self.scanner.position()
    }

    /// Whether every character of the source has been consumed.
    pub fn is_eof(&self) -> bool {
        self.scanner.is_eof()
    }

    pub fn location_enabled(&self) -> bool {
        self.location
    }

    pub(crate) fn diagnostics(&mut self) -> &mut Diagnostics<'a> {
        &mut self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics<'a> {
        self.diagnostics
    }

    /// Produces the next token. Once the source is exhausted every call yields [`TokenKind::Eof`].
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        self.context.last_type = self.context.current_type;
        self.context.last_offset = self.context.offset;
        self.context.last_start_loc = self.context.start_loc;
        self.context.last_end_loc = self.context.end_loc;
        self.context.offset = self.current_offset();
        self.context.start_loc = self.current_position();

        if self.scanner.current_char().is_none() {
            return Ok(self.token(TokenKind::Eof, None));
        }

        self.read_token()
    }

    fn emit_error(&mut self, kind: CompileErrorKind) -> Result<(), CompileError> {
        let location = self
            .location
            .then(|| SourceLocation::new(self.context.start_loc, self.current_position()));
        self.diagnostics.error(CompileError::new(kind, location))
    }

    fn token(&mut self, kind: TokenKind, value: Option<SmolStr>) -> Token {
        self.context.end_loc = self.current_position();
        self.context.current_type = kind;

        Token {
            kind,
            value,
            location: self
                .location
                .then(|| SourceLocation::new(self.context.start_loc, self.context.end_loc)),
        }
    }

    fn end_token(&mut self) -> Token {
        self.token(TokenKind::Eof, None)
    }

    fn eat(&mut self, ch: char) -> Result<Option<char>, CompileError> {
        if self.scanner.current_char() == Some(ch) {
            self.scanner.next();
            Ok(Some(ch))
        } else {
            self.emit_error(CompileErrorKind::ExpectedToken(ch.to_string()))?;
            Ok(None)
        }
    }

    fn peek_spaces(&mut self) -> usize {
        let mut count = 0;

        while matches!(self.scanner.current_peek(), Some(CHAR_SP | CHAR_LF)) {
            count += 1;
            self.scanner.peek();
        }

        count
    }

    fn skip_spaces(&mut self) {
        self.peek_spaces();
        self.scanner.skip_to_peek();
    }

    fn take_char(&mut self, predicate: impl Fn(char) -> bool) -> Option<char> {
        match self.scanner.current_char() {
            Some(ch) if predicate(ch) => {
                self.scanner.next();
                Some(ch)
            }
            _ => None,
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut buf = String::new();

        while let Some(ch) = self.take_char(&predicate) {
            buf.push(ch);
        }

        buf
    }

    fn is_named_identifier_start(&mut self) -> bool {
        if self.context.current_type != TokenKind::BraceLeft {
            return false;
        }

        self.peek_spaces();
        let ret = is_identifier_start(self.scanner.current_peek());
        self.scanner.reset_peek(0);
        ret
    }

    fn is_list_identifier_start(&mut self) -> bool {
        if self.context.current_type != TokenKind::BraceLeft {
            return false;
        }

        self.peek_spaces();
        let ch = match self.scanner.current_peek() {
            Some('-') => self.scanner.peek(),
            ch => ch,
        };
        let ret = is_number_start(ch);
        self.scanner.reset_peek(0);
        ret
    }

    fn is_literal_start(&mut self) -> bool {
        if self.context.current_type != TokenKind::BraceLeft {
            return false;
        }

        self.peek_spaces();
        let ret = self.scanner.current_peek() == Some(LITERAL_DELIMITER);
        self.scanner.reset_peek(0);
        ret
    }

    fn is_linked_dot_start(&mut self) -> bool {
        if self.context.current_type != TokenKind::LinkedAlias {
            return false;
        }

        self.peek_spaces();
        let ret = self.scanner.current_peek() == Some(LINKED_DOT);
        self.scanner.reset_peek(0);
        ret
    }

    fn is_linked_modifier_start(&mut self) -> bool {
        if self.context.current_type != TokenKind::LinkedDot {
            return false;
        }

        self.peek_spaces();
        let ret = is_identifier_start(self.scanner.current_peek());
        self.scanner.reset_peek(0);
        ret
    }

    fn is_linked_delimiter_start(&mut self) -> bool {
        if !matches!(
            self.context.current_type,
            TokenKind::LinkedAlias | TokenKind::LinkedModifier
        ) {
            return false;
        }

        self.peek_spaces();
        let ret = self.scanner.current_peek() == Some(LINKED_DELIMITER);
        self.scanner.reset_peek(0);
        ret
    }

    fn is_linked_refer_start(&mut self) -> bool {
        if self.context.current_type != TokenKind::LinkedDelimiter {
            return false;
        }

        let ret = loop {
            match self.scanner.current_peek() {
                Some(BRACE_LEFT) => break is_identifier_start(self.scanner.peek()),
                None
                | Some(
                    BRACE_RIGHT | LINKED_ALIAS | MODULO | PIPE | LINKED_DELIMITER | LINKED_DOT | CHAR_SP,
                ) => break false,
                Some(CHAR_LF) => {
                    self.scanner.peek();
                }
                Some(_) => break self.is_text_start(false),
            }
        };

        self.scanner.reset_peek(0);
        ret
    }

    fn is_plural_start(&mut self) -> bool {
        self.peek_spaces();
        let ret = self.scanner.current_peek() == Some(PIPE);
        self.scanner.reset_peek(0);
        ret
    }

    /// Returns whether `%{` follows, and whether spaces precede it.
    fn detect_modulo_start(&mut self) -> (bool, bool) {
        let spaces = self.peek_spaces();
        let ret = self.scanner.current_peek() == Some(MODULO) && self.scanner.peek() == Some(BRACE_LEFT);
        self.scanner.reset_peek(0);
        (ret, spaces > 0)
    }

    fn is_text_start(&mut self, reset: bool) -> bool {
        let mut has_space = false;
        let mut prev = None;
        let mut detect_modulo = false;

        let ret = loop {
            match self.scanner.current_peek() {
                Some(BRACE_LEFT) => break prev != Some(MODULO) && has_space,
                Some(LINKED_ALIAS) | None => break prev == Some(MODULO) || has_space,
                Some(MODULO) => {
                    self.scanner.peek();
                    prev = Some(MODULO);
                    detect_modulo = true;
                }
                Some(PIPE) => {
                    break prev == Some(MODULO) || detect_modulo || !matches!(prev, Some(CHAR_SP | CHAR_LF));
                }
                Some(ch @ (CHAR_SP | CHAR_LF)) => {
                    self.scanner.peek();
                    has_space = true;
                    prev = Some(ch);
                }
                Some(_) => break true,
            }
        };

        if reset {
            self.scanner.reset_peek(0);
        }

        ret
    }

    fn read_text(&mut self) -> String {
        let mut buf = String::new();

        loop {
            match self.scanner.current_char() {
                None | Some(BRACE_LEFT | BRACE_RIGHT | LINKED_ALIAS | PIPE) => break,
                Some(MODULO) => {
                    if !self.is_text_start(true) {
                        break;
                    }
                    buf.push(MODULO);
                    self.scanner.next();
                }
                Some(ch @ (CHAR_SP | CHAR_LF)) => {
                    if !self.is_text_start(true) && self.is_plural_start() {
                        break;
                    }
                    buf.push(ch);
                    self.scanner.next();
                }
                Some(ch) => {
                    buf.push(ch);
                    self.scanner.next();
                }
            }
        }

        buf
    }

    fn read_named_identifier(&mut self) -> Result<String, CompileError> {
        self.skip_spaces();
        let name = self.take_while(is_named_identifier);

        if self.scanner.current_char().is_none() {
            self.emit_error(CompileErrorKind::UnterminatedClosingBrace)?;
        }

        Ok(name)
    }

    fn read_list_identifier(&mut self) -> Result<String, CompileError> {
        self.skip_spaces();
        let mut value = String::new();

        if self.scanner.current_char() == Some('-') {
            self.scanner.next();
            value.push('-');
        }

        value.push_str(&self.take_while(|ch| ch.is_ascii_digit()));

        if self.scanner.current_char().is_none() {
            self.emit_error(CompileErrorKind::UnterminatedClosingBrace)?;
        }

        Ok(value)
    }

    /// Reads a quoted literal. Escape sequences are kept verbatim and decoded by the parser.
    fn read_literal(&mut self) -> Result<String, CompileError> {
        self.skip_spaces();
        self.eat(LITERAL_DELIMITER)?;
        let mut literal = String::new();

        while let Some(ch) = self.take_char(is_literal) {
            if ch == '\\' {
                literal.push_str(&self.read_escape_sequence()?);
            } else {
                literal.push(ch);
            }
        }

        let current = self.scanner.current_char();
        if current == Some(CHAR_LF) || current.is_none() {
            self.emit_error(CompileErrorKind::UnterminatedSingleQuoteInPlaceholder)?;
            if current == Some(CHAR_LF) {
                self.scanner.next();
            }
            return Ok(literal);
        }

        self.eat(LITERAL_DELIMITER)?;
        Ok(literal)
    }

    fn read_escape_sequence(&mut self) -> Result<String, CompileError> {
        match self.scanner.current_char() {
            Some(ch @ ('\\' | LITERAL_DELIMITER)) => {
                self.scanner.next();
                Ok(format!("\\{ch}"))
            }
            Some('u') => self.read_unicode_escape_sequence('u', 4),
            Some('U') => self.read_unicode_escape_sequence('U', 6),
            ch => {
                self.emit_error(CompileErrorKind::UnknownEscapeSequence(
                    ch.map(String::from).unwrap_or_default(),
                ))?;
                Ok(String::new())
            }
        }
    }

    fn read_unicode_escape_sequence(&mut self, unicode: char, digits: usize) -> Result<String, CompileError> {
        self.eat(unicode)?;
        let mut sequence = String::new();

        for _ in 0..digits {
            match self.take_char(|ch| ch.is_ascii_hexdigit()) {
                Some(ch) => sequence.push(ch),
                None => {
                    let current = self.scanner.current_char().map(String::from).unwrap_or_default();
                    self.emit_error(CompileErrorKind::InvalidUnicodeEscapeSequence(format!(
                        "\\{unicode}{sequence}{current}"
                    )))?;
                    break;
                }
            }
        }

        Ok(format!("\\{unicode}{sequence}"))
    }

    fn read_invalid_identifier(&mut self) -> String {
        self.skip_spaces();
        let identifiers = self.take_while(is_invalid_identifier);

        if identifiers.is_empty() {
            // keep making progress on stray characters
            return self.scanner.current_char().map_or_else(String::new, |ch| {
                self.scanner.next();
                ch.to_string()
            });
        }

        identifiers
    }

    fn read_linked_char(&mut self, expected: char) -> Result<SmolStr, CompileError> {
        self.skip_spaces();

        if self.scanner.current_char() != Some(expected) {
            self.emit_error(CompileErrorKind::ExpectedToken(expected.to_string()))?;
        }

        self.scanner.next();
        Ok(SmolStr::new(expected.to_string()))
    }

    fn read_linked_refer(&mut self) -> String {
        self.take_while(|ch| !is_linked_refer_end(ch))
    }

    fn read_plural(&mut self) -> Result<Option<SmolStr>, CompileError> {
        self.skip_spaces();
        let plural = self.eat(PIPE)?;
        self.skip_spaces();
        Ok(plural.map(|ch| SmolStr::new(ch.to_string())))
    }

    fn read_pipe(&mut self) -> Result<Token, CompileError> {
        let value = self.read_plural()?;
        let token = self.token(TokenKind::Pipe, value);
        self.context.brace_nest = 0;
        self.context.in_linked = false;
        Ok(token)
    }

    fn read_token_in_placeholder(&mut self) -> Result<Option<Token>, CompileError> {
        match self.scanner.current_char() {
            Some(BRACE_LEFT) => {
                if self.context.brace_nest >= 1 {
                    self.emit_error(CompileErrorKind::NotAllowNestPlaceholder)?;
                }
                self.scanner.next();
                let token = self.token(TokenKind::BraceLeft, Some(SmolStr::new_static("{")));
                self.skip_spaces();
                self.context.brace_nest += 1;
                Ok(Some(token))
            }
            Some(BRACE_RIGHT) => {
                if self.context.brace_nest > 0 && self.context.current_type == TokenKind::BraceLeft {
                    self.emit_error(CompileErrorKind::EmptyPlaceholder)?;
                }
                self.scanner.next();
                let token = self.token(TokenKind::BraceRight, Some(SmolStr::new_static("}")));
                self.context.brace_nest = self.context.brace_nest.saturating_sub(1);
                if self.context.brace_nest > 0 {
                    self.skip_spaces();
                }
                if self.context.in_linked && self.context.brace_nest == 0 {
                    self.context.in_linked = false;
                }
                Ok(Some(token))
            }
            Some(LINKED_ALIAS) => {
                if self.context.brace_nest > 0 {
                    self.emit_error(CompileErrorKind::UnterminatedClosingBrace)?;
                }
                let token = match self.read_token_in_linked()? {
                    Some(token) => token,
                    None => self.end_token(),
                };
                self.context.brace_nest = 0;
                Ok(Some(token))
            }
            _ => {
                if self.is_plural_start() {
                    if self.context.brace_nest > 0 {
                        self.emit_error(CompileErrorKind::UnterminatedClosingBrace)?;
                    }
                    return self.read_pipe().map(Some);
                }

                if self.context.brace_nest > 0
                    && matches!(
                        self.context.current_type,
                        TokenKind::Named | TokenKind::List | TokenKind::Literal
                    )
                {
                    self.emit_error(CompileErrorKind::UnterminatedClosingBrace)?;
                    self.context.brace_nest = 0;
                    return self.read_token().map(Some);
                }

                if self.is_named_identifier_start() {
                    let value = self.read_named_identifier()?;
                    let token = self.token(TokenKind::Named, Some(value.into()));
                    self.skip_spaces();
                    return Ok(Some(token));
                }

                if self.is_list_identifier_start() {
                    let value = self.read_list_identifier()?;
                    let token = self.token(TokenKind::List, Some(value.into()));
                    self.skip_spaces();
                    return Ok(Some(token));
                }

                if self.is_literal_start() {
                    let value = self.read_literal()?;
                    let token = self.token(TokenKind::Literal, Some(value.into()));
                    self.skip_spaces();
                    return Ok(Some(token));
                }

                let value = self.read_invalid_identifier();
                let token = self.token(TokenKind::InvalidPlace, Some(SmolStr::new(&value)));
                self.emit_error(CompileErrorKind::InvalidTokenInPlaceholder(value))?;
                self.skip_spaces();
                Ok(Some(token))
            }
        }
    }

    fn read_token_in_linked(&mut self) -> Result<Option<Token>, CompileError> {
        let current_type = self.context.current_type;
        let ch = self.scanner.current_char();

        if matches!(
            current_type,
            TokenKind::LinkedAlias | TokenKind::LinkedDot | TokenKind::LinkedModifier | TokenKind::LinkedDelimiter
        ) && matches!(ch, Some(CHAR_SP | CHAR_LF))
        {
            self.emit_error(CompileErrorKind::InvalidLinkedFormat)?;
        }

        match ch {
            Some(LINKED_ALIAS) => {
                self.scanner.next();
                let token = self.token(TokenKind::LinkedAlias, Some(SmolStr::new_static("@")));
                self.context.in_linked = true;
                Ok(Some(token))
            }
            Some(LINKED_DOT) => {
                let value = self.read_linked_char(LINKED_DOT)?;
                Ok(Some(self.token(TokenKind::LinkedDot, Some(value))))
            }
            Some(LINKED_DELIMITER) => {
                let value = self.read_linked_char(LINKED_DELIMITER)?;
                Ok(Some(self.token(TokenKind::LinkedDelimiter, Some(value))))
            }
            _ => {
                if self.is_plural_start() {
                    return self.read_pipe().map(Some);
                }

                if self.is_linked_dot_start() || self.is_linked_delimiter_start() {
                    self.skip_spaces();
                    return self.read_token_in_linked();
                }

                if self.is_linked_modifier_start() {
                    self.skip_spaces();
                    let value = self.take_while(is_identifier);
                    return Ok(Some(self.token(TokenKind::LinkedModifier, Some(value.into()))));
                }

                if self.is_linked_refer_start() {
                    self.skip_spaces();
                    if ch == Some(BRACE_LEFT) {
                        return self.read_token_in_placeholder();
                    }
                    let value = self.read_linked_refer();
                    return Ok(Some(self.token(TokenKind::LinkedKey, Some(value.into()))));
                }

                if current_type == TokenKind::LinkedAlias {
                    self.emit_error(CompileErrorKind::InvalidLinkedFormat)?;
                }

                self.context.brace_nest = 0;
                self.context.in_linked = false;
                self.read_token().map(Some)
            }
        }
    }

    fn read_token(&mut self) -> Result<Token, CompileError> {
        if self.context.brace_nest > 0 {
            return match self.read_token_in_placeholder()? {
                Some(token) => Ok(token),
                None => Ok(self.end_token()),
            };
        }

        if self.context.in_linked {
            return match self.read_token_in_linked()? {
                Some(token) => Ok(token),
                None => Ok(self.end_token()),
            };
        }

        match self.scanner.current_char() {
            Some(BRACE_LEFT) => match self.read_token_in_placeholder()? {
                Some(token) => Ok(token),
                None => Ok(self.end_token()),
            },
            Some(BRACE_RIGHT) => {
                self.emit_error(CompileErrorKind::UnbalancedClosingBrace)?;
                self.scanner.next();
                Ok(self.token(TokenKind::BraceRight, Some(SmolStr::new_static("}"))))
            }
            Some(LINKED_ALIAS) => match self.read_token_in_linked()? {
                Some(token) => Ok(token),
                None => Ok(self.end_token()),
            },
            _ => {
                if self.is_plural_start() {
                    return self.read_pipe();
                }

                let (is_modulo, has_space) = self.detect_modulo_start();
                if is_modulo {
                    return if has_space {
                        let value = self.read_text();
                        Ok(self.token(TokenKind::Text, Some(value.into())))
                    } else {
                        let value = self.read_linked_char(MODULO)?;
                        Ok(self.token(TokenKind::Modulo, Some(value)))
                    };
                }

                if self.is_text_start(true) {
                    let value = self.read_text();
                    return Ok(self.token(TokenKind::Text, Some(value.into())));
                }

                Ok(self.end_token())
            }
        }
    }
}

/// Tokenizes the whole source, stopping at the first [`TokenKind::Eof`].
pub fn tokenize(source: &str, options: TokenizerOptions, diagnostics: Diagnostics<'_>) -> Result<Vec<Token>, CompileError> {
    let mut tokenizer = Tokenizer::new(source, options, diagnostics);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);

        if is_eof {
            break;
        }
    }

    Ok(tokens)
}
