use std::borrow::Cow;

use smol_str::SmolStr;

use crate::value::MessageValue;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
enum State {
    BeforeSegment,
    InIdent,
    InBracket,
    InSingleQuote,
    InDoubleQuote,
    AfterQuote,
    AfterBracket,
}

/// Splits a key path into segments.
///
/// Accepts `a.b`, `a[0]`, `a['b c']` and `a["b"]`. Returns `None` for malformed paths.
pub fn parse_path(path: &str) -> Option<Vec<SmolStr>> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut state = State::BeforeSegment;

    for c in path.chars() {
        state = match (state, c) {
            (State::BeforeSegment, '.' | ']') => return None,
            (State::BeforeSegment, '[') => State::InBracket,
            (State::BeforeSegment | State::InIdent, c) if c.is_whitespace() => return None,
            (State::BeforeSegment | State::InIdent, '\'' | '"') => return None,
            (State::BeforeSegment, c) => {
                buf.push(c);
                State::InIdent
            }
            (State::InIdent, '.') => {
                segments.push(SmolStr::from(std::mem::take(&mut buf)));
                State::BeforeSegment
            }
            (State::InIdent, '[') => {
                segments.push(SmolStr::from(std::mem::take(&mut buf)));
                State::InBracket
            }
            (State::InIdent, ']') => return None,
            (State::InIdent, c) => {
                buf.push(c);
                State::InIdent
            }
            (State::InBracket, '\'') if buf.trim().is_empty() => {
                buf.clear();
                State::InSingleQuote
            }
            (State::InBracket, '"') if buf.trim().is_empty() => {
                buf.clear();
                State::InDoubleQuote
            }
            (State::InBracket, ']') => {
                let index = buf.trim();
                if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                segments.push(SmolStr::from(index));
                buf.clear();
                State::AfterBracket
            }
            (State::InBracket, '[') => return None,
            (State::InBracket, c) => {
                buf.push(c);
                State::InBracket
            }
            (State::InSingleQuote, '\'') | (State::InDoubleQuote, '"') => {
                segments.push(SmolStr::from(std::mem::take(&mut buf)));
                State::AfterQuote
            }
            (State::InSingleQuote | State::InDoubleQuote, c) => {
                buf.push(c);
                state
            }
            (State::AfterQuote, c) if c.is_whitespace() => State::AfterQuote,
            (State::AfterQuote, ']') => State::AfterBracket,
            (State::AfterQuote, _) => return None,
            (State::AfterBracket, '.') => State::BeforeSegment,
            (State::AfterBracket, '[') => State::InBracket,
            (State::AfterBracket, _) => return None,
        };
    }

    match state {
        State::InIdent => {
            segments.push(SmolStr::from(buf));
            Some(segments)
        }
        State::AfterBracket => Some(segments),
        _ => None,
    }
}

/// One spelling per path: `a['b'][0]` and `a.b.0` both become `a.b.0`. Malformed paths are kept as written.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    match parse_path(path) {
        Some(segments) => {
            let normalized = segments.join(".");
            if normalized == path {
                Cow::Borrowed(path)
            } else {
                Cow::Owned(normalized)
            }
        }
        None => Cow::Borrowed(path),
    }
}

/// Looks `path` up in `tree`, first as nested segments and then as a flat key.
pub fn resolve_value<'a>(tree: &'a MessageValue, path: &str) -> Option<&'a MessageValue> {
    parse_path(path)
        .and_then(|segments| {
            segments
                .iter()
                .try_fold(tree, |value, segment| value.child(segment))
        })
        .or_else(|| match tree {
            MessageValue::Object(object) => object.get(path),
            _ => None,
        })
}
