pub mod source_map;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::ast::{Helper, Linked, Message, Node, Plural, Resource, StaticText};
use crate::error::{CompileError, CompileErrorKind, ErrorDomain};
pub use source_map::{SourceMap, SourceMapGenerator};

pub const DEFAULT_FILENAME: &str = "message.intl";
const INDENT: &str = "  ";

/// Shape of the generated procedure.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    /// `function __msg__ (ctx) { ... }`
    #[default]
    Block,
    /// `(ctx) => expression`
    Arrow,
}

impl Display for GenerateMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            GenerateMode::Block => write!(f, "block"),
            GenerateMode::Arrow => write!(f, "arrow"),
        }
    }
}

impl FromStr for GenerateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" | "normal" => Ok(GenerateMode::Block),
            "arrow" => Ok(GenerateMode::Arrow),
            _ => Err(format!("unknown generate mode: {}", s)),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct GenerateOptions {
    pub mode: GenerateMode,
    /// Statement separator, `"\n"` in block mode and `";"` in arrow mode by default.
    pub break_line_code: Option<String>,
    /// Indent nested arrays; on by default except in arrow mode.
    pub need_indent: Option<bool>,
    pub source_map: bool,
    pub filename: Option<String>,
}

impl GenerateOptions {
    pub fn break_line_code(&self) -> &str {
        match (&self.break_line_code, self.mode) {
            (Some(code), _) => code,
            (None, GenerateMode::Block) => "\n",
            (None, GenerateMode::Arrow) => ";",
        }
    }

    pub fn need_indent(&self) -> bool {
        self.need_indent.unwrap_or(self.mode != GenerateMode::Arrow)
    }

    pub fn filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(DEFAULT_FILENAME)
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct GenerateResult {
    pub code: String,
    pub map: Option<SourceMap>,
}

struct CodeGenerator<'a> {
    code: String,
    line: u32,
    column: u32,
    indent_level: usize,
    break_line_code: &'a str,
    need_indent: bool,
    map: Option<SourceMapGenerator>,
}

impl<'a> CodeGenerator<'a> {
    fn push(&mut self, code: &str) {
        self.code.push_str(code);
        for c in code.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += c.len_utf16() as u32;
            }
        }
    }

    /// Pushes `code` and records a mapping from `node`'s start position.
    fn push_mapped(&mut self, code: &str, node: &Node) {
        if let (Some(map), Some(location)) = (self.map.as_mut(), node.location()) {
            let name = match node {
                Node::Named(named) => Some(named.key.as_str()),
                Node::LinkedKey(key) => Some(key.value.as_str()),
                Node::LinkedModifier(modifier) => Some(modifier.value.as_str()),
                _ => None,
            };
            map.add_mapping(self.line, self.column, location.start, name);
        }
        self.push(code);
    }

    fn statement_break(&mut self) {
        let code = if self.need_indent {
            format!("{}{}", self.break_line_code, INDENT.repeat(self.indent_level))
        } else {
            self.break_line_code.to_string()
        };
        self.push(&code);
    }

    fn layout_break(&mut self) {
        if self.need_indent {
            let code = format!("\n{}", INDENT.repeat(self.indent_level));
            self.push(&code);
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
        self.layout_break();
    }

    fn deindent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
        self.layout_break();
    }

    fn helper(helper: Helper) -> String {
        format!("_{}", helper)
    }

    fn generate_body(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Message(message) => self.generate_message(message),
            Node::Plural(plural) => self.generate_plural(plural),
            _ => Err(unhandled(node)),
        }
    }

    fn generate_plural(&mut self, plural: &Plural) -> Result<(), CompileError> {
        match plural.cases.as_slice() {
            [] => {
                self.push("null");
                Ok(())
            }
            [case] => self.generate_message(case),
            cases => {
                self.push(&format!("{}([", Self::helper(Helper::Plural)));
                self.indent();
                for (i, case) in cases.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.generate_message(case)?;
                }
                self.deindent();
                self.push("])");
                Ok(())
            }
        }
    }

    fn generate_message(&mut self, message: &Message) -> Result<(), CompileError> {
        self.push(&format!("{}([", Self::helper(Helper::Normalize)));
        self.indent();

        if let Some(StaticText::Full(text)) = &message.static_text {
            self.push(&quote(text));
        } else {
            for (i, item) in message.items.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.generate_item(item)?;
            }
        }

        self.deindent();
        self.push("])");
        Ok(())
    }

    fn generate_item(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Text(text) => self.push_mapped(&quote(text.value.as_deref().unwrap_or_default()), node),
            Node::Literal(literal) => self.push_mapped(&quote(literal.value.as_deref().unwrap_or_default()), node),
            Node::LinkedKey(key) => self.push_mapped(&quote(&key.value), node),
            Node::LinkedModifier(modifier) => self.push_mapped(&quote(&modifier.value), node),
            Node::Named(named) => self.push_mapped(
                &format!(
                    "{}({}({}))",
                    Self::helper(Helper::Interpolate),
                    Self::helper(Helper::Named),
                    quote(&named.key)
                ),
                node,
            ),
            Node::List(list) => self.push_mapped(
                &format!(
                    "{}({}({}))",
                    Self::helper(Helper::Interpolate),
                    Self::helper(Helper::List),
                    list.index
                ),
                node,
            ),
            Node::Linked(linked) => self.generate_linked(linked)?,
            Node::Resource(_) | Node::Plural(_) | Node::Message(_) => return Err(unhandled(node)),
        }

        Ok(())
    }

    fn generate_linked(&mut self, linked: &Linked) -> Result<(), CompileError> {
        self.push(&format!("{}(", Self::helper(Helper::Linked)));

        match linked.key.as_ref() {
            key @ (Node::LinkedKey(_) | Node::Named(_) | Node::List(_) | Node::Literal(_)) => self.generate_item(key)?,
            key => return Err(unhandled(key)),
        }

        if let Some(modifier) = &linked.modifier {
            self.push(", ");
            self.push_mapped(&quote(&modifier.value), &Node::LinkedModifier(modifier.clone()));
        }

        self.push(")");
        Ok(())
    }
}

fn unhandled(node: &Node) -> CompileError {
    CompileError::new(
        CompileErrorKind::UnhandledCodegenNodeType(node.kind().to_string()),
        node.location().cloned(),
    )
    .with_domain(ErrorDomain::Generator)
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Emits the source text of a procedure that renders `resource`.
///
/// Runs after [`crate::transformer::transform`]; the destructured helpers are
/// exactly `resource.helpers`.
pub fn generate(resource: &Resource, options: &GenerateOptions) -> Result<GenerateResult, CompileError> {
    let source_content = resource.location.as_ref().and_then(|location| location.source.clone());
    let mut generator = CodeGenerator {
        code: String::new(),
        line: 0,
        column: 0,
        indent_level: 0,
        break_line_code: options.break_line_code(),
        need_indent: options.need_indent(),
        map: options
            .source_map
            .then(|| SourceMapGenerator::new(options.filename(), source_content)),
    };

    let bindings = resource
        .helpers
        .iter()
        .map(|helper| format!("{}: {}", helper, CodeGenerator::helper(*helper)))
        .join(", ");

    match options.mode {
        GenerateMode::Block => {
            generator.push("function __msg__ (ctx) {");
            generator.indent_level += 1;
            generator.statement_break();
            if !bindings.is_empty() {
                generator.push(&format!("const {{ {} }} = ctx", bindings));
                generator.statement_break();
            }
            generator.push("return ");
            generator.generate_body(&resource.body)?;
            generator.indent_level -= 1;
            generator.statement_break();
            generator.push("}");
        }
        GenerateMode::Arrow => {
            if bindings.is_empty() {
                generator.push("(ctx) => ");
            } else {
                generator.push(&format!("({{ {} }}) => ", bindings));
            }
            generator.generate_body(&resource.body)?;
        }
    }

    tracing::trace!(mode = %options.mode, len = generator.code.len(), "generated message code");

    Ok(GenerateResult {
        map: generator.map.as_ref().map(SourceMapGenerator::to_source_map),
        code: generator.code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{LinkedKey, Named, Parser, ParserOptions, Text};
    use crate::error::{CompileErrorCodes, Diagnostics};
    use crate::transformer::transform;
    use rstest::rstest;

    fn resource(source: &str) -> Resource {
        let mut resource = Parser::new(ParserOptions::default(), Diagnostics::default())
            .parse(source)
            .unwrap();
        transform(&mut resource);
        resource
    }

    #[rstest]
    #[case::text(
        "hello",
        "function __msg__ (ctx) {\n  const { normalize: _normalize } = ctx\n  return _normalize([\n    \"hello\"\n  ])\n}"
    )]
    #[case::named(
        "hi {name} !",
        "function __msg__ (ctx) {\n  const { normalize: _normalize, interpolate: _interpolate, named: _named } = ctx\n  return _normalize([\n    \"hi \", _interpolate(_named(\"name\")), \" !\"\n  ])\n}"
    )]
    #[case::plural(
        "no apples | one apple",
        "function __msg__ (ctx) {\n  const { normalize: _normalize, plural: _plural } = ctx\n  return _plural([\n    _normalize([\n      \"no apples\"\n    ]), _normalize([\n      \"one apple\"\n    ])\n  ])\n}"
    )]
    fn test_generate_block(#[case] source: &str, #[case] expected: &str) {
        let result = generate(&resource(source), &GenerateOptions::default()).unwrap();
        assert_eq!(result.code, expected);
        assert!(result.map.is_none());
    }

    #[rstest]
    #[case::list("{0}", "({ normalize: _normalize, interpolate: _interpolate, list: _list }) => _normalize([_interpolate(_list(0))])")]
    #[case::linked("@.upper:foo", "({ normalize: _normalize, linked: _linked }) => _normalize([_linked(\"foo\", \"upper\")])")]
    #[case::linked_named("@:{key}", "({ normalize: _normalize, interpolate: _interpolate, named: _named, linked: _linked }) => _normalize([_linked(_interpolate(_named(\"key\")))])")]
    #[case::literal("{'a\\'b'}", "({ normalize: _normalize }) => _normalize([\"a'b\"])")]
    fn test_generate_arrow(#[case] source: &str, #[case] expected: &str) {
        let options = GenerateOptions {
            mode: GenerateMode::Arrow,
            ..Default::default()
        };
        assert_eq!(generate(&resource(source), &options).unwrap().code, expected);
    }

    #[test]
    fn test_generate_without_helpers() {
        let resource = Resource::new(Node::Message(Message::new(vec![Node::Text(Text::new("a"))])));
        let options = GenerateOptions {
            mode: GenerateMode::Arrow,
            ..Default::default()
        };
        assert_eq!(generate(&resource, &options).unwrap().code, "(ctx) => _normalize([\"a\"])");
    }

    #[test]
    fn test_generate_block_with_custom_break() {
        let options = GenerateOptions {
            break_line_code: Some(";".to_string()),
            need_indent: Some(false),
            ..Default::default()
        };
        assert_eq!(
            generate(&resource("hi"), &options).unwrap().code,
            "function __msg__ (ctx) {;const { normalize: _normalize } = ctx;return _normalize([\"hi\"]);}"
        );
    }

    #[test]
    fn test_generate_static_message() {
        let mut message = Message::new(vec![
            Node::Text(Text { value: None, location: None }),
            Node::Text(Text { value: None, location: None }),
        ]);
        message.static_text = Some(StaticText::Full("hello world".to_string()));
        let resource = Resource::new(Node::Message(message));
        let options = GenerateOptions {
            mode: GenerateMode::Arrow,
            ..Default::default()
        };
        assert_eq!(
            generate(&resource, &options).unwrap().code,
            "(ctx) => _normalize([\"hello world\"])"
        );
    }

    #[rstest]
    #[case::nested_message(Node::Message(Message::new(vec![Node::Message(Message::new(vec![]))])))]
    #[case::resource_body(Node::Resource(Resource::new(Node::Message(Message::new(vec![])))))]
    #[case::linked_to_message(Node::Message(Message::new(vec![Node::Linked(Linked::new(Node::Message(Message::new(vec![])), None))])))]
    fn test_generate_unhandled(#[case] body: Node) {
        let err = generate(&Resource::new(body), &GenerateOptions::default()).unwrap_err();
        assert_eq!(err.code(), CompileErrorCodes::UNHANDLED_CODEGEN_NODE_TYPE);
        assert_eq!(err.domain, ErrorDomain::Generator);
    }

    #[test]
    fn test_generate_source_map() {
        let options = GenerateOptions {
            mode: GenerateMode::Arrow,
            source_map: true,
            ..Default::default()
        };
        let result = generate(&resource("hi {name}"), &options).unwrap();
        let map = result.map.unwrap();

        assert_eq!(map.file, DEFAULT_FILENAME);
        assert_eq!(map.sources, vec![DEFAULT_FILENAME.to_string()]);
        assert_eq!(map.sources_content, vec![Some("hi {name}".to_string())]);
        assert_eq!(map.names, vec!["name".to_string()]);
        assert!(!map.mappings.is_empty());
        assert!(!map.mappings.contains(';'));
    }

    #[test]
    fn test_generate_source_map_names_linked() {
        let options = GenerateOptions {
            source_map: true,
            filename: Some("greeting.intl".to_string()),
            ..Default::default()
        };
        let map = generate(&resource("@.upper:name"), &options).unwrap().map.unwrap();

        assert_eq!(map.file, "greeting.intl");
        assert_eq!(map.names, vec!["name".to_string(), "upper".to_string()]);
    }

    #[test]
    fn test_generate_unlocated_nodes_have_no_mappings() {
        let resource = Resource::new(Node::Message(Message::new(vec![
            Node::Named(Named::new("a")),
            Node::Linked(Linked::new(Node::LinkedKey(LinkedKey::new("b")), None)),
        ])));
        let options = GenerateOptions {
            source_map: true,
            ..Default::default()
        };
        let map = generate(&resource, &options).unwrap().map.unwrap();
        assert!(map.names.is_empty());
        assert_eq!(map.mappings, "");
    }

    #[rstest]
    #[case::block("block", GenerateMode::Block)]
    #[case::normal("normal", GenerateMode::Block)]
    #[case::arrow("arrow", GenerateMode::Arrow)]
    fn test_mode_from_str(#[case] input: &str, #[case] expected: GenerateMode) {
        assert_eq!(input.parse::<GenerateMode>().unwrap(), expected);
    }
}
