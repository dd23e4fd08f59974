//! `lingo-compiler` compiles lingo message sources into procedure source text, or into an
//! optimized AST for direct interpretation.
//!
//! ## Examples
//!
//! ```rs
//! use lingo_compiler::{compile, CompileOptions};
//!
//! let result = compile("hi {name} !", CompileOptions::default()).unwrap();
//! assert!(result.code.starts_with("function __msg__ (ctx) {"));
//!
//! // Keep the AST for interpretation
//! let result = compile("hello", CompileOptions::jit()).unwrap();
//! assert!(result.code.is_empty());
//! ```
pub mod ast;
mod error;
mod generator;
mod minifier;
mod optimizer;
mod options;
mod range;
mod scanner;
mod tokenizer;
mod transformer;

pub use ast::{
    CacheKeyHandler, Helper, Linked, LinkedKey, LinkedModifier, List, Literal, Message, Named, Node, NodeKind, Parser,
    ParserOptions, Plural, Resource, StaticText, Text, decode_escapes,
};
pub use error::{
    CompileError, CompileErrorCodes, CompileErrorKind, CompileWarn, CompileWarnCodes, CompileWarnKind, Diagnostics,
    ErrorDomain, ErrorHandler, WarnHandler,
};
pub use generator::{
    DEFAULT_FILENAME, GenerateMode, GenerateOptions, GenerateResult, SourceMap, SourceMapGenerator, generate,
};
pub use minifier::{MinifiedNode, minify};
pub use optimizer::{Optimizer, optimize};
pub use options::CompileOptions;
pub use range::{Position, SourceLocation};
pub use scanner::Scanner;
pub use tokenizer::token::{Token, TokenKind};
pub use tokenizer::{TokenizeContext, Tokenizer, TokenizerOptions, tokenize};
pub use transformer::transform;

/// Output of [`compile`].
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CompileResult {
    /// Procedure source text; empty in `jit` mode.
    pub code: String,
    pub ast: Resource,
    pub map: Option<SourceMap>,
    /// Present in `jit` mode with `minify`.
    pub minified: Option<MinifiedNode>,
}

/// Parses `source` and either generates procedure source text or, with `jit`, returns the
/// optimized AST.
///
/// Syntax errors go to `on_error` when one is set; otherwise the first one is returned.
/// Generator and minifier errors are always returned.
pub fn compile(source: &str, options: CompileOptions<'_>) -> Result<CompileResult, CompileError> {
    let generate_options = options.generate_options();
    let CompileOptions {
        location,
        jit,
        minify: minify_ast,
        optimize: optimize_ast,
        on_error,
        on_warn,
        on_cache_key,
        ..
    } = options;

    tracing::trace!(len = source.len(), jit, "compiling message");

    let mut ast = Parser::new(
        ParserOptions { location, on_cache_key },
        Diagnostics::new(on_error, on_warn),
    )
    .parse(source)?;

    if jit {
        if optimize_ast {
            optimize(&mut ast);
        }
        let minified = if minify_ast { Some(minify(&ast)?) } else { None };

        return Ok(CompileResult {
            code: String::new(),
            ast,
            map: None,
            minified,
        });
    }

    transform(&mut ast);
    let GenerateResult { code, map } = generate(&ast, &generate_options)?;

    Ok(CompileResult {
        code,
        ast,
        map,
        minified: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_compile_block() {
        let result = compile("hi {name}", CompileOptions::default()).unwrap();
        assert!(result.code.starts_with("function __msg__ (ctx) {"));
        assert_eq!(result.ast.helpers, vec![Helper::Normalize, Helper::Interpolate, Helper::Named]);
        assert!(result.map.is_none());
        assert!(result.minified.is_none());
    }

    #[test]
    fn test_compile_jit_optimizes_and_minifies() {
        let options = CompileOptions {
            minify: true,
            ..CompileOptions::jit()
        };
        let result = compile("hello", options).unwrap();

        assert_eq!(result.code, "");
        assert!(result.ast.helpers.is_empty());
        assert_eq!(
            result.ast.messages()[0].static_text,
            Some(StaticText::Full("hello".to_string()))
        );
        assert!(result.minified.is_some());
    }

    #[test]
    fn test_compile_jit_without_optimize() {
        let options = CompileOptions {
            optimize: false,
            ..CompileOptions::jit()
        };
        let result = compile("hello", options).unwrap();
        assert!(result.ast.messages()[0].static_text.is_none());
    }

    #[test]
    fn test_compile_collects_errors() {
        let errors = RefCell::new(Vec::new());
        let result = compile(
            "hi {name",
            CompileOptions::default().with_on_error(|error| errors.borrow_mut().push(error.code())),
        );

        assert!(result.is_ok());
        assert_eq!(*errors.borrow(), vec![CompileErrorCodes::UNTERMINATED_CLOSING_BRACE]);
    }

    #[test]
    fn test_compile_aborts_without_handler() {
        let err = compile("hi {name", CompileOptions::default()).unwrap_err();
        assert_eq!(err.code(), CompileErrorCodes::UNTERMINATED_CLOSING_BRACE);
        assert_eq!(err.domain, ErrorDomain::Tokenizer);
    }

    #[test]
    fn test_compile_cache_key() {
        let result = compile(
            "hello",
            CompileOptions::default().with_on_cache_key(|source| format!("key:{}", source)),
        )
        .unwrap();
        assert_eq!(result.ast.cache_key.as_deref(), Some("key:hello"));
    }
}
