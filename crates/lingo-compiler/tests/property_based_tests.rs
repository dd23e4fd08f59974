//! Property-based tests for the lingo compiler pipeline.

use lingo_compiler::{
    CompileError, CompileOptions, CompileWarn, Diagnostics, MinifiedNode, Node, Optimizer, Parser, ParserOptions,
    TokenKind, TokenizerOptions, compile, minify, tokenize,
};
use proptest::prelude::*;

fn collecting_parser<'a>(errors: &'a mut Vec<u16>) -> Parser<'a> {
    Parser::new(
        ParserOptions::default(),
        Diagnostics::new(
            Some(Box::new(move |error: CompileError| errors.push(error.code()))),
            Some(Box::new(|_: CompileWarn| {})),
        ),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Text without syntax characters parses into its own text
    #[test]
    fn text_parses_verbatim(source in strategies::arb_text_source()) {
        let resource = Parser::new(ParserOptions::default(), Diagnostics::default()).parse(&source)?;
        let messages = resource.messages();
        prop_assert_eq!(messages.len(), 1);

        let text: String = messages[0].items.iter().filter_map(Node::static_value).collect();
        prop_assert_eq!(text, source);
    }

    /// Tokenizing never fails with an error handler and always ends with EOF
    #[test]
    fn tokenizer_terminates(source in strategies::arb_any_source()) {
        let tokens = tokenize(
            &source,
            TokenizerOptions::default(),
            Diagnostics::new(Some(Box::new(|_: CompileError| {})), Some(Box::new(|_: CompileWarn| {}))),
        )?;

        prop_assert_eq!(tokens.last().map(|token| token.kind), Some(TokenKind::Eof));
        prop_assert_eq!(tokens.iter().filter(|token| token.kind == TokenKind::Eof).count(), 1);
    }

    /// Parsing with an error handler always yields a tree
    #[test]
    fn parser_recovers(source in strategies::arb_any_source()) {
        let mut errors = Vec::new();
        let resource = collecting_parser(&mut errors).parse(&source);
        prop_assert!(resource.is_ok());
    }

    /// Well-formed messages parse without diagnostics
    #[test]
    fn valid_messages_have_no_errors(source in strategies::arb_plural_source()) {
        let mut errors = Vec::new();
        collecting_parser(&mut errors).parse(&source)?;
        prop_assert!(errors.is_empty(), "errors for {:?}: {:?}", source, errors);
    }

    /// Folding static text a second time changes nothing
    #[test]
    fn optimizer_is_idempotent(source in strategies::arb_plural_source()) {
        let mut resource = Parser::new(ParserOptions::default(), Diagnostics::default()).parse(&source)?;
        let mut optimizer = Optimizer::new();
        optimizer.optimize(&mut resource);
        let once = resource.clone();
        optimizer.optimize(&mut resource);

        prop_assert_eq!(resource, once);
    }

    /// The minified form decodes back to the same minified form
    #[test]
    fn minified_json_decodes(source in strategies::arb_plural_source()) {
        let result = compile(&source, CompileOptions { minify: true, ..CompileOptions::jit() })?;
        let minified = result.minified.unwrap();
        let json = serde_json::to_value(&minified).unwrap();
        let decoded = MinifiedNode::from_json(&json)?;

        prop_assert_eq!(&decoded, &minified);
        prop_assert_eq!(minify(&decoded.into_resource()?)?, minified);
    }

    /// Code generation succeeds for every parsed message
    #[test]
    fn generator_accepts_parsed_messages(source in strategies::arb_plural_source()) {
        let result = compile(&source, CompileOptions::default())?;
        prop_assert!(result.code.starts_with("function __msg__ (ctx) {"), "code does not start with function header");
        prop_assert!(result.code.ends_with('}'), "code does not end with closing brace");
    }
}
