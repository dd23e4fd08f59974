#![no_main]

use arbitrary::Arbitrary;
use itertools::Itertools;
use libfuzzer_sys::fuzz_target;
use lingo_compiler::{CompileOptions, GenerateMode, compile};
use lingo_core::{MessageContext, compile_source};

#[derive(Debug, Clone, Arbitrary)]
enum Part {
    Text(String),
    Named(String),
    List(u8),
    Literal(String),
    Linked(Option<String>, String),
    Modulo(String),
    Raw(String),
}

#[derive(Debug, Clone, Arbitrary)]
struct ArbitraryMessage {
    cases: Vec<Vec<Part>>,
}

impl ArbitraryMessage {
    fn to_source(&self) -> String {
        self.cases
            .iter()
            .map(|parts| {
                parts
                    .iter()
                    .map(|part| match part {
                        Part::Text(text) => text.clone(),
                        Part::Named(name) => format!("{{{}}}", name),
                        Part::List(index) => format!("{{{}}}", index),
                        Part::Literal(text) => format!("{{'{}'}}", text),
                        Part::Linked(Some(modifier), key) => format!("@.{}:{}", modifier, key),
                        Part::Linked(None, key) => format!("@:{}", key),
                        Part::Modulo(name) => format!("%{{{}}}", name),
                        Part::Raw(raw) => raw.clone(),
                    })
                    .join("")
            })
            .join(" | ")
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Context {
    raw_source: Option<String>,
    generated: Option<ArbitraryMessage>,
    arrow: bool,
    plural: Option<i64>,
}

fuzz_target!(|context: Context| {
    let source = match (&context.raw_source, &context.generated) {
        (Some(raw), _) => raw.clone(),
        (_, Some(generated)) => generated.to_source(),
        _ => "".to_string(),
    };

    let mode = if context.arrow { GenerateMode::Arrow } else { GenerateMode::Block };
    let _ = compile(
        &source,
        CompileOptions {
            mode,
            source_map: true,
            ..Default::default()
        }
        .with_on_error(|_| {}),
    );
    let _ = compile(
        &source,
        CompileOptions {
            minify: true,
            ..CompileOptions::jit()
        }
        .with_on_error(|_| {}),
    );

    if let Ok(message) = compile_source(&source) {
        let list = vec![serde_json::Value::from("a")];
        let _ = message(&MessageContext::new("en").with_list(&list).with_plural(context.plural));
    }
});
