use std::sync::Arc;

use lingo_compiler::{
    CompileError, CompileErrorKind, CompileOptions, ErrorDomain, Linked, Message, Node, Resource, StaticText,
};
use smol_str::SmolStr;

use crate::context::MessageContext;

/// A compiled message, shareable across threads and cache entries.
pub type MessageFunction = Arc<dyn Fn(&MessageContext<'_>) -> String + Send + Sync>;

type CompiledPart = Box<dyn Fn(&MessageContext<'_>) -> String + Send + Sync>;

/// Compiles message source on the interpreted path.
///
/// Syntax errors abort on the first diagnostic; warnings are logged by the compiler.
pub fn compile_source(source: &str) -> Result<MessageFunction, CompileError> {
    let result = lingo_compiler::compile(source, CompileOptions::jit()).map_err(|err| match err.source_code {
        Some(_) => err,
        None => err.with_source_code(source),
    })?;

    compile_resource(&result.ast)
}

/// Turns an (optionally optimized) AST into a closure tree.
pub fn compile_resource(resource: &Resource) -> Result<MessageFunction, CompileError> {
    match resource.body.as_ref() {
        Node::Plural(plural) => {
            let cases = plural
                .cases
                .iter()
                .map(compile_message)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Arc::new(move |ctx: &MessageContext<'_>| {
                cases
                    .get(ctx.plural(cases.len()))
                    .map_or_else(String::new, |case| case(ctx))
            }))
        }
        Node::Message(message) => {
            let message = compile_message(message)?;
            Ok(Arc::new(move |ctx: &MessageContext<'_>| message(ctx)))
        }
        node => Err(unhandled(node)),
    }
}

fn compile_message(message: &Message) -> Result<CompiledPart, CompileError> {
    match &message.static_text {
        Some(StaticText::Full(text)) => {
            let text = text.clone();
            Ok(Box::new(move |ctx: &MessageContext<'_>| ctx.normalize(vec![text.clone()])))
        }
        Some(StaticText::Prefix { text, parts }) => {
            let prefix = text.clone();
            let rest = message
                .items
                .iter()
                .skip(*parts)
                .map(compile_item)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Box::new(move |ctx: &MessageContext<'_>| {
                let mut parts = Vec::with_capacity(rest.len() + 1);
                parts.push(prefix.clone());
                parts.extend(rest.iter().map(|part| part(ctx)));
                ctx.normalize(parts)
            }))
        }
        None => {
            let items = message.items.iter().map(compile_item).collect::<Result<Vec<_>, _>>()?;
            Ok(Box::new(move |ctx: &MessageContext<'_>| {
                ctx.normalize(items.iter().map(|item| item(ctx)).collect())
            }))
        }
    }
}

fn compile_item(node: &Node) -> Result<CompiledPart, CompileError> {
    match node {
        Node::Text(_) | Node::Literal(_) => {
            let value = node.static_value().unwrap_or_default().to_string();
            Ok(Box::new(move |_: &MessageContext<'_>| value.clone()))
        }
        Node::Named(named) => {
            let key = named.key.clone();
            Ok(Box::new(move |ctx: &MessageContext<'_>| ctx.interpolate(ctx.named(&key))))
        }
        Node::List(list) => {
            let index = list.index;
            Ok(Box::new(move |ctx: &MessageContext<'_>| ctx.interpolate(ctx.list(index))))
        }
        Node::Linked(linked) => compile_linked(linked),
        node => Err(unhandled(node)),
    }
}

fn compile_linked(linked: &Linked) -> Result<CompiledPart, CompileError> {
    let modifier: Option<SmolStr> = linked.modifier.as_ref().map(|modifier| modifier.value.clone());

    match linked.key.as_ref() {
        // A quoted target is the text itself.
        Node::Literal(literal) => {
            let value = literal.value.clone().unwrap_or_default();
            Ok(Box::new(move |ctx: &MessageContext<'_>| {
                ctx.modify(value.clone(), modifier.as_deref())
            }))
        }
        Node::LinkedKey(key) => {
            let key = key.value.clone();
            Ok(Box::new(move |ctx: &MessageContext<'_>| ctx.linked(&key, modifier.as_deref())))
        }
        Node::Named(named) => {
            let name = named.key.clone();
            Ok(Box::new(move |ctx: &MessageContext<'_>| {
                let key = ctx.interpolate(ctx.named(&name));
                ctx.linked(&key, modifier.as_deref())
            }))
        }
        Node::List(list) => {
            let index = list.index;
            Ok(Box::new(move |ctx: &MessageContext<'_>| {
                let key = ctx.interpolate(ctx.list(index));
                ctx.linked(&key, modifier.as_deref())
            }))
        }
        node => Err(unhandled(node)),
    }
}

fn unhandled(node: &Node) -> CompileError {
    CompileError::new(
        CompileErrorKind::UnhandledCodegenNodeType(node.kind().to_string()),
        node.location().cloned(),
    )
    .with_domain(ErrorDomain::Compiler)
}
