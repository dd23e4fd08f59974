use lingo_compiler::CompileError;
use miette::Diagnostic;

/// Configuration mistakes on the runtime side.
///
/// Missing keys and fallbacks are reported as events, never as errors.
#[derive(PartialEq, Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Invalid key path '{0}'")]
    InvalidPath(String),
    #[error("Cannot set '{path}': '{segment}' is not an object")]
    NotAnObject { path: String, segment: String },
    #[error("Invalid message bundle: {0}")]
    InvalidBundle(String),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self {
            Error::InvalidPath(_) => Some(Box::new("lingo::InvalidPath")),
            Error::NotAnObject { .. } => Some(Box::new("lingo::NotAnObject")),
            Error::InvalidBundle(_) => Some(Box::new("lingo::InvalidBundle")),
            Error::Compile(err) => Diagnostic::code(err),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self {
            Error::InvalidPath(_) => Some(Box::new("Key paths look like `a.b`, `a[0]` or `a['b c']`")),
            Error::NotAnObject { .. } => Some(Box::new("Replace the parent message with an object first")),
            Error::InvalidBundle(_) => Some(Box::new("Minified bundles must be produced by `lingo compile --jit --minify`")),
            Error::Compile(err) => err.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Error::Compile(err) => err.source_code(),
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        match self {
            Error::Compile(err) => err.labels(),
            _ => None,
        }
    }
}
