use std::fmt;

use crate::ast::CacheKeyHandler;
use crate::error::{ErrorHandler, WarnHandler};
use crate::generator::{GenerateMode, GenerateOptions};

/// Options for [`crate::compile`].
pub struct CompileOptions<'a> {
    /// Attach source locations to tokens and nodes.
    pub location: bool,
    /// Skip code generation and return the (optimized) AST for interpretation.
    pub jit: bool,
    /// With `jit`, also produce the minified AST.
    pub minify: bool,
    /// With `jit`, fold static text.
    pub optimize: bool,
    pub mode: GenerateMode,
    pub break_line_code: Option<String>,
    pub need_indent: Option<bool>,
    pub source_map: bool,
    pub filename: Option<String>,
    pub on_error: Option<ErrorHandler<'a>>,
    pub on_warn: Option<WarnHandler<'a>>,
    pub on_cache_key: Option<CacheKeyHandler<'a>>,
}

impl Default for CompileOptions<'_> {
    fn default() -> Self {
        Self {
            location: true,
            jit: false,
            minify: false,
            optimize: true,
            mode: GenerateMode::default(),
            break_line_code: None,
            need_indent: None,
            source_map: false,
            filename: None,
            on_error: None,
            on_warn: None,
            on_cache_key: None,
        }
    }
}

impl<'a> CompileOptions<'a> {
    pub fn jit() -> Self {
        Self {
            jit: true,
            ..Default::default()
        }
    }

    pub fn with_on_error(mut self, on_error: impl FnMut(crate::CompileError) + 'a) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    pub fn with_on_warn(mut self, on_warn: impl FnMut(crate::CompileWarn) + 'a) -> Self {
        self.on_warn = Some(Box::new(on_warn));
        self
    }

    pub fn with_on_cache_key(mut self, on_cache_key: impl Fn(&str) -> String + 'a) -> Self {
        self.on_cache_key = Some(Box::new(on_cache_key));
        self
    }

    pub(crate) fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            mode: self.mode,
            break_line_code: self.break_line_code.clone(),
            need_indent: self.need_indent,
            source_map: self.source_map,
            filename: self.filename.clone(),
        }
    }
}

impl fmt::Debug for CompileOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("location", &self.location)
            .field("jit", &self.jit)
            .field("minify", &self.minify)
            .field("optimize", &self.optimize)
            .field("mode", &self.mode)
            .field("break_line_code", &self.break_line_code)
            .field("need_indent", &self.need_indent)
            .field("source_map", &self.source_map)
            .field("filename", &self.filename)
            .field("on_error", &self.on_error.is_some())
            .field("on_warn", &self.on_warn.is_some())
            .field("on_cache_key", &self.on_cache_key.is_some())
            .finish()
    }
}
