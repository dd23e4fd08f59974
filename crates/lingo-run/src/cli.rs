use clap::{Parser, Subcommand};
use colored::Colorize;
use lingo_compiler::{CompileError, CompileOptions, CompileResult, CompileWarn, GenerateMode, Node, compile};
use lingo_core::{
    FallbackLocale, FallbackStrategy, MessageContext, ResolveOptions, Resolver, ResolverEvent, compile_source,
};
use miette::IntoDiagnostic;
use miette::miette;
use serde_json::{Map, Value};
use std::io::{self, BufWriter, Read, Write};
use std::{fs, path::PathBuf};

use crate::config::{self, Config, MissingPolicy, ProjectConfig};
use crate::loader::{self, MessageSource};

#[derive(Parser, Debug)]
#[command(name = "lingo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To compile a message into a procedure:\n\
    lingo compile 'hello {name}!'\n\n\
    ## To print the optimized AST:\n\
    lingo compile --jit --minify 'no apples | one apple | {count} apples'\n\n\
    ## To render a message:\n\
    lingo format --named name=lingo 'hello {name}!'\n\n\
    ## To resolve a key from locale files:\n\
    lingo resolve --messages en-US.json --messages ja-JP.yaml --locale ja-JP --fallback en-US greeting")]
#[command(
    about = "lingo compiles and resolves localized messages written in the lingo message format.",
    long_about = None
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    commands: Commands,
}

#[derive(Clone, Debug, Default, clap::ValueEnum)]
enum Mode {
    /// function __msg__ (ctx) { ... }
    #[default]
    Block,
    /// (ctx) => ...
    Arrow,
}

impl From<Mode> for GenerateMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Block => GenerateMode::Block,
            Mode::Arrow => GenerateMode::Arrow,
        }
    }
}

#[derive(Debug, clap::Args, Default)]
struct ArgumentArgs {
    /// List argument, addressed as {0}, {1}, ... (JSON values are decoded)
    #[arg(short, long = "list", value_name = "VALUE")]
    list: Vec<String>,

    /// Named argument, addressed as {key} (JSON values are decoded)
    #[arg(short, long = "named", value_name = "KEY=VALUE", value_parser = parse_named)]
    named: Vec<(String, String)>,

    /// Plural choice
    #[arg(short, long, allow_negative_numbers = true)]
    plural: Option<i64>,
}

impl ArgumentArgs {
    fn list(&self) -> Vec<Value> {
        self.list.iter().map(|value| parse_value(value)).collect()
    }

    fn named(&self) -> Map<String, Value> {
        self.named
            .iter()
            .map(|(key, value)| (key.clone(), parse_value(value)))
            .collect()
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile a message into procedure source text or an AST
    Compile {
        /// Read the message from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Shape of the generated procedure
        #[arg(short, long, value_enum, default_value_t)]
        mode: Mode,
        /// Print the optimized AST instead of generating code
        #[arg(long)]
        jit: bool,
        /// With --jit, print the minified AST
        #[arg(long)]
        minify: bool,
        /// With --jit, keep static text unfolded
        #[arg(long)]
        no_optimize: bool,
        /// Print the generated code together with its source map
        #[arg(long)]
        source_map: bool,
        /// Drop source locations from nodes
        #[arg(long)]
        no_location: bool,
        /// Print the transformed AST after generating
        #[arg(long)]
        ast: bool,
        /// Source name recorded in the source map
        #[arg(long)]
        filename: Option<String>,
        /// Message source; read from stdin when omitted
        source: Option<String>,
    },
    /// Render a message with the given arguments
    Format {
        #[clap(flatten)]
        arguments: ArgumentArgs,
        /// Locale passed to the message
        #[arg(long, default_value = "en-US")]
        locale: String,
        /// Read the message from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Message source; read from stdin when omitted
        source: Option<String>,
    },
    /// Resolve a message key against locale message files
    Resolve {
        /// Locale message file (PATH or LOCALE=PATH); repeatable
        #[arg(short = 'M', long = "messages", value_name = "FILE")]
        messages: Vec<MessageSource>,
        /// Locale to resolve in
        #[arg(short = 'L', long)]
        locale: Option<String>,
        /// Fallback locales, tried in order
        #[arg(short = 'F', long = "fallback", value_name = "LOCALE")]
        fallback: Vec<String>,
        /// How fallback chains are computed
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<FallbackStrategy>,
        /// Fail instead of echoing the key when no locale defines it
        #[arg(long, conflicts_with = "missing")]
        unresolving: bool,
        /// What to print when no locale defines the key
        #[arg(long, value_enum)]
        missing: Option<MissingPolicy>,
        /// HTML-escape string arguments
        #[arg(long)]
        escape: bool,
        #[clap(flatten)]
        arguments: ArgumentArgs,
        /// Message key such as `menu.items[0]`
        key: String,
    },
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        config::init_tracing(&Config::from_env().with_verbosity(self.verbose), self.verbose > 0);

        match &self.commands {
            Commands::Compile {
                file,
                mode,
                jit,
                minify,
                no_optimize,
                source_map,
                no_location,
                ast,
                filename,
                source,
            } => {
                let source = read_source(source.as_deref(), file.as_ref())?;
                let options = CompileOptions {
                    location: !no_location,
                    jit: *jit,
                    minify: *minify,
                    optimize: !no_optimize,
                    mode: mode.clone().into(),
                    source_map: *source_map,
                    filename: filename
                        .clone()
                        .or_else(|| file.as_ref().map(|file| file.display().to_string())),
                    ..Default::default()
                };
                let result = compile_checked(&source, options)?;
                print_compile_result(&result, *ast, *source_map)
            }
            Commands::Format {
                arguments,
                locale,
                file,
                source,
            } => {
                let source = read_source(source.as_deref(), file.as_ref())?;
                compile_checked(&source, CompileOptions::jit())?;

                let message = compile_source(&source)?;
                let list = arguments.list();
                let named = arguments.named();
                let ctx = MessageContext::new(locale)
                    .with_list(&list)
                    .with_named(&named)
                    .with_plural(arguments.plural);

                print_line(&message(&ctx))
            }
            Commands::Resolve {
                messages,
                locale,
                fallback,
                strategy,
                unresolving,
                missing,
                escape,
                arguments,
                key,
            } => {
                let project = ProjectConfig::discover(&std::env::current_dir().into_diagnostic()?)?.unwrap_or_default();
                let mut options = project.resolver_options();

                if let Some(locale) = locale {
                    options.locale = locale.as_str().into();
                }
                if !fallback.is_empty() {
                    options.fallback_locale = FallbackLocale::List(fallback.clone());
                }
                if let Some(strategy) = strategy {
                    options.fallback_strategy = *strategy;
                }
                if *unresolving {
                    config::apply_missing_policy(&mut options, MissingPolicy::Unresolved);
                } else if let Some(missing) = missing {
                    config::apply_missing_policy(&mut options, *missing);
                }
                if *escape {
                    options.escape_parameter = true;
                }

                let sources = project
                    .messages
                    .iter()
                    .cloned()
                    .map(MessageSource::from)
                    .chain(messages.iter().cloned())
                    .collect::<Vec<_>>();
                if sources.is_empty() {
                    return Err(miette!("No message files given. Pass --messages or list them in lingo.toml"));
                }

                let resolver = Resolver::new(options);
                for source in &sources {
                    for (locale, tree) in loader::load_messages(source)? {
                        resolver.merge_locale_messages(locale, tree);
                    }
                }

                let events = resolver.subscribe();
                let resolve_options = ResolveOptions::new()
                    .with_list(arguments.list())
                    .with_named(arguments.named());
                let resolve_options = match arguments.plural {
                    Some(plural) => resolve_options.with_plural(plural),
                    None => resolve_options,
                };

                let resolution = resolver.translate(key, &resolve_options);
                events.try_iter().for_each(|event| log_event(&event));

                match resolution.into_option() {
                    Some(text) => print_line(&text),
                    None => Err(miette!(
                        "Message '{}' is not defined for locale '{}'",
                        key,
                        resolver.locale()
                    )),
                }
            }
        }
    }
}

fn print_compile_result(result: &CompileResult, ast: bool, source_map: bool) -> miette::Result<()> {
    let output = if let Some(minified) = &result.minified {
        serde_json::to_string_pretty(minified).into_diagnostic()?
    } else if result.code.is_empty() || ast {
        serde_json::to_string_pretty(&Node::Resource(result.ast.clone())).into_diagnostic()?
    } else if source_map {
        serde_json::to_string_pretty(&serde_json::json!({
            "code": result.code,
            "map": result.map,
        }))
        .into_diagnostic()?
    } else {
        result.code.clone()
    };

    print_line(&output)
}

/// Compiles `source` reporting every syntax error and warning to stderr.
fn compile_checked(source: &str, options: CompileOptions<'_>) -> miette::Result<CompileResult> {
    let mut errors: Vec<CompileError> = Vec::new();
    let mut warnings: Vec<CompileWarn> = Vec::new();

    let result = compile(
        source,
        options
            .with_on_error(|err| errors.push(err))
            .with_on_warn(|warn| warnings.push(warn)),
    );

    let stderr = io::stderr();
    let mut handle = BufWriter::new(stderr.lock());

    for warn in &warnings {
        let location = warn
            .location
            .as_ref()
            .map(|location| format!(" at line {}, column {}", location.start.line, location.start.column))
            .unwrap_or_default();
        writeln!(handle, "{}: {}{}", "Warning".yellow().bold(), warn, location).into_diagnostic()?;
    }

    let error_count = errors.len();
    for err in errors {
        writeln!(handle, "{:?}", miette::Report::new(err.with_source_code(source))).into_diagnostic()?;
    }
    handle.flush().into_diagnostic()?;

    let result = result.map_err(|err| miette::Report::new(err.with_source_code(source)))?;

    if error_count > 0 {
        return Err(miette!(
            "{} error{} found in message",
            error_count,
            if error_count == 1 { "" } else { "s" }
        ));
    }

    Ok(result)
}

fn read_source(source: Option<&str>, file: Option<&PathBuf>) -> miette::Result<String> {
    match (source, file) {
        (Some(_), Some(_)) => Err(miette!("Pass either a message source or --file, not both")),
        (Some(source), None) => Ok(source.to_string()),
        (None, Some(file)) => {
            if !file.exists() {
                return Err(miette!("File not found: {}", file.display()));
            }
            fs::read_to_string(file).into_diagnostic()
        }
        (None, None) => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input).into_diagnostic()?;
            Ok(input.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

fn print_line(text: &str) -> miette::Result<()> {
    let stdout = io::stdout();
    let mut handle = BufWriter::new(stdout.lock());
    writeln!(handle, "{}", text).into_diagnostic()?;
    handle.flush().into_diagnostic()
}

fn log_event(event: &ResolverEvent) {
    match event {
        ResolverEvent::FallbackUsed { key, requested, used } => {
            tracing::info!(%key, %requested, %used, "fallback locale used");
        }
        ResolverEvent::Missing { key, locale } => {
            tracing::info!(%key, %locale, "message not found");
        }
        ResolverEvent::CompileFailed {
            key,
            locale,
            code,
            message,
        } => {
            tracing::info!(%key, %locale, code, %message, "message failed to compile");
        }
    }
}

/// Decodes JSON scalars (`3`, `true`, `"x"`); anything else is taken as a string.
fn parse_value(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn parse_named(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn parse_strategy(s: &str) -> Result<FallbackStrategy, String> {
    s.parse()
}
