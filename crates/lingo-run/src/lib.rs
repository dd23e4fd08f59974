//! Command line front-end for the lingo message compiler and resolver.
mod cli;
pub mod config;
pub mod loader;

pub use cli::Cli;
