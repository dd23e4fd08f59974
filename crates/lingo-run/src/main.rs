use clap::Parser;

fn main() -> miette::Result<()> {
    lingo_run::Cli::parse().run()
}
