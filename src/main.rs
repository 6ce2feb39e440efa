use clap::Parser;
use sparks::config::Cli;
use sparks::{logging, repl};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging()?;
    repl::start(&cli)
}
