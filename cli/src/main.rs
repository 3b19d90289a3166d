mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{fetch, link, postcodes, small_areas};

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    match &cli.command {
        Commands::Fetch => fetch::run(&cli),
        Commands::Postcodes(args) => postcodes::run(&cli, args),
        Commands::SmallAreas(args) => small_areas::run(&cli, args),
        Commands::Link(args) => link::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
