use anyhow::Result;
use cli::Cli;
use logger::init_logging;

mod cli;
mod compress;
mod config;
mod logger;
mod version;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let config = cli.config()?;
    init_logging(&config)?;

    cli.run(&config)
}
