use brrtlite::cli::{run_cli, Cli};
use brrtlite::logging::{self, LogConfig};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&LogConfig::from_env())?;
    run_cli(cli)
}
