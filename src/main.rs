use clap::Parser;
use gql_fixture_harvest::{CliArgs, HarvestConfig, LoggingConfig, init_logging, run_harvest};

fn main() -> anyhow::Result<()> {
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(logging_config)?;

    let cli = CliArgs::parse();
    let config = HarvestConfig::from_args(cli)?;

    run_harvest(config)?;
    Ok(())
}
