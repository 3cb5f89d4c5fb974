pub mod config;
pub mod emit;
pub mod error;
pub mod harness;
pub mod harvest;
pub mod logging;
pub mod modules;
pub mod normalize;
pub mod prelude;
pub mod schema;
pub mod script;

pub use config::{CliArgs, HarvestConfig};
pub use error::{ErrorCode, HarvestError};
pub use harness::{BreadcrumbPolicy, FixtureRecord};
pub use harvest::{FileHarvest, HarvestSummary, Harvester};
pub use logging::{LoggingConfig, init_logging};
pub use normalize::normalize_whitespace;
pub use schema::{SchemaDef, SchemaLibrary, SdlSchemaLibrary};

use anyhow::Result;

/// Harvests every test source under `config.input_dir` with the default
/// SDL schema library.
pub fn run_harvest(config: HarvestConfig) -> Result<HarvestSummary> {
    let harvester = Harvester::new(config)?;
    let summary = harvester.run()?;
    tracing::info!(
        files = summary.files.len(),
        fixtures = summary.fixtures,
        dropped = summary.dropped_records,
        schemas = summary.schemas,
        failed_schemas = summary.failed_schemas,
        "harvest complete"
    );
    Ok(summary)
}
