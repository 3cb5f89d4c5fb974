use crate::harness::BreadcrumbPolicy;
use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexSet;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_TEST_SUFFIX: &str = "-test.ts";
const DEFAULT_FIXTURE_SUFFIX: &str = ".spec.yml";
const DEFAULT_SCHEMA_FILE: &str = "schemas.yml";
const DEFAULT_EXCLUDES: &[&str] = &["validation-test.ts"];

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub schema_file: PathBuf,
    pub prelude_file: Option<PathBuf>,
    pub test_suffix: String,
    pub fixture_suffix: String,
    pub exclude: Vec<String>,
    pub breadcrumbs: BreadcrumbPolicy,
}

impl HarvestConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            input_dir: cli_input_dir,
            output_dir: cli_output_dir,
            schema_file: cli_schema_file,
            prelude: cli_prelude,
            test_suffix: cli_test_suffix,
            fixture_suffix: cli_fixture_suffix,
            exclude: cli_exclude,
            breadcrumbs: cli_breadcrumbs,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            input_dir: file_input_dir,
            output_dir: file_output_dir,
            schema_file: file_schema_file,
            prelude: file_prelude,
            test_suffix: file_test_suffix,
            fixture_suffix: file_fixture_suffix,
            exclude: file_exclude,
            breadcrumbs: file_breadcrumbs,
        } = file_config;

        let input_dir = cli_input_dir
            .or(file_input_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let output_dir = cli_output_dir
            .or(file_output_dir)
            .unwrap_or_else(|| input_dir.clone());

        let schema_file = cli_schema_file
            .or(file_schema_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_FILE));
        let schema_file = if schema_file.is_absolute() {
            schema_file
        } else {
            output_dir.join(schema_file)
        };

        let prelude_file = cli_prelude.or(file_prelude);

        let test_suffix = cli_test_suffix
            .or(file_test_suffix)
            .unwrap_or_else(|| DEFAULT_TEST_SUFFIX.to_string());
        let fixture_suffix = cli_fixture_suffix
            .or(file_fixture_suffix)
            .unwrap_or_else(|| DEFAULT_FIXTURE_SUFFIX.to_string());

        let exclude: Vec<String> = cli_exclude
            .or(file_exclude)
            .unwrap_or_else(|| {
                DEFAULT_EXCLUDES
                    .iter()
                    .map(|pattern| (*pattern).to_string())
                    .collect()
            })
            .into_iter()
            .map(|pattern| pattern.trim().to_string())
            .filter(|pattern| !pattern.is_empty())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let breadcrumbs = cli_breadcrumbs.or(file_breadcrumbs).unwrap_or_default();

        let config = Self {
            input_dir,
            output_dir,
            schema_file,
            prelude_file,
            test_suffix,
            fixture_suffix,
            exclude,
            breadcrumbs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks what can be checked before touching the corpus.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.test_suffix.is_empty(),
            "test suffix must not be empty"
        );
        anyhow::ensure!(
            !self.fixture_suffix.is_empty(),
            "fixture suffix must not be empty"
        );
        anyhow::ensure!(
            self.test_suffix != self.fixture_suffix,
            "fixture suffix {:?} would overwrite the test sources",
            self.fixture_suffix
        );
        Ok(())
    }

    pub fn ensure_input_dir(&self) -> Result<()> {
        anyhow::ensure!(
            self.input_dir.exists(),
            "input directory {:?} does not exist",
            self.input_dir
        );
        anyhow::ensure!(
            self.input_dir.is_dir(),
            "input directory {:?} is not a directory",
            self.input_dir
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "fixture-harvest",
    about = "Harvest GraphQL validation fixtures from test sources",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "FIXTURE_HARVEST_INPUT",
        value_name = "DIR",
        help = "Directory containing the validation test sources"
    )]
    pub input_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "FIXTURE_HARVEST_OUTPUT",
        value_name = "DIR",
        help = "Directory fixture documents are written to (defaults to the input directory)"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "FIXTURE_HARVEST_SCHEMA_FILE",
        value_name = "FILE",
        help = "Schema document path, relative to the output directory"
    )]
    pub schema_file: Option<PathBuf>,

    #[arg(
        long,
        env = "FIXTURE_HARVEST_PRELUDE",
        value_name = "FILE",
        help = "Also write the prelude SDL to this path"
    )]
    pub prelude: Option<PathBuf>,

    #[arg(
        long,
        env = "FIXTURE_HARVEST_TEST_SUFFIX",
        value_name = "SUFFIX",
        allow_hyphen_values = true,
        help = "File name suffix of test sources"
    )]
    pub test_suffix: Option<String>,

    #[arg(
        long,
        env = "FIXTURE_HARVEST_FIXTURE_SUFFIX",
        value_name = "SUFFIX",
        help = "Suffix replacing the test suffix in fixture file names"
    )]
    pub fixture_suffix: Option<String>,

    #[arg(
        long,
        env = "FIXTURE_HARVEST_EXCLUDE",
        value_name = "GLOB",
        value_delimiter = ',',
        help = "Comma-separated file name globs to skip"
    )]
    pub exclude: Option<Vec<String>>,

    #[arg(
        long,
        env = "FIXTURE_HARVEST_BREADCRUMBS",
        value_enum,
        value_name = "POLICY",
        help = "How block names become fixture names"
    )]
    pub breadcrumbs: Option<BreadcrumbPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    schema_file: Option<PathBuf>,
    prelude: Option<PathBuf>,
    test_suffix: Option<String>,
    fixture_suffix: Option<String>,
    exclude: Option<Vec<String>>,
    breadcrumbs: Option<BreadcrumbPolicy>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
