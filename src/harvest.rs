//! Batch driver: discover test sources, evaluate each one, write its
//! fixture document, then write the shared schema document.

use crate::config::HarvestConfig;
use crate::emit::{fixture_file_name, render_fixtures, render_schemas};
use crate::error::HarvestError;
use crate::harness::{FixtureRecord, HarvestContext, fakes};
use crate::logging::file_span;
use crate::modules::{ModuleResolver, ModuleTable, ProjectResolver};
use crate::prelude::render_prelude;
use crate::schema::{SchemaLibrary, SdlSchemaLibrary};
use crate::script;
use anyhow::{Context, Result, anyhow};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use walkdir::WalkDir;

/// Selects test sources by file name.
pub struct SourceFilter {
    suffix: String,
    exclude: GlobSet,
}

impl SourceFilter {
    pub fn new(suffix: impl Into<String>, exclude: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude {
            builder.add(
                Glob::new(pattern)
                    .map_err(|err| anyhow!("invalid glob pattern {pattern}: {err}"))?,
            );
        }
        Ok(Self {
            suffix: suffix.into(),
            exclude: builder.build()?,
        })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.suffix) && !self.exclude.is_match(file_name)
    }
}

/// Outcome of one test source.
#[derive(Debug, Clone, Serialize)]
pub struct FileHarvest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub written: usize,
    pub dropped: usize,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct HarvestSummary {
    pub files: Vec<FileHarvest>,
    pub fixtures: usize,
    pub dropped_records: usize,
    pub schemas: usize,
    pub failed_schemas: usize,
    pub schema_document: PathBuf,
    pub prelude: Option<PathBuf>,
}

pub struct Harvester {
    config: HarvestConfig,
    ctx: Rc<HarvestContext>,
    modules: ModuleTable,
    filter: SourceFilter,
}

impl Harvester {
    pub fn new(config: HarvestConfig) -> Result<Self> {
        Self::with_library(config, Rc::new(SdlSchemaLibrary))
    }

    pub fn with_library(config: HarvestConfig, library: Rc<dyn SchemaLibrary>) -> Result<Self> {
        let fallback = Box::new(ProjectResolver::new(Rc::clone(&library)));
        Self::with_resolver(config, library, fallback)
    }

    /// Full injection point: schema collaborator plus the resolver consulted
    /// for every import the fake modules do not cover.
    pub fn with_resolver(
        config: HarvestConfig,
        library: Rc<dyn SchemaLibrary>,
        fallback: Box<dyn ModuleResolver>,
    ) -> Result<Self> {
        config.validate()?;
        let filter = SourceFilter::new(&config.test_suffix, &config.exclude)?;
        let ctx = HarvestContext::new(config.breadcrumbs, library);
        let resolver = fallback.name().to_string();
        let modules = fakes::install(ModuleTable::new(fallback), &ctx)?;
        tracing::debug!(
            substituted = ?modules.substituted().collect::<Vec<_>>(),
            resolver = %resolver,
            "module table ready"
        );
        Ok(Self {
            config,
            ctx,
            modules,
            filter,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn context(&self) -> &Rc<HarvestContext> {
        &self.ctx
    }

    /// Matching test sources directly inside the input directory, sorted by
    /// file name.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut sources = Vec::new();
        for entry in WalkDir::new(&self.config.input_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry
                .with_context(|| format!("failed to list {:?}", self.config.input_dir))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                tracing::debug!(path = ?entry.path(), "skipping non UTF-8 file name");
                continue;
            };
            if self.filter.matches(name) {
                sources.push(entry.path().to_path_buf());
            }
        }
        Ok(sources)
    }

    /// Evaluates one source and returns the fixtures it recorded.
    pub fn harvest_source(&self, file_name: &str, source: &str) -> Result<Vec<FixtureRecord>> {
        let span = file_span(file_name);
        let _entered = span.enter();

        self.ctx.begin_file(file_name);
        script::evaluate(source, file_name, &self.modules)?;
        let records = self.ctx.take_records();
        tracing::debug!(fixtures = records.len(), "evaluated test source");
        Ok(records)
    }

    /// Harvests `path` and writes its fixture document.
    pub fn harvest_file(&self, path: &Path) -> Result<FileHarvest> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("invalid test source path {:?}", path))?;
        let source = fs::read_to_string(path).map_err(|err| HarvestError::io(path, err))?;

        let records = self.harvest_source(file_name, &source)?;
        let document = render_fixtures(file_name, &records);

        let output = self.config.output_dir.join(fixture_file_name(
            file_name,
            &self.config.test_suffix,
            &self.config.fixture_suffix,
        ));
        write_document(&output, &document.yaml)?;

        tracing::info!(
            file = file_name,
            output = %output.display(),
            fixtures = document.written,
            dropped = document.dropped.len(),
            "wrote fixture document"
        );
        Ok(FileHarvest {
            source: path.to_path_buf(),
            output,
            written: document.written,
            dropped: document.dropped.len(),
        })
    }

    /// Prints every registered schema and writes the schema document.
    /// Returns `(schemas, failed)`.
    pub fn write_schemas(&self) -> Result<(usize, usize)> {
        let (slots, failures) = {
            let registry = self.ctx.schemas();
            registry.canonicalize(self.ctx.library().as_ref())
        };
        let yaml = render_schemas(&slots);
        write_document(&self.config.schema_file, &yaml)?;

        let schemas = self.ctx.schemas().len();
        tracing::info!(
            output = %self.config.schema_file.display(),
            schemas,
            failed = failures.len(),
            "wrote schema document"
        );
        Ok((schemas, failures.len()))
    }

    pub fn write_prelude(&self, path: &Path) -> Result<()> {
        let prelude = render_prelude(self.ctx.library().as_ref());
        write_document(path, &prelude)?;
        tracing::info!(output = %path.display(), "wrote prelude");
        Ok(())
    }

    pub fn run(&self) -> Result<HarvestSummary> {
        self.config.ensure_input_dir()?;
        fs::create_dir_all(&self.config.output_dir)
            .map_err(|err| HarvestError::io(&self.config.output_dir, err))?;

        let sources = self.discover()?;
        tracing::info!(
            input = %self.config.input_dir.display(),
            sources = sources.len(),
            breadcrumbs = %self.ctx.policy(),
            "harvesting validation fixtures"
        );

        let mut summary = HarvestSummary {
            schema_document: self.config.schema_file.clone(),
            ..HarvestSummary::default()
        };
        for source in &sources {
            let file = self.harvest_file(source).map_err(|err| {
                if let Some(failure) = err.downcast_ref::<HarvestError>() {
                    let code = failure.code();
                    tracing::error!(
                        source = %source.display(),
                        code = %code,
                        category = code.category(),
                        fatal = code.is_fatal(),
                        error = %failure,
                        "harvest aborted"
                    );
                }
                err.context(format!("failed to harvest {}", source.display()))
            })?;
            summary.fixtures += file.written;
            summary.dropped_records += file.dropped;
            summary.files.push(file);
        }

        let (schemas, failed) = self.write_schemas()?;
        summary.schemas = schemas;
        summary.failed_schemas = failed;

        if let Some(path) = &self.config.prelude_file {
            self.write_prelude(path)?;
            summary.prelude = Some(path.clone());
        }
        Ok(summary)
    }
}

fn write_document(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| HarvestError::io(parent, err))?;
    }
    fs::write(path, contents).map_err(|err| HarvestError::io(path, err))?;
    Ok(())
}
