//! Orchestration of one file-import run.
//!
//! A [`Processor`] wires a reader, writer, and the optional transformer,
//! filter, validator, and importer into one synchronous, pull-based run. It
//! owns the lifecycle state machine
//! (`New → Configured → Running → {Succeeded | Failed}`), the metadata
//! bookkeeping that links imported records to their data source and data
//! set, and the rollback protocol for failed runs.
//!
//! Control flow for one run: component `do_before` hooks → pull loop over
//! the reader (transform → filter → validate → write per record) → writer
//! flush and optional bulk import of the staged file → remaining `do_after`
//! hooks → metadata linkage. Any propagating error flips the state to
//! `Failed`, rolls back every record written under this run's data source,
//! and surfaces to the caller as a single [`ImportError`].

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::error::ImportError;
use crate::importer::RecordImporter;
use crate::metadata::{DataSet, DataSource, Sample};
use crate::model::{ImportedRecord, Model};
use crate::options::ImportOptions;
use crate::reader::RecordReader;
use crate::repository::{RecordRepository, Repository};
use crate::transform::{RecordFilter, RecordTransformer};
use crate::validation::{format_errors, RecordValidator};
use crate::writer::RecordWriter;

/// Lifecycle state of a processor instance.
///
/// `Failed` is terminal: a failed processor refuses both `run` and
/// `configure`, and a fresh instance must be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    New,
    Configured,
    Running,
    Succeeded,
    Failed,
}

/// Outcome report for one run. Returned on success and on suppressed
/// named-invalid failures; inspect [`state`](RunSummary::state) to tell the
/// two apart.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: RunState,
    pub records_written: u64,
    pub records_skipped: u64,
    pub source_path: String,
    pub data_source_id: String,
}

/// Orchestrates one import run over records of type `T`.
pub struct Processor<T: ImportedRecord> {
    reader: Box<dyn RecordReader<T>>,
    writer: Box<dyn RecordWriter<T>>,
    transformer: Option<Box<dyn RecordTransformer<T>>>,
    filter: Option<Box<dyn RecordFilter<T>>>,
    validator: Option<Box<dyn RecordValidator<T>>>,
    importer: Option<Box<dyn RecordImporter>>,
    record_repository: Arc<dyn RecordRepository<T>>,
    data_source_repository: Arc<dyn Repository<DataSource>>,
    data_set_repository: Arc<dyn Repository<DataSet>>,
    sample_repository: Option<Arc<dyn Repository<Sample>>>,
    options: Option<Arc<ImportOptions>>,
    data_source: Option<DataSource>,
    data_set: Option<DataSet>,
    state: RunState,
    records_written: u64,
    records_skipped: u64,
}

impl<T: ImportedRecord> Processor<T> {
    pub fn builder() -> ProcessorBuilder<T> {
        ProcessorBuilder::default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Records written so far. Reset at the start of every run; deliberately
    /// left at its last value on failure for diagnostics.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Bind the run's metadata and options. Both metadata records must
    /// already be persisted (carry ids); a binding failure leaves the
    /// processor `Failed`.
    pub fn configure(
        &mut self,
        data_source: DataSource,
        data_set: DataSet,
        options: ImportOptions,
    ) -> Result<(), ImportError> {
        match self.state {
            RunState::Failed => {
                return Err(ImportError::Configuration(
                    "processor is in a failed state; build a new one".into(),
                ));
            }
            RunState::Running => {
                return Err(ImportError::Configuration("processor is running".into()));
            }
            _ => {}
        }
        if data_source.id.is_none() {
            self.state = RunState::Failed;
            return Err(ImportError::Configuration(
                "data source must be persisted before import".into(),
            ));
        }
        if data_set.id.is_none() {
            self.state = RunState::Failed;
            return Err(ImportError::Configuration(
                "data set must be persisted before import".into(),
            ));
        }
        self.data_source = Some(data_source);
        self.data_set = Some(data_set);
        self.options = Some(Arc::new(options));
        self.state = RunState::Configured;
        Ok(())
    }

    /// Execute one import run.
    ///
    /// Returns a [`RunSummary`] on success, or when a named-invalid error
    /// (invalid sample / data source / gene) was suppressed by its skip flag
    /// — in the latter case the summary's state is `Failed`, no further
    /// records were processed, and no rollback was performed. Every other
    /// error rolls back this run's records and propagates.
    pub fn run(&mut self) -> Result<RunSummary, ImportError> {
        match self.state {
            RunState::Configured => {}
            RunState::New => {
                return Err(ImportError::Configuration(
                    "processor has not been configured".into(),
                ));
            }
            RunState::Failed => {
                return Err(ImportError::Configuration(
                    "processor is in a failed state; build a new one".into(),
                ));
            }
            RunState::Running | RunState::Succeeded => {
                return Err(ImportError::Configuration(
                    "processor already ran; configure a new run".into(),
                ));
            }
        }

        let ctx = self.context()?;
        self.records_written = 0;
        self.records_skipped = 0;
        self.state = RunState::Running;

        match self.execute(&ctx) {
            Ok(()) => {
                self.state = RunState::Succeeded;
                info!(
                    records = self.records_written,
                    skipped = self.records_skipped,
                    source = %ctx.data_source.source_path,
                    "import complete"
                );
                Ok(self.summary(&ctx))
            }
            Err(err) if ctx.options.suppresses(err.category()) => {
                self.state = RunState::Failed;
                warn!(
                    source = %ctx.data_source.source_path,
                    error = %err,
                    "import failed; error suppressed by skip flag"
                );
                Ok(self.summary(&ctx))
            }
            Err(err) => {
                self.state = RunState::Failed;
                Err(self.rollback(&ctx, err))
            }
        }
    }

    fn summary(&self, ctx: &RunContext) -> RunSummary {
        RunSummary {
            state: self.state,
            records_written: self.records_written,
            records_skipped: self.records_skipped,
            source_path: ctx.data_source.source_path.clone(),
            data_source_id: ctx.data_source_id().to_string(),
        }
    }

    fn context(&self) -> Result<RunContext, ImportError> {
        let options = self
            .options
            .clone()
            .ok_or_else(|| ImportError::Configuration("import options not bound".into()))?;
        let data_source = self
            .data_source
            .clone()
            .ok_or_else(|| ImportError::Configuration("data source not bound".into()))?;
        let data_set = self
            .data_set
            .clone()
            .ok_or_else(|| ImportError::Configuration("data set not bound".into()))?;
        Ok(RunContext {
            options,
            data_source,
            data_set,
        })
    }

    fn execute(&mut self, ctx: &RunContext) -> Result<(), ImportError> {
        self.reader.do_before(ctx)?;
        self.writer.do_before(ctx)?;
        if let Some(importer) = self.importer.as_mut() {
            importer.do_before(ctx)?;
        }
        if let Some(filter) = self.filter.as_mut() {
            filter.do_before(ctx)?;
        }
        if let Some(transformer) = self.transformer.as_mut() {
            transformer.do_before(ctx)?;
        }

        self.process_records(ctx)?;

        // The writer tears down first so a staged file is flushed and whole
        // before the bulk load, and before the reader releases its source.
        self.writer.do_after()?;
        if let Some(staged) = self.writer.staged_path().map(Path::to_path_buf) {
            if let Some(importer) = self.importer.as_mut() {
                let loaded = importer.import_file(&staged)?;
                debug!(loaded, staged = %staged.display(), "bulk import complete");
            }
        }
        self.reader.do_after()?;
        if let Some(filter) = self.filter.as_mut() {
            filter.do_after()?;
        }
        if let Some(importer) = self.importer.as_mut() {
            importer.do_after()?;
        }
        if let Some(transformer) = self.transformer.as_mut() {
            transformer.do_after()?;
        }

        self.update_linkage(ctx)
    }

    fn process_records(&mut self, ctx: &RunContext) -> Result<(), ImportError> {
        while let Some(record) = self.reader.read_record()? {
            let record = match self.transformer.as_ref() {
                Some(transformer) => transformer.transform(record)?,
                None => record,
            };
            if let Some(filter) = self.filter.as_ref() {
                if filter.is_filterable(&record) {
                    debug!(record = %record.display(), "record filtered");
                    continue;
                }
            }
            if let Some(validator) = self.validator.as_ref() {
                if let Err(errors) = validator.validate(&record) {
                    if ctx.options.skip_invalid_records {
                        self.records_skipped += 1;
                        warn!(
                            record = %record.display(),
                            errors = %format_errors(&errors),
                            "skipping invalid record"
                        );
                        continue;
                    }
                    return Err(ImportError::InvalidRecord {
                        record: record.display(),
                        errors,
                    });
                }
            }
            let mut record = record;
            record.set_data_source_id(ctx.data_source_id().to_string());
            self.writer.write_record(record)?;
            self.records_written += 1;
        }
        Ok(())
    }

    /// Step 6: link this run's data source (and any discovered samples) into
    /// the data set. Append-if-absent, so re-linking is idempotent.
    fn update_linkage(&mut self, ctx: &RunContext) -> Result<(), ImportError> {
        let data_source_id = ctx.data_source_id().to_string();
        let discovered: Vec<Sample> = self.reader.samples().to_vec();

        let Some(data_set) = self.data_set.as_mut() else {
            return Err(ImportError::Configuration(
                "data set binding lost mid-run".into(),
            ));
        };
        data_set.add_data_source(&data_source_id);

        if !discovered.is_empty() {
            let Some(sample_repository) = self.sample_repository.as_ref() else {
                return Err(ImportError::Configuration(
                    "reader discovered samples but no sample repository is bound".into(),
                ));
            };
            for mut sample in discovered {
                if sample.id.is_none() {
                    sample.data_set_id = data_set.id.clone();
                    sample = sample_repository.insert(sample)?;
                }
                if let Some(id) = sample.id() {
                    data_set.add_sample(id);
                }
            }
        }

        self.data_set_repository.update(data_set.clone())?;

        if let Some(data_source) = self.data_source.as_mut() {
            data_source.touch();
            self.data_source_repository.update(data_source.clone())?;
        }
        Ok(())
    }

    /// Best-effort rollback: delete every record written under this run's
    /// data source, then the data source metadata itself. Invoked for every
    /// propagating mid-run error, even ones raised after the write loop. A
    /// failure here is wrapped so it never masks the original error, and is
    /// not retried.
    fn rollback(&mut self, ctx: &RunContext, original: ImportError) -> ImportError {
        let data_source_id = ctx.data_source_id();
        warn!(
            data_source = %ctx.data_source.display(),
            error = %original,
            "rolling back failed import"
        );
        let outcome = self
            .record_repository
            .delete_by_data_source(data_source_id)
            .and_then(|deleted| {
                self.data_source_repository.delete(data_source_id)?;
                Ok(deleted)
            });
        match outcome {
            Ok(deleted) => {
                warn!(deleted, data_source = data_source_id, "rollback complete");
                original
            }
            Err(rollback_err) => {
                warn!(error = %rollback_err, "rollback failed");
                ImportError::Rollback {
                    data_source_id: data_source_id.to_string(),
                    message: rollback_err.to_string(),
                    original: original.to_string(),
                }
            }
        }
    }
}

/// Builder for [`Processor`]. Reader, writer, and the three repositories are
/// required; everything else is optional.
pub struct ProcessorBuilder<T: ImportedRecord> {
    reader: Option<Box<dyn RecordReader<T>>>,
    writer: Option<Box<dyn RecordWriter<T>>>,
    transformer: Option<Box<dyn RecordTransformer<T>>>,
    filter: Option<Box<dyn RecordFilter<T>>>,
    validator: Option<Box<dyn RecordValidator<T>>>,
    importer: Option<Box<dyn RecordImporter>>,
    record_repository: Option<Arc<dyn RecordRepository<T>>>,
    data_source_repository: Option<Arc<dyn Repository<DataSource>>>,
    data_set_repository: Option<Arc<dyn Repository<DataSet>>>,
    sample_repository: Option<Arc<dyn Repository<Sample>>>,
}

impl<T: ImportedRecord> Default for ProcessorBuilder<T> {
    fn default() -> Self {
        Self {
            reader: None,
            writer: None,
            transformer: None,
            filter: None,
            validator: None,
            importer: None,
            record_repository: None,
            data_source_repository: None,
            data_set_repository: None,
            sample_repository: None,
        }
    }
}

impl<T: ImportedRecord> ProcessorBuilder<T> {
    pub fn reader(mut self, reader: impl RecordReader<T> + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    pub fn writer(mut self, writer: impl RecordWriter<T> + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    pub fn transformer(mut self, transformer: impl RecordTransformer<T> + 'static) -> Self {
        self.transformer = Some(Box::new(transformer));
        self
    }

    pub fn filter(mut self, filter: impl RecordFilter<T> + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn validator(mut self, validator: impl RecordValidator<T> + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn importer(mut self, importer: impl RecordImporter + 'static) -> Self {
        self.importer = Some(Box::new(importer));
        self
    }

    pub fn record_repository(mut self, repository: Arc<dyn RecordRepository<T>>) -> Self {
        self.record_repository = Some(repository);
        self
    }

    pub fn data_source_repository(mut self, repository: Arc<dyn Repository<DataSource>>) -> Self {
        self.data_source_repository = Some(repository);
        self
    }

    pub fn data_set_repository(mut self, repository: Arc<dyn Repository<DataSet>>) -> Self {
        self.data_set_repository = Some(repository);
        self
    }

    pub fn sample_repository(mut self, repository: Arc<dyn Repository<Sample>>) -> Self {
        self.sample_repository = Some(repository);
        self
    }

    pub fn build(self) -> Result<Processor<T>, ImportError> {
        let missing = |what: &str| ImportError::Configuration(format!("{what} is required"));
        Ok(Processor {
            reader: self.reader.ok_or_else(|| missing("a reader"))?,
            writer: self.writer.ok_or_else(|| missing("a writer"))?,
            transformer: self.transformer,
            filter: self.filter,
            validator: self.validator,
            importer: self.importer,
            record_repository: self
                .record_repository
                .ok_or_else(|| missing("a record repository"))?,
            data_source_repository: self
                .data_source_repository
                .ok_or_else(|| missing("a data source repository"))?,
            data_set_repository: self
                .data_set_repository
                .ok_or_else(|| missing("a data set repository"))?,
            sample_repository: self.sample_repository,
            options: None,
            data_source: None,
            data_set: None,
            state: RunState::New,
            records_written: 0,
            records_skipped: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::model::Gene;
    use crate::reader::VecReader;
    use crate::repository::MemoryRepository;
    use crate::writer::{RepositoryWriter, WriteMode};

    struct Repos {
        records: Arc<MemoryRepository<Gene>>,
        data_sources: Arc<MemoryRepository<DataSource>>,
        data_sets: Arc<MemoryRepository<DataSet>>,
    }

    fn repos() -> Repos {
        Repos {
            records: Arc::new(MemoryRepository::new()),
            data_sources: Arc::new(MemoryRepository::new()),
            data_sets: Arc::new(MemoryRepository::new()),
        }
    }

    fn processor(repos: &Repos, genes: Vec<Gene>) -> Processor<Gene> {
        Processor::builder()
            .reader(VecReader::new(genes))
            .writer(RepositoryWriter::new(
                repos.records.clone(),
                WriteMode::Insert,
            ))
            .record_repository(repos.records.clone())
            .data_source_repository(repos.data_sources.clone())
            .data_set_repository(repos.data_sets.clone())
            .build()
            .unwrap()
    }

    fn bindings(repos: &Repos) -> (DataSource, DataSet) {
        let data_source = repos
            .data_sources
            .insert(DataSource::new("/data/genes.tsv", "gene"))
            .unwrap();
        let data_set = repos
            .data_sets
            .insert(DataSet::new("unit", "Unit Set"))
            .unwrap();
        (data_source, data_set)
    }

    #[test]
    fn run_refused_before_configure() {
        let repos = repos();
        let mut processor = processor(&repos, vec![]);
        assert_eq!(processor.state(), RunState::New);
        assert!(processor.run().is_err());
    }

    #[test]
    fn configure_requires_persisted_metadata() {
        let repos = repos();
        let mut processor = processor(&repos, vec![]);
        let err = processor
            .configure(
                DataSource::new("/data/genes.tsv", "gene"),
                DataSet::new("unit", "Unit Set"),
                ImportOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(processor.state(), RunState::Failed);
        // Failed is terminal
        assert!(processor.run().is_err());
    }

    #[test]
    fn successful_run_writes_counts_and_links() {
        let repos = repos();
        let mut processor = processor(&repos, vec![Gene::new("TP53"), Gene::new("KRAS")]);
        let (data_source, data_set) = bindings(&repos);
        let data_source_id = data_source.id.clone().unwrap();

        processor
            .configure(data_source, data_set, ImportOptions::default())
            .unwrap();
        let summary = processor.run().unwrap();

        assert_eq!(summary.state, RunState::Succeeded);
        assert_eq!(summary.records_written, 2);
        let stored = repos.records.all();
        assert!(stored.iter().all(|g| g.data_source_id() == Some(data_source_id.as_str())));
        let linked = repos.data_sets.find_by_id("1").unwrap().unwrap();
        assert_eq!(linked.data_source_ids, vec![data_source_id]);
    }

    #[test]
    fn second_run_refused_after_success() {
        let repos = repos();
        let mut processor = processor(&repos, vec![Gene::new("TP53")]);
        let (data_source, data_set) = bindings(&repos);
        processor
            .configure(data_source, data_set, ImportOptions::default())
            .unwrap();
        processor.run().unwrap();
        assert!(processor.run().is_err());
    }
}
