//! # Oncoload
//!
//! A **pluggable record-import framework** for loading genomic data files
//! into a permanent store. Oncoload decomposes an import into small,
//! swappable components and orchestrates them through a [`Processor`] with a
//! strict lifecycle, partial-failure policies, and rollback on failure.
//!
//! ## Key Features
//!
//! - **Component model** - readers, transformers, filters, validators,
//!   writers, and importers compose into one pipeline
//! - **Lifecycle state machine** - `New → Configured → Running →
//!   {Succeeded | Failed}`, with `Failed` terminal
//! - **Partial-failure policies** - skip flags decide whether invalid
//!   records, samples, data sources, or genes abort the run
//! - **Write strategies** - direct batched repository writes, or staging to
//!   an intermediate file followed by a bulk import
//! - **Metadata linkage** - every imported record is stamped with its
//!   `DataSource`, which is linked into the owning `DataSet` along with any
//!   samples discovered during the run
//! - **Rollback** - a failed run deletes everything it wrote before the
//!   error surfaces
//! - **Transparent decompression** - gzip sources are detected by extension
//!   or magic bytes (optional via the `compression-gzip` feature)
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use oncoload::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let genes = Arc::new(MemoryRepository::<Gene>::new());
//!     let data_sources = Arc::new(MemoryRepository::<DataSource>::new());
//!     let data_sets = Arc::new(MemoryRepository::<DataSet>::new());
//!
//!     // Metadata must be persisted before the run so ids exist to link.
//!     let data_source = data_sources.insert(DataSource::new("genes.tsv", "gene"))?;
//!     let data_set = data_sets.insert(DataSet::new("tcga-brca", "TCGA Breast"))?;
//!
//!     let mut processor = Processor::builder()
//!         .reader(DelimitedRecordReader::<Gene>::new("genes.tsv"))
//!         .writer(RepositoryWriter::new(genes.clone(), WriteMode::Insert))
//!         .validator(ModelValidator)
//!         .record_repository(genes.clone())
//!         .data_source_repository(data_sources)
//!         .data_set_repository(data_sets)
//!         .build()?;
//!
//!     processor.configure(data_source, data_set, ImportOptions::default())?;
//!     let summary = processor.run()?;
//!     println!("imported {} records", summary.records_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Components
//!
//! Each stage of an import is a trait with `do_before`/`do_after` lifecycle
//! hooks around its core operation:
//!
//! - [`RecordReader`] - pulls records one at a time from a source file, and
//!   may discover [`Sample`]s along the way
//! - [`RecordTransformer`] - pure per-record mapping, applied first
//! - [`RecordFilter`] - predicate that drops records silently
//! - [`RecordValidator`] - structural validation; failures either skip the
//!   record or abort the run, per [`ImportOptions::skip_invalid_records`]
//! - [`RecordWriter`] - persists records, either directly
//!   ([`RepositoryWriter`]) or into a staged file ([`StagedFileWriter`])
//! - [`RecordImporter`] - bulk-loads a staged file in one operation
//!
//! ### Processor
//!
//! The [`Processor`] owns one run: it calls every component's `do_before`,
//! pulls the reader dry through the transform/filter/validate/write loop,
//! tears the components down (flushing the writer before any bulk import),
//! and links the run's metadata on success. Any error rolls back every
//! record written under the run's [`DataSource`].
//!
//! ### Repositories
//!
//! Storage is abstracted behind [`Repository`] and [`RecordRepository`].
//! [`MemoryRepository`] is the bundled in-memory implementation, used in
//! tests and as the reference for store-backed implementations.
//!
//! ### Error handling
//!
//! Every failure is an [`ImportError`]; its [`ErrorCategory`] is what the
//! processor consults when deciding whether a skip flag suppresses it.

pub mod compression;
pub mod context;
pub mod error;
pub mod importer;
pub mod metadata;
pub mod model;
pub mod options;
pub mod processor;
pub mod reader;
pub mod repository;
pub mod testing;
pub mod transform;
pub mod validation;
pub mod writer;

pub use context::RunContext;
pub use error::{ErrorCategory, ImportError};
pub use importer::{FileImporter, RecordImporter};
pub use metadata::{DataSet, DataSource, Sample};
pub use model::{Gene, GeneExpression, ImportedRecord, Model, MutationCall};
pub use options::{ImportOptions, DEFAULT_BATCH_SIZE};
pub use processor::{Processor, ProcessorBuilder, RunState, RunSummary};
pub use reader::{DelimitedRecordReader, ExpressionMatrixReader, RecordReader, VecReader};
pub use repository::{MemoryRepository, RecordRepository, Repository};
pub use transform::{FnFilter, FnTransformer, RecordFilter, RecordTransformer};
pub use validation::{
    FnValidator, ModelValidator, RecordValidator, Validate, ValidationError, ValidationResult,
};
pub use writer::{RecordWriter, RepositoryWriter, StagedFileWriter, StagedFormat, WriteMode};
