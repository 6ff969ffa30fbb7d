//! Record sinks: direct batched writes and staged intermediate files.
//!
//! Two strategies share the [`RecordWriter`] contract:
//! - [`RepositoryWriter`] buffers records and flushes them to the store as
//!   bulk calls, preserving submission order within and across batches;
//! - [`StagedFileWriter`] appends accepted records to a line-oriented
//!   intermediate file for a later one-shot bulk load, used when the store's
//!   native bulk loader is dramatically faster than row-by-row writes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::ImportError;
use crate::model::Model;
use crate::repository::Repository;

/// How a batched writer hands records to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Always create; a duplicate key is a hard error.
    Insert,
    /// Require an existing record by id; missing is a hard error.
    Update,
    /// Insert-or-update by id.
    Upsert,
}

/// Consumer of accepted records.
pub trait RecordWriter<T: Model> {
    fn do_before(&mut self, _ctx: &RunContext) -> Result<(), ImportError> {
        Ok(())
    }

    fn write_record(&mut self, record: T) -> Result<(), ImportError>;

    /// Flush buffered state and release resources.
    fn do_after(&mut self) -> Result<(), ImportError> {
        Ok(())
    }

    /// For staging writers, the intermediate file to hand to an importer.
    fn staged_path(&self) -> Option<&Path> {
        None
    }
}

/// Batched direct writer against a [`Repository`].
///
/// Buffers up to the run's batch size (overridable per writer — metadata
/// imports typically use 1) and flushes each full batch as one bulk call;
/// the final partial batch is flushed in `do_after`.
pub struct RepositoryWriter<T: Model> {
    repository: Arc<dyn Repository<T>>,
    mode: WriteMode,
    batch_size_override: Option<usize>,
    batch_size: usize,
    buffer: Vec<T>,
}

impl<T: Model> RepositoryWriter<T> {
    pub fn new(repository: Arc<dyn Repository<T>>, mode: WriteMode) -> Self {
        Self {
            repository,
            mode,
            batch_size_override: None,
            batch_size: 1,
            buffer: Vec::new(),
        }
    }

    /// Fix the batch size regardless of the run options.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size_override = Some(batch_size.max(1));
        self
    }

    fn flush(&mut self) -> Result<(), ImportError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        match self.mode {
            WriteMode::Insert => self.repository.insert_batch(batch)?,
            WriteMode::Update => self.repository.update_batch(batch)?,
            WriteMode::Upsert => self.repository.upsert_batch(batch)?,
        };
        Ok(())
    }
}

impl<T: Model> RecordWriter<T> for RepositoryWriter<T> {
    fn do_before(&mut self, ctx: &RunContext) -> Result<(), ImportError> {
        self.batch_size = self
            .batch_size_override
            .unwrap_or(ctx.options.batch_size)
            .max(1);
        self.buffer = Vec::with_capacity(self.batch_size);
        Ok(())
    }

    fn write_record(&mut self, record: T) -> Result<(), ImportError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn do_after(&mut self) -> Result<(), ImportError> {
        self.flush()
    }
}

/// On-disk layout of a staged intermediate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedFormat {
    /// Delimited text with a header row of field names in declaration order.
    Delimited { delimiter: u8, quote: u8 },
    /// One JSON document per line, with a null `_id` and any `_class`
    /// bookkeeping field stripped.
    JsonLines,
}

impl StagedFormat {
    /// Tab-delimited with standard double-quote quoting.
    pub fn delimited() -> Self {
        StagedFormat::Delimited {
            delimiter: b'\t',
            quote: b'"',
        }
    }
}

impl Default for StagedFormat {
    fn default() -> Self {
        Self::delimited()
    }
}

enum StagedOut {
    Delimited(csv::Writer<BufWriter<File>>),
    JsonLines(BufWriter<File>),
}

/// Writer that stages accepted records into an intermediate file instead of
/// writing to the store.
///
/// The file path is derived deterministically from the run context
/// ([`RunContext::staged_path`]); a previous run's staged file for the same
/// data set and record type is overwritten. Delimited staging requires flat
/// record types — sequence-valued fields only round-trip through
/// [`StagedFormat::JsonLines`].
pub struct StagedFileWriter<T> {
    format: StagedFormat,
    path: Option<PathBuf>,
    out: Option<StagedOut>,
    _record: PhantomData<fn(T)>,
}

impl<T> StagedFileWriter<T> {
    pub fn new(format: StagedFormat) -> Self {
        Self {
            format,
            path: None,
            out: None,
            _record: PhantomData,
        }
    }

    pub fn format(&self) -> StagedFormat {
        self.format
    }
}

impl<T> Default for StagedFileWriter<T> {
    fn default() -> Self {
        Self::new(StagedFormat::default())
    }
}

impl<T: Model + Serialize> RecordWriter<T> for StagedFileWriter<T> {
    fn do_before(&mut self, ctx: &RunContext) -> Result<(), ImportError> {
        std::fs::create_dir_all(&ctx.options.temp_dir)?;
        let path = ctx.staged_path();
        let file = File::create(&path)?;
        let buffered = BufWriter::new(file);
        self.out = Some(match self.format {
            StagedFormat::Delimited { delimiter, quote } => StagedOut::Delimited(
                csv::WriterBuilder::new()
                    .delimiter(delimiter)
                    .quote(quote)
                    .has_headers(true)
                    .from_writer(buffered),
            ),
            StagedFormat::JsonLines => StagedOut::JsonLines(buffered),
        });
        self.path = Some(path);
        Ok(())
    }

    fn write_record(&mut self, record: T) -> Result<(), ImportError> {
        let Some(out) = self.out.as_mut() else {
            return Err(ImportError::Configuration(
                "staged writer used before do_before".into(),
            ));
        };
        match out {
            StagedOut::Delimited(writer) => writer.serialize(&record)?,
            StagedOut::JsonLines(writer) => {
                let mut value = serde_json::to_value(&record)?;
                if let Value::Object(fields) = &mut value {
                    if fields.get("_id") == Some(&Value::Null) {
                        fields.remove("_id");
                    }
                    fields.remove("_class");
                }
                serde_json::to_writer(&mut *writer, &value)?;
                writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn do_after(&mut self) -> Result<(), ImportError> {
        match self.out.take() {
            Some(StagedOut::Delimited(mut writer)) => writer.flush()?,
            Some(StagedOut::JsonLines(mut writer)) => writer.flush()?,
            None => {}
        }
        Ok(())
    }

    fn staged_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
