//! Bulk loaders for staged files.
//!
//! A [`RecordImporter`] ingests a staged intermediate file into the permanent
//! store in one operation. It is only invoked when the run's writer staged to
//! a file, and any failure is fatal to the run: some records may have
//! partially loaded, which is exactly what the rollback protocol exists to
//! clean up.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::context::RunContext;
use crate::error::ImportError;
use crate::model::ImportedRecord;
use crate::options::DEFAULT_BATCH_SIZE;
use crate::repository::RecordRepository;
use crate::writer::StagedFormat;

/// One-shot bulk loader.
pub trait RecordImporter {
    fn do_before(&mut self, _ctx: &RunContext) -> Result<(), ImportError> {
        Ok(())
    }

    /// Load the staged file into the permanent store. Returns the number of
    /// records loaded.
    fn import_file(&mut self, path: &Path) -> Result<u64, ImportError>;

    fn do_after(&mut self) -> Result<(), ImportError> {
        Ok(())
    }
}

/// Reference importer: reads a staged file back (in the format the staging
/// writer produced) and bulk-inserts its records.
///
/// A store-native bulk loader (e.g. `mongoimport` against the staged JSONL)
/// would implement the same contract as a subprocess wrapper.
pub struct FileImporter<T> {
    repository: Arc<dyn RecordRepository<T>>,
    format: StagedFormat,
    batch_size: usize,
}

impl<T: ImportedRecord> FileImporter<T> {
    pub fn new(repository: Arc<dyn RecordRepository<T>>, format: StagedFormat) -> Self {
        Self {
            repository,
            format,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    fn bulk_import_error(path: &Path, message: impl ToString) -> ImportError {
        ImportError::BulkImport {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

impl<T: ImportedRecord + DeserializeOwned> RecordImporter for FileImporter<T> {
    fn do_before(&mut self, ctx: &RunContext) -> Result<(), ImportError> {
        self.batch_size = ctx.options.batch_size.max(1);
        Ok(())
    }

    fn import_file(&mut self, path: &Path) -> Result<u64, ImportError> {
        let file = File::open(path).map_err(|e| Self::bulk_import_error(path, e))?;

        let mut loaded: u64 = 0;
        let mut batch: Vec<T> = Vec::with_capacity(self.batch_size);
        let mut push = |record: T,
                        batch: &mut Vec<T>,
                        loaded: &mut u64|
         -> Result<(), ImportError> {
            batch.push(record);
            if batch.len() >= self.batch_size {
                self.repository.insert_batch(std::mem::take(batch))?;
            }
            *loaded += 1;
            Ok(())
        };

        match self.format {
            StagedFormat::Delimited { delimiter, quote } => {
                let mut reader = csv::ReaderBuilder::new()
                    .delimiter(delimiter)
                    .quote(quote)
                    .has_headers(true)
                    .from_reader(BufReader::new(file));
                for row in reader.deserialize::<T>() {
                    let record = row.map_err(|e| Self::bulk_import_error(path, e))?;
                    push(record, &mut batch, &mut loaded)?;
                }
            }
            StagedFormat::JsonLines => {
                for line in BufReader::new(file).lines() {
                    let line = line.map_err(|e| Self::bulk_import_error(path, e))?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record: T = serde_json::from_str(&line)
                        .map_err(|e| Self::bulk_import_error(path, e))?;
                    push(record, &mut batch, &mut loaded)?;
                }
            }
        }

        if !batch.is_empty() {
            self.repository.insert_batch(batch)?;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::metadata::{DataSet, DataSource};
    use crate::model::{GeneExpression, Model};
    use crate::options::ImportOptions;
    use crate::repository::{MemoryRepository, Repository};
    use crate::writer::{RecordWriter, StagedFileWriter};

    fn ctx(temp_dir: &Path, batch_size: usize) -> RunContext {
        let mut data_source = DataSource::new("/data/expr.tsv", "gene-expression");
        data_source.id = Some("ds-1".into());
        let mut data_set = DataSet::new("import-set", "Import Set");
        data_set.id = Some("set-1".into());
        RunContext {
            options: Arc::new(
                ImportOptions::default()
                    .with_temp_dir(temp_dir)
                    .with_batch_size(batch_size),
            ),
            data_source,
            data_set,
        }
    }

    fn stage(ctx: &RunContext, format: StagedFormat, n: usize) -> std::path::PathBuf {
        let mut writer = StagedFileWriter::<GeneExpression>::new(format);
        writer.do_before(ctx).unwrap();
        for i in 0..n {
            let mut record = GeneExpression::new(format!("G{i}"), "S1", i as f64);
            record.set_data_source_id("ds-1".into());
            writer.write_record(record).unwrap();
        }
        writer.do_after().unwrap();
        writer.staged_path().unwrap().to_path_buf()
    }

    #[test]
    fn imports_staged_delimited_file_in_batches() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = ctx(temp.path(), 2);
        let staged = stage(&ctx, StagedFormat::delimited(), 5);

        let repository = Arc::new(MemoryRepository::<GeneExpression>::new());
        let mut importer = FileImporter::new(repository.clone(), StagedFormat::delimited());
        importer.do_before(&ctx).unwrap();
        let loaded = importer.import_file(&staged).unwrap();

        assert_eq!(loaded, 5);
        assert_eq!(repository.count().unwrap(), 5);
        assert_eq!(repository.bulk_sizes(), vec![2, 2, 1]);
        assert!(repository.all().iter().all(|r| r.id().is_some()));
    }

    #[test]
    fn imports_staged_jsonl_file() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = ctx(temp.path(), 200);
        let staged = stage(&ctx, StagedFormat::JsonLines, 3);

        let repository = Arc::new(MemoryRepository::<GeneExpression>::new());
        let mut importer = FileImporter::new(repository.clone(), StagedFormat::JsonLines);
        importer.do_before(&ctx).unwrap();
        assert_eq!(importer.import_file(&staged).unwrap(), 3);
        let stored = repository.all();
        assert_eq!(stored[0].data_source_id(), Some("ds-1"));
    }

    #[test]
    fn missing_staged_file_is_a_bulk_import_error() {
        let repository = Arc::new(MemoryRepository::<GeneExpression>::new());
        let mut importer = FileImporter::new(repository, StagedFormat::delimited());
        let err = importer
            .import_file(Path::new("/no/such/staged.tmp"))
            .unwrap_err();
        assert!(matches!(err, ImportError::BulkImport { .. }));
    }
}
