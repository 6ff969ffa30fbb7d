//! Testing utilities for import pipelines.
//!
//! This module provides the pieces needed to exercise a [`Processor`] end to
//! end without real infrastructure:
//!
//! - **Fixture files**: write delimited and matrix source files into temp
//!   storage
//! - **Failing doubles**: components that fail on demand, for exercising the
//!   rollback path
//! - **Temp paths**: RAII wrappers around [`tempfile`] primitives
//!
//! Everything here is ordinary library code (no `#[cfg(test)]`), so
//! downstream crates can use it in their own tests.
//!
//! [`Processor`]: crate::processor::Processor

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempDir};

use crate::error::ImportError;
use crate::importer::RecordImporter;
use crate::model::Model;
use crate::validation::{RecordValidator, ValidationError, ValidationResult};
use crate::writer::RecordWriter;

/// A temporary file that is deleted when dropped.
pub struct TempSourceFile {
    #[allow(dead_code)]
    temp_file: NamedTempFile,
    path: PathBuf,
}

impl TempSourceFile {
    /// Create an empty temporary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self { temp_file, path })
    }

    /// Create an empty temporary file with a specific extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn with_extension(extension: &str) -> std::io::Result<Self> {
        let temp_file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self { temp_file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A temporary directory that is deleted when dropped. Useful as the
/// `temp_dir` of [`ImportOptions`](crate::options::ImportOptions).
pub struct TempStagingDir {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempStagingDir {
    /// Create a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write a delimited source file: one header row, then one row per record.
///
/// Rows are written verbatim with fields joined by `delimiter`, so malformed
/// fixtures (short rows, junk values) are as easy to produce as valid ones.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn mock_delimited_file(
    header: &[&str],
    rows: &[&[&str]],
    delimiter: char,
) -> std::io::Result<TempSourceFile> {
    let temp = TempSourceFile::with_extension("tsv")?;
    let mut file = std::fs::File::create(temp.path())?;
    writeln!(file, "{}", header.join(&delimiter.to_string()))?;
    for row in rows {
        writeln!(file, "{}", row.join(&delimiter.to_string()))?;
    }
    file.flush()?;
    Ok(temp)
}

/// Write an expression-matrix source file: `gene_symbol` plus one column per
/// sample, one gene per row.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn mock_matrix_file(
    samples: &[&str],
    rows: &[(&str, &[&str])],
) -> std::io::Result<TempSourceFile> {
    let temp = TempSourceFile::with_extension("tsv")?;
    let mut file = std::fs::File::create(temp.path())?;
    writeln!(file, "gene_symbol\t{}", samples.join("\t"))?;
    for (gene, values) in rows {
        writeln!(file, "{gene}\t{}", values.join("\t"))?;
    }
    file.flush()?;
    Ok(temp)
}

/// Gzip-compress an existing fixture file, for exercising transparent
/// decompression.
///
/// # Errors
///
/// Returns an error if either file cannot be read or written.
#[cfg(feature = "compression-gzip")]
pub fn gzip_fixture(source: &Path) -> std::io::Result<TempSourceFile> {
    let temp = TempSourceFile::with_extension("gz")?;
    let mut encoder = flate2::write::GzEncoder::new(
        std::fs::File::create(temp.path())?,
        flate2::Compression::default(),
    );
    encoder.write_all(&std::fs::read(source)?)?;
    encoder.finish()?.flush()?;
    Ok(temp)
}

/// A writer that accepts a fixed number of records and then fails, for
/// exercising mid-run failure and rollback.
pub struct FailingWriter<T> {
    accept: u64,
    written: u64,
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<T> FailingWriter<T> {
    /// Fails on the record after `accept` successful writes.
    #[must_use]
    pub fn after(accept: u64) -> Self {
        Self {
            accept,
            written: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Model> RecordWriter<T> for FailingWriter<T> {
    fn write_record(&mut self, record: T) -> Result<(), ImportError> {
        if self.written >= self.accept {
            return Err(ImportError::Store(format!(
                "write refused for {}",
                record.display()
            )));
        }
        self.written += 1;
        Ok(())
    }
}

/// An importer whose bulk load always fails, for exercising rollback after
/// records have already reached the store.
pub struct FailingImporter;

impl RecordImporter for FailingImporter {
    fn import_file(&mut self, path: &Path) -> Result<u64, ImportError> {
        Err(ImportError::BulkImport {
            path: path.display().to_string(),
            message: "bulk load refused".into(),
        })
    }
}

/// A validator that rejects every record.
pub struct RejectAllValidator;

impl<T: Model> RecordValidator<T> for RejectAllValidator {
    fn validate(&self, _record: &T) -> ValidationResult {
        Err(vec![ValidationError::new("rejected")])
    }
}
