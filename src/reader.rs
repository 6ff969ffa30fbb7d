//! Record sources.
//!
//! A [`RecordReader`] produces a lazy, finite, non-restartable sequence of
//! typed records: each [`read_record`](RecordReader::read_record) call
//! returns the next record or `None`, and `None` is permanent for that reader
//! instance. Readers may accumulate side-channel metadata while reading —
//! sample-aware formats expose discovered samples through
//! [`samples`](RecordReader::samples), which the processor queries after the
//! read loop so the reader never touches persistence itself.
//!
//! Failures inside `read_record` are structural and fatal to the run: the
//! reader's own accounting may be left inconsistent, so there is no skip
//! path for them.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::compression;
use crate::context::RunContext;
use crate::error::ImportError;
use crate::metadata::Sample;
use crate::model::{GeneExpression, Model};

/// Source of one run's records.
pub trait RecordReader<T: Model> {
    /// Open the source and validate its header/shape. Must fail with a
    /// descriptive error if the path is unreadable or the header malformed.
    fn do_before(&mut self, _ctx: &RunContext) -> Result<(), ImportError> {
        Ok(())
    }

    /// Next record, or `None` once the source is exhausted (permanently).
    fn read_record(&mut self) -> Result<Option<T>, ImportError>;

    /// Release source resources.
    fn do_after(&mut self) -> Result<(), ImportError> {
        Ok(())
    }

    /// Samples discovered while reading, if this format carries any.
    fn samples(&self) -> &[Sample] {
        &[]
    }
}

/// Reader over an in-memory collection, mostly used for metadata imports and
/// in tests. Consumes its records; exhaustion is permanent.
pub struct VecReader<T> {
    records: VecDeque<T>,
}

impl<T> VecReader<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records: records.into(),
        }
    }
}

impl<T: Model> RecordReader<T> for VecReader<T> {
    fn read_record(&mut self) -> Result<Option<T>, ImportError> {
        Ok(self.records.pop_front())
    }
}

/// Reader for delimited tables (gene lists, sample manifests, mutation call
/// files): one record per row, deserialized with Serde. Tab-delimited with a
/// header row by default; gzip-compressed sources are handled transparently.
pub struct DelimitedRecordReader<T> {
    path: PathBuf,
    delimiter: u8,
    has_headers: bool,
    rows: Option<csv::DeserializeRecordsIntoIter<Box<dyn Read>, T>>,
    row: u64,
}

impl<T> DelimitedRecordReader<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b'\t',
            has_headers: true,
            rows: None,
            row: 0,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Model + DeserializeOwned> RecordReader<T> for DelimitedRecordReader<T> {
    fn do_before(&mut self, _ctx: &RunContext) -> Result<(), ImportError> {
        let raw = compression::open_source(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .from_reader(raw);
        if self.has_headers {
            let headers = reader.headers().map_err(|e| {
                ImportError::unreadable(self.path.display().to_string(), e)
            })?;
            if headers.len() == 0 || headers.iter().all(|h| h.trim().is_empty()) {
                return Err(ImportError::unreadable(
                    self.path.display().to_string(),
                    "missing or blank header row",
                ));
            }
        }
        self.rows = Some(reader.into_deserialize());
        self.row = 0;
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<T>, ImportError> {
        let Some(rows) = self.rows.as_mut() else {
            return Err(ImportError::Configuration(
                "reader used before do_before".into(),
            ));
        };
        match rows.next() {
            None => Ok(None),
            Some(Ok(record)) => {
                self.row += 1;
                Ok(Some(record))
            }
            Some(Err(e)) => Err(ImportError::MalformedRecord {
                path: self.path.display().to_string(),
                line: self.row + 1,
                message: e.to_string(),
            }),
        }
    }

    fn do_after(&mut self) -> Result<(), ImportError> {
        self.rows = None;
        Ok(())
    }
}

/// Reader for gene-by-sample expression matrices.
///
/// The header row is `gene<delim>sample1<delim>sample2...`; every following
/// row fans out into one [`GeneExpression`] record per non-missing cell,
/// emitted row-major. Sample columns become discovered [`Sample`]s exposed
/// via [`samples`](RecordReader::samples). Cells of `NA` or empty string are
/// missing values and produce no record; anything else non-numeric is a
/// structural error.
pub struct ExpressionMatrixReader {
    path: PathBuf,
    delimiter: char,
    samples: Vec<Sample>,
    lines: Option<Lines<BufReader<Box<dyn Read>>>>,
    pending: VecDeque<GeneExpression>,
    line_no: u64,
}

impl ExpressionMatrixReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: '\t',
            samples: Vec::new(),
            lines: None,
            pending: VecDeque::new(),
            line_no: 0,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn malformed(&self, message: impl Into<String>) -> ImportError {
        ImportError::MalformedRecord {
            path: self.path.display().to_string(),
            line: self.line_no,
            message: message.into(),
        }
    }

    /// Fan one matrix row out into pending expression records. Returns false
    /// for blank lines.
    fn expand_row(&mut self, line: &str) -> Result<bool, ImportError> {
        if line.trim().is_empty() {
            return Ok(false);
        }
        let fields: Vec<&str> = line.split(self.delimiter).collect();
        if fields.len() != self.samples.len() + 1 {
            return Err(self.malformed(format!(
                "expected {} columns, found {}",
                self.samples.len() + 1,
                fields.len()
            )));
        }
        let gene_symbol = fields[0].trim();
        if gene_symbol.is_empty() {
            return Err(self.malformed("blank gene symbol"));
        }
        for (sample, cell) in self.samples.iter().zip(&fields[1..]) {
            let cell = cell.trim();
            if cell.is_empty() || cell.eq_ignore_ascii_case("na") {
                continue;
            }
            let value: f64 = cell.parse().map_err(|_| {
                ImportError::MalformedRecord {
                    path: self.path.display().to_string(),
                    line: self.line_no,
                    message: format!("non-numeric expression value for {gene_symbol}: {cell}"),
                }
            })?;
            self.pending
                .push_back(GeneExpression::new(gene_symbol, &sample.name, value));
        }
        Ok(true)
    }
}

impl RecordReader<GeneExpression> for ExpressionMatrixReader {
    fn do_before(&mut self, _ctx: &RunContext) -> Result<(), ImportError> {
        let raw = compression::open_source(&self.path)?;
        let mut lines = BufReader::new(raw).lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(ImportError::unreadable(
                    self.path.display().to_string(),
                    "empty matrix file",
                ));
            }
        };
        self.line_no = 1;

        let columns: Vec<&str> = header.split(self.delimiter).collect();
        if columns.len() < 2 {
            return Err(ImportError::unreadable(
                self.path.display().to_string(),
                "matrix header needs a gene column and at least one sample column",
            ));
        }
        let mut samples = Vec::with_capacity(columns.len() - 1);
        for (index, name) in columns[1..].iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                return Err(ImportError::InvalidSample(format!(
                    "blank sample name in column {} of {}",
                    index + 2,
                    self.path.display()
                )));
            }
            if samples.iter().any(|s: &Sample| s.name == name) {
                return Err(ImportError::InvalidSample(format!(
                    "duplicate sample column {name} in {}",
                    self.path.display()
                )));
            }
            samples.push(Sample::new(name));
        }
        self.samples = samples;
        self.lines = Some(lines);
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<GeneExpression>, ImportError> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }
            let Some(lines) = self.lines.as_mut() else {
                return Ok(None);
            };
            let Some(line) = lines.next() else {
                self.lines = None;
                return Ok(None);
            };
            let line = line?;
            self.line_no += 1;
            self.expand_row(&line)?;
        }
    }

    fn do_after(&mut self) -> Result<(), ImportError> {
        self.lines = None;
        Ok(())
    }

    fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DataSet, DataSource};
    use crate::model::Gene;
    use crate::options::ImportOptions;
    use std::io::Write;
    use std::sync::Arc;

    fn ctx() -> RunContext {
        let mut data_source = DataSource::new("/tmp/x", "gene");
        data_source.id = Some("ds-1".into());
        let mut data_set = DataSet::new("test-set", "Test Set");
        data_set.id = Some("set-1".into());
        RunContext {
            options: Arc::new(ImportOptions::default()),
            data_source,
            data_set,
        }
    }

    fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn vec_reader_is_non_restartable() {
        let mut reader = VecReader::new(vec![Gene::new("TP53")]);
        assert!(reader.read_record().unwrap().is_some());
        assert!(reader.read_record().unwrap().is_none());
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn delimited_reader_yields_rows_in_order() {
        let file = write_temp(
            "primary_symbol\tentrez_id\nTP53\t7157\nKRAS\t3845\n",
            ".tsv",
        );
        let mut reader = DelimitedRecordReader::<Gene>::new(file.path());
        reader.do_before(&ctx()).unwrap();
        let first = reader.read_record().unwrap().unwrap();
        let second = reader.read_record().unwrap().unwrap();
        assert_eq!(first.primary_symbol, "TP53");
        assert_eq!(second.primary_symbol, "KRAS");
        assert!(reader.read_record().unwrap().is_none());
        reader.do_after().unwrap();
    }

    #[test]
    fn delimited_reader_fails_on_missing_file_and_blank_header() {
        let mut reader = DelimitedRecordReader::<Gene>::new("/no/such/file.tsv");
        assert!(reader.do_before(&ctx()).is_err());

        let file = write_temp("\nTP53\t7157\n", ".tsv");
        let mut reader = DelimitedRecordReader::<Gene>::new(file.path());
        let err = reader.do_before(&ctx()).unwrap_err();
        assert!(err.to_string().contains("header"));
    }

    #[test]
    fn delimited_reader_reports_malformed_rows_with_position() {
        let file = write_temp(
            "primary_symbol\tentrez_id\nTP53\tnot-a-number\n",
            ".tsv",
        );
        let mut reader = DelimitedRecordReader::<Gene>::new(file.path());
        reader.do_before(&ctx()).unwrap();
        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, ImportError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn matrix_reader_discovers_samples_and_fans_out_cells() {
        let file = write_temp(
            "gene\tS1\tS2\nTP53\t1.5\t2.5\nKRAS\tNA\t0.25\n",
            ".tsv",
        );
        let mut reader = ExpressionMatrixReader::new(file.path());
        reader.do_before(&ctx()).unwrap();

        let names: Vec<&str> = reader.samples().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["S1", "S2"]);

        let mut seen = Vec::new();
        while let Some(record) = reader.read_record().unwrap() {
            seen.push((record.gene_symbol, record.sample_name, record.value));
        }
        assert_eq!(
            seen,
            vec![
                ("TP53".into(), "S1".into(), 1.5),
                ("TP53".into(), "S2".into(), 2.5),
                ("KRAS".into(), "S2".into(), 0.25),
            ]
        );
    }

    #[test]
    fn matrix_reader_rejects_duplicate_sample_columns() {
        let file = write_temp("gene\tS1\tS1\nTP53\t1\t2\n", ".tsv");
        let mut reader = ExpressionMatrixReader::new(file.path());
        let err = reader.do_before(&ctx()).unwrap_err();
        assert!(matches!(err, ImportError::InvalidSample(_)));
    }

    #[test]
    fn matrix_reader_rejects_short_header_and_bad_cells() {
        let file = write_temp("gene\nTP53\n", ".tsv");
        let mut reader = ExpressionMatrixReader::new(file.path());
        assert!(reader.do_before(&ctx()).is_err());

        let file = write_temp("gene\tS1\nTP53\thigh\n", ".tsv");
        let mut reader = ExpressionMatrixReader::new(file.path());
        reader.do_before(&ctx()).unwrap();
        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, ImportError::MalformedRecord { .. }));
    }
}
