//! Per-run import options.
//!
//! [`ImportOptions`] is a value object fixed for the duration of one run and
//! shared with every component through the
//! [`RunContext`](crate::context::RunContext). It can be built directly, via
//! the `with_*` methods, or parsed from the flat key/value configuration
//! surface (`temp-file-path`, `batch-size`, and the four skip flags).

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{ErrorCategory, ImportError};

/// Default batch size for batched repository writers. High-volume record
/// types (expression values, mutation calls) use this; low-volume metadata
/// types typically override it to 1.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Per-run toggles and tunables, immutable once a run starts.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Skip records that fail validation instead of aborting the run.
    pub skip_invalid_records: bool,
    /// Suppress invalid-sample failures instead of surfacing them.
    pub skip_invalid_samples: bool,
    /// Suppress invalid-data-source failures instead of surfacing them.
    pub skip_invalid_data_source: bool,
    /// Suppress invalid-gene failures instead of surfacing them.
    pub skip_invalid_genes: bool,
    /// Directory staged intermediate files are written into.
    pub temp_dir: PathBuf,
    /// Records buffered per bulk write.
    pub batch_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_invalid_records: false,
            skip_invalid_samples: false,
            skip_invalid_data_source: false,
            skip_invalid_genes: false,
            temp_dir: std::env::temp_dir(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ImportOptions {
    pub fn with_skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    pub fn with_skip_invalid_samples(mut self, skip: bool) -> Self {
        self.skip_invalid_samples = skip;
        self
    }

    pub fn with_skip_invalid_data_source(mut self, skip: bool) -> Self {
        self.skip_invalid_data_source = skip;
        self
    }

    pub fn with_skip_invalid_genes(mut self, skip: bool) -> Self {
        self.skip_invalid_genes = skip;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Parse options from a flat key/value map.
    ///
    /// Recognized keys: `temp-file-path`, `batch-size`,
    /// `skip-invalid-records`, `skip-invalid-samples`,
    /// `skip-invalid-data-source`, `skip-invalid-genes`. Unknown keys and
    /// unparsable values are configuration errors.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ImportError> {
        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "temp-file-path" => options.temp_dir = PathBuf::from(value),
                "batch-size" => {
                    let parsed: usize = value.parse().map_err(|_| {
                        ImportError::Configuration(format!("batch-size is not an integer: {value}"))
                    })?;
                    if parsed == 0 {
                        return Err(ImportError::Configuration(
                            "batch-size must be positive".into(),
                        ));
                    }
                    options.batch_size = parsed;
                }
                "skip-invalid-records" => options.skip_invalid_records = parse_bool(key, value)?,
                "skip-invalid-samples" => options.skip_invalid_samples = parse_bool(key, value)?,
                "skip-invalid-data-source" => {
                    options.skip_invalid_data_source = parse_bool(key, value)?
                }
                "skip-invalid-genes" => options.skip_invalid_genes = parse_bool(key, value)?,
                other => {
                    return Err(ImportError::Configuration(format!(
                        "unrecognized import option: {other}"
                    )));
                }
            }
        }
        Ok(options)
    }

    /// Whether an error of the given category should be suppressed under the
    /// active skip flags. Only the three named-entity categories are ever
    /// suppressible; everything else propagates.
    pub fn suppresses(&self, category: ErrorCategory) -> bool {
        match category {
            ErrorCategory::InvalidSample => self.skip_invalid_samples,
            ErrorCategory::InvalidDataSource => self.skip_invalid_data_source,
            ErrorCategory::InvalidGene => self.skip_invalid_genes,
            _ => false,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ImportError> {
    value.parse().map_err(|_| {
        ImportError::Configuration(format!("{key} expects true or false, got: {value}"))
    })
}
