//! Run-scoped metadata bundle handed to every component.
//!
//! [`RunContext`] replaces runtime capability discovery: instead of probing
//! each component for metadata setters, the processor passes one context to
//! every `do_before` hook and each component reads only the fields it
//! consumes.

use std::path::PathBuf;
use std::sync::Arc;

use crate::metadata::{DataSet, DataSource};
use crate::options::ImportOptions;

/// Immutable view of one run's bindings: options, the data source being
/// imported, and the data set it belongs to. Both metadata records are
/// guaranteed to carry persisted ids by the time a context exists.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub options: Arc<ImportOptions>,
    pub data_source: DataSource,
    pub data_set: DataSet,
}

impl RunContext {
    pub fn data_source_id(&self) -> &str {
        self.data_source.id.as_deref().unwrap_or_default()
    }

    pub fn data_set_id(&self) -> &str {
        self.data_set.id.as_deref().unwrap_or_default()
    }

    /// Deterministic staged-file path for this run:
    /// `temp_dir/{dataset-slug}.{record-type}.tmp`.
    ///
    /// Re-running the same data set and record type overwrites the previous
    /// staged file; the design deliberately keeps no history, which also
    /// means concurrent staged runs must not share a temp directory.
    pub fn staged_path(&self) -> PathBuf {
        self.options.temp_dir.join(format!(
            "{}.{}.tmp",
            self.data_set.slug, self.data_source.record_type
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_path_is_deterministic() {
        let mut data_source = DataSource::new("/data/expr.tsv", "gene-expression");
        data_source.id = Some("ds-1".into());
        let mut data_set = DataSet::new("tcga-brca", "TCGA Breast");
        data_set.id = Some("set-1".into());
        let ctx = RunContext {
            options: Arc::new(ImportOptions::default().with_temp_dir("/var/tmp")),
            data_source,
            data_set,
        };
        assert_eq!(
            ctx.staged_path(),
            PathBuf::from("/var/tmp/tcga-brca.gene-expression.tmp")
        );
        assert_eq!(ctx.data_source_id(), "ds-1");
    }
}
