//! Import metadata records.
//!
//! A [`DataSource`] describes one imported file, a [`DataSet`] groups data
//! sources and samples into a logical project, and a [`Sample`] describes a
//! biological specimen discovered while reading sample-aware file formats.
//! These exist independently of any single run; the processor looks them up
//! (or creates them) before a run and mutates linkage afterwards.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::model::Model;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Metadata for one imported file: path, declared record type, and lifecycle
/// timestamps. Referenced by rollback to identify which records to delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub data_set_id: Option<String>,
    pub source_path: String,
    /// Declared record type, e.g. `gene`, `gene-expression`, `mutation`.
    pub record_type: String,
    pub created_at: u64,
    pub updated_at: u64,
}

impl DataSource {
    pub fn new(source_path: impl Into<String>, record_type: impl Into<String>) -> Self {
        let now = now_secs();
        Self {
            id: None,
            data_set_id: None,
            source_path: source_path.into(),
            record_type: record_type.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_secs();
    }
}

impl Model for DataSource {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn display(&self) -> String {
        format!("DataSource[{} ({})]", self.source_path, self.record_type)
    }
}

/// A logical grouping of data sources and samples, e.g. one study or project.
///
/// Linkage lists have append-if-absent set semantics: re-linking the same id
/// is a no-op, never a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSet {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Short stable identifier used in staged-file names.
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub data_source_ids: Vec<String>,
    #[serde(default)]
    pub sample_ids: Vec<String>,
}

impl DataSet {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            slug: slug.into(),
            name: name.into(),
            data_source_ids: Vec::new(),
            sample_ids: Vec::new(),
        }
    }

    /// Append a data source id if absent. Returns whether the list changed.
    pub fn add_data_source(&mut self, id: &str) -> bool {
        if self.data_source_ids.iter().any(|existing| existing == id) {
            return false;
        }
        self.data_source_ids.push(id.to_string());
        true
    }

    /// Append a sample id if absent. Returns whether the list changed.
    pub fn add_sample(&mut self, id: &str) -> bool {
        if self.sample_ids.iter().any(|existing| existing == id) {
            return false;
        }
        self.sample_ids.push(id.to_string());
        true
    }
}

impl Model for DataSet {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn display(&self) -> String {
        format!("DataSet[{}]", self.slug)
    }
}

/// A biological specimen, discovered by sample-aware readers (e.g. the column
/// headers of an expression matrix) and persisted if not yet known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub tissue: Option<String>,
    #[serde(default)]
    pub histology: Option<String>,
    #[serde(default)]
    pub data_set_id: Option<String>,
}

impl Sample {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            tissue: None,
            histology: None,
            data_set_id: None,
        }
    }
}

impl Model for Sample {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn display(&self) -> String {
        format!("Sample[{}]", self.name)
    }
}
