//! Record identity traits and the built-in domain record types.
//!
//! Anything flowing through the pipeline implements [`Model`]: it has a
//! string identity assigned either by the store on insert or pre-existing.
//! Records that are owned by an import run additionally implement
//! [`ImportedRecord`], carrying a reference to the [`DataSource`] that
//! produced them — this reference is what rollback uses to find and delete a
//! failed run's records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::validation::{validators, Validate, ValidationError, ValidationResult};

#[allow(unused_imports)]
use crate::metadata::DataSource;

/// Identity contract shared by every persistable type.
pub trait Model: Clone + fmt::Debug + Send + Sync + 'static {
    /// The persisted id, if any.
    fn id(&self) -> Option<&str>;

    /// Assign the store-issued id after insert.
    fn set_id(&mut self, id: String);

    /// Short human-readable form used in skip/abort log lines.
    fn display(&self) -> String {
        format!("{self:?}")
    }
}

/// A record owned by an import run, linked back to its data source.
pub trait ImportedRecord: Model {
    fn data_source_id(&self) -> Option<&str>;

    fn set_data_source_id(&mut self, id: String);
}

macro_rules! impl_imported_record {
    ($ty:ty, $display:expr) => {
        impl Model for $ty {
            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }

            fn set_id(&mut self, id: String) {
                self.id = Some(id);
            }

            fn display(&self) -> String {
                let render: fn(&$ty) -> String = $display;
                render(self)
            }
        }

        impl ImportedRecord for $ty {
            fn data_source_id(&self) -> Option<&str> {
                self.data_source_id.as_deref()
            }

            fn set_data_source_id(&mut self, id: String) {
                self.data_source_id = Some(id);
            }
        }
    };
}

/// One gene, as read from a gene-table file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gene {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub data_source_id: Option<String>,
    pub primary_symbol: String,
    #[serde(default)]
    pub entrez_id: Option<i64>,
    #[serde(default)]
    pub chromosome: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Gene {
    pub fn new(primary_symbol: impl Into<String>) -> Self {
        Self {
            id: None,
            data_source_id: None,
            primary_symbol: primary_symbol.into(),
            entrez_id: None,
            chromosome: None,
            aliases: Vec::new(),
        }
    }
}

impl_imported_record!(Gene, |gene| format!("Gene[{}]", gene.primary_symbol));

impl Validate for Gene {
    fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        if let Err(mut e) = validators::not_empty("primary_symbol", &self.primary_symbol) {
            errors.append(&mut e);
        } else if let Err(mut e) = validators::gene_symbol("primary_symbol", &self.primary_symbol) {
            errors.append(&mut e);
        }
        if let Some(entrez) = self.entrez_id {
            if entrez <= 0 {
                errors.push(ValidationError::field(
                    "entrez_id",
                    "must be a positive identifier",
                ));
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// One expression measurement: a single cell of a gene-by-sample matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneExpression {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub data_source_id: Option<String>,
    pub gene_symbol: String,
    pub sample_name: String,
    pub value: f64,
}

impl GeneExpression {
    pub fn new(
        gene_symbol: impl Into<String>,
        sample_name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            id: None,
            data_source_id: None,
            gene_symbol: gene_symbol.into(),
            sample_name: sample_name.into(),
            value,
        }
    }
}

impl_imported_record!(GeneExpression, |expression| format!(
    "GeneExpression[{}/{}]",
    expression.gene_symbol, expression.sample_name
));

impl Validate for GeneExpression {
    fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        if let Err(mut e) = validators::not_empty("gene_symbol", &self.gene_symbol) {
            errors.append(&mut e);
        }
        if let Err(mut e) = validators::not_empty("sample_name", &self.sample_name) {
            errors.append(&mut e);
        }
        if !self.value.is_finite() {
            errors.push(ValidationError::field("value", "must be a finite number"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// One somatic mutation call from a variant call file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationCall {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub data_source_id: Option<String>,
    pub gene_symbol: String,
    pub sample_name: String,
    pub chromosome: String,
    pub position: u64,
    pub reference_allele: String,
    pub alternate_allele: String,
    #[serde(default)]
    pub variant_classification: Option<String>,
}

impl MutationCall {
    pub fn new(
        gene_symbol: impl Into<String>,
        sample_name: impl Into<String>,
        chromosome: impl Into<String>,
        position: u64,
        reference_allele: impl Into<String>,
        alternate_allele: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            data_source_id: None,
            gene_symbol: gene_symbol.into(),
            sample_name: sample_name.into(),
            chromosome: chromosome.into(),
            position,
            reference_allele: reference_allele.into(),
            alternate_allele: alternate_allele.into(),
            variant_classification: None,
        }
    }
}

impl_imported_record!(MutationCall, |call| format!(
    "MutationCall[{} {}:{} {}>{}]",
    call.sample_name, call.chromosome, call.position, call.reference_allele, call.alternate_allele
));

impl Validate for MutationCall {
    fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        if let Err(mut e) = validators::not_empty("gene_symbol", &self.gene_symbol) {
            errors.append(&mut e);
        }
        if let Err(mut e) = validators::not_empty("sample_name", &self.sample_name) {
            errors.append(&mut e);
        }
        if let Err(mut e) = validators::not_empty("chromosome", &self.chromosome) {
            errors.append(&mut e);
        }
        if let Err(mut e) = validators::allele("reference_allele", &self.reference_allele) {
            errors.append(&mut e);
        }
        if let Err(mut e) = validators::allele("alternate_allele", &self.alternate_allele) {
            errors.append(&mut e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gene_validation_flags_bad_symbol_and_entrez() {
        let mut gene = Gene::new("tp53 oops");
        gene.entrez_id = Some(-7);
        let errors = gene.validate().unwrap_err();
        assert_eq!(errors.len(), 2);

        let mut gene = Gene::new("TP53");
        gene.entrez_id = Some(7157);
        assert!(gene.validate().is_ok());
    }

    #[test]
    fn expression_rejects_non_finite_values() {
        let expression = GeneExpression::new("TP53", "TCGA-A1-A0SB", f64::NAN);
        assert!(expression.validate().is_err());
        let expression = GeneExpression::new("TP53", "TCGA-A1-A0SB", 12.25);
        assert!(expression.validate().is_ok());
    }

    #[test]
    fn mutation_call_validates_alleles() {
        let call = MutationCall::new("TP53", "TCGA-A1-A0SB", "17", 7674220, "C", "T");
        assert!(call.validate().is_ok());

        // deletions are a single dash
        let call = MutationCall::new("TP53", "TCGA-A1-A0SB", "17", 7674220, "ACG", "-");
        assert!(call.validate().is_ok());

        let call = MutationCall::new("TP53", "TCGA-A1-A0SB", "17", 7674220, "C", "N");
        let errors = call.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field.as_deref(), Some("alternate_allele"));
    }

    #[test]
    fn display_names_the_record() {
        let gene = Gene::new("BRCA1");
        assert_eq!(gene.display(), "Gene[BRCA1]");
    }

    #[test]
    fn id_round_trip() {
        let mut gene = Gene::new("KRAS");
        assert!(gene.id().is_none());
        gene.set_id("17".into());
        assert_eq!(gene.id(), Some("17"));
        gene.set_data_source_id("ds-3".into());
        assert_eq!(gene.data_source_id(), Some("ds-3"));
    }
}
