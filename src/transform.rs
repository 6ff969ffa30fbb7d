//! Record transformers and filters.
//!
//! A [`RecordTransformer`] is a pure mapping applied to every record before
//! filtering and validation. Transform failures are structural: they mean a
//! programming assumption was violated, not that the data is low quality, so
//! the processor always aborts on them.
//!
//! A [`RecordFilter`] is a predicate: a `true` verdict drops the record
//! silently — logged at debug, not counted as written, not counted as an
//! error.

use crate::context::RunContext;
use crate::error::ImportError;
use crate::model::Model;

/// Pure per-record mapping, record in, record out.
pub trait RecordTransformer<T: Model> {
    fn do_before(&mut self, _ctx: &RunContext) -> Result<(), ImportError> {
        Ok(())
    }

    fn transform(&self, record: T) -> Result<T, ImportError>;

    fn do_after(&mut self) -> Result<(), ImportError> {
        Ok(())
    }
}

/// Adapts a closure into a [`RecordTransformer`].
pub struct FnTransformer<F>(F);

impl<F> FnTransformer<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<T, F> RecordTransformer<T> for FnTransformer<F>
where
    T: Model,
    F: Fn(T) -> Result<T, ImportError>,
{
    fn transform(&self, record: T) -> Result<T, ImportError> {
        (self.0)(record)
    }
}

/// Decides whether a record is dropped before validation.
pub trait RecordFilter<T: Model> {
    fn do_before(&mut self, _ctx: &RunContext) -> Result<(), ImportError> {
        Ok(())
    }

    /// `true` means the record is dropped silently.
    fn is_filterable(&self, record: &T) -> bool;

    fn do_after(&mut self) -> Result<(), ImportError> {
        Ok(())
    }
}

/// Adapts a closure into a [`RecordFilter`].
pub struct FnFilter<F>(F);

impl<F> FnFilter<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<T, F> RecordFilter<T> for FnFilter<F>
where
    T: Model,
    F: Fn(&T) -> bool,
{
    fn is_filterable(&self, record: &T) -> bool {
        (self.0)(record)
    }
}
