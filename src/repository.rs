//! Store contracts consumed by the pipeline, plus an in-memory reference
//! implementation.
//!
//! The persistent store is an external collaborator: the pipeline only ever
//! talks to it through [`Repository`] (basic CRUD with bulk variants) and
//! [`RecordRepository`] (adds the delete-by-data-source capability rollback
//! depends on). [`MemoryRepository`] is the reference implementation used in
//! tests and small in-process deployments; it preserves insertion order and
//! keeps a log of bulk-call sizes so batching behavior is observable.

use std::sync::{Mutex, MutexGuard};

use crate::error::ImportError;
use crate::model::{ImportedRecord, Model};

/// CRUD contract over one record type.
///
/// Implementations are shared across components of a run (and potentially
/// across runs), so all methods take `&self`; interior mutability and
/// concurrency control are the store's concern.
pub trait Repository<T: Model>: Send + Sync {
    /// Insert a new record, assigning an id if absent. Duplicate ids are a
    /// hard error.
    fn insert(&self, record: T) -> Result<T, ImportError>;

    /// Update an existing record by id. A missing id or missing counterpart
    /// is a hard error.
    fn update(&self, record: T) -> Result<T, ImportError>;

    /// Delete a record by id.
    fn delete(&self, id: &str) -> Result<(), ImportError>;

    fn find_by_id(&self, id: &str) -> Result<Option<T>, ImportError>;

    fn exists(&self, id: &str) -> Result<bool, ImportError> {
        Ok(self.find_by_id(id)?.is_some())
    }

    fn count(&self) -> Result<u64, ImportError>;

    /// Insert a batch in submission order. The default delegates to
    /// [`insert`](Repository::insert) per record; stores with a native bulk
    /// path should override.
    fn insert_batch(&self, records: Vec<T>) -> Result<Vec<T>, ImportError> {
        records.into_iter().map(|r| self.insert(r)).collect()
    }

    /// Update a batch in submission order.
    fn update_batch(&self, records: Vec<T>) -> Result<Vec<T>, ImportError> {
        records.into_iter().map(|r| self.update(r)).collect()
    }

    /// Insert-or-update each record by id, in submission order.
    fn upsert_batch(&self, records: Vec<T>) -> Result<Vec<T>, ImportError> {
        records
            .into_iter()
            .map(|r| match r.id() {
                Some(id) if self.exists(id)? => self.update(r),
                _ => self.insert(r),
            })
            .collect()
    }
}

/// Store contract for records owned by a data source. The bulk delete is the
/// capability the rollback protocol is built on.
pub trait RecordRepository<T: ImportedRecord>: Repository<T> {
    fn find_by_data_source(&self, data_source_id: &str) -> Result<Vec<T>, ImportError>;

    /// Delete every record whose owning data source matches. Returns the
    /// number of records removed.
    fn delete_by_data_source(&self, data_source_id: &str) -> Result<u64, ImportError>;
}

#[derive(Debug)]
struct Inner<T> {
    records: Vec<T>,
    next_id: u64,
    bulk_sizes: Vec<usize>,
}

/// In-memory, insertion-ordered reference store.
///
/// Ids are monotonically assigned strings. Every bulk call records its size,
/// so tests can assert how many bulk writes a batched writer issued.
#[derive(Debug)]
pub struct MemoryRepository<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: Vec::new(),
                next_id: 0,
                bulk_sizes: Vec::new(),
            }),
        }
    }
}

impl<T: Model> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<MutexGuard<'_, Inner<T>>, ImportError> {
        self.inner
            .lock()
            .map_err(|_| ImportError::Store("repository lock poisoned".into()))
    }

    /// Snapshot of all records in insertion order.
    pub fn all(&self) -> Vec<T> {
        self.inner
            .lock()
            .map(|inner| inner.records.clone())
            .unwrap_or_default()
    }

    /// Sizes of every bulk call received so far, in call order.
    pub fn bulk_sizes(&self) -> Vec<usize> {
        self.inner
            .lock()
            .map(|inner| inner.bulk_sizes.clone())
            .unwrap_or_default()
    }

    fn insert_locked(inner: &mut Inner<T>, mut record: T) -> Result<T, ImportError> {
        match record.id() {
            Some(id) => {
                if inner.records.iter().any(|r| r.id() == Some(id)) {
                    return Err(ImportError::DuplicateKey(record.display()));
                }
            }
            None => {
                inner.next_id += 1;
                record.set_id(inner.next_id.to_string());
            }
        }
        inner.records.push(record.clone());
        Ok(record)
    }

    fn update_locked(inner: &mut Inner<T>, record: T) -> Result<T, ImportError> {
        let Some(id) = record.id() else {
            return Err(ImportError::MissingRecord(record.display()));
        };
        let Some(slot) = inner.records.iter_mut().find(|r| r.id() == Some(id)) else {
            return Err(ImportError::MissingRecord(record.display()));
        };
        *slot = record.clone();
        Ok(record)
    }
}

impl<T: Model> Repository<T> for MemoryRepository<T> {
    fn insert(&self, record: T) -> Result<T, ImportError> {
        let mut inner = self.locked()?;
        Self::insert_locked(&mut inner, record)
    }

    fn update(&self, record: T) -> Result<T, ImportError> {
        let mut inner = self.locked()?;
        Self::update_locked(&mut inner, record)
    }

    fn delete(&self, id: &str) -> Result<(), ImportError> {
        let mut inner = self.locked()?;
        let before = inner.records.len();
        inner.records.retain(|r| r.id() != Some(id));
        if inner.records.len() == before {
            return Err(ImportError::MissingRecord(id.to_string()));
        }
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<T>, ImportError> {
        let inner = self.locked()?;
        Ok(inner.records.iter().find(|r| r.id() == Some(id)).cloned())
    }

    fn count(&self) -> Result<u64, ImportError> {
        Ok(self.locked()?.records.len() as u64)
    }

    fn insert_batch(&self, records: Vec<T>) -> Result<Vec<T>, ImportError> {
        let mut inner = self.locked()?;
        inner.bulk_sizes.push(records.len());
        records
            .into_iter()
            .map(|r| Self::insert_locked(&mut inner, r))
            .collect()
    }

    fn update_batch(&self, records: Vec<T>) -> Result<Vec<T>, ImportError> {
        let mut inner = self.locked()?;
        inner.bulk_sizes.push(records.len());
        records
            .into_iter()
            .map(|r| Self::update_locked(&mut inner, r))
            .collect()
    }

    fn upsert_batch(&self, records: Vec<T>) -> Result<Vec<T>, ImportError> {
        let mut inner = self.locked()?;
        inner.bulk_sizes.push(records.len());
        records
            .into_iter()
            .map(|r| {
                let known = r
                    .id()
                    .map(|id| inner.records.iter().any(|e| e.id() == Some(id)))
                    .unwrap_or(false);
                if known {
                    Self::update_locked(&mut inner, r)
                } else {
                    Self::insert_locked(&mut inner, r)
                }
            })
            .collect()
    }
}

impl<T: ImportedRecord> RecordRepository<T> for MemoryRepository<T> {
    fn find_by_data_source(&self, data_source_id: &str) -> Result<Vec<T>, ImportError> {
        let inner = self.locked()?;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.data_source_id() == Some(data_source_id))
            .cloned()
            .collect())
    }

    fn delete_by_data_source(&self, data_source_id: &str) -> Result<u64, ImportError> {
        let mut inner = self.locked()?;
        let before = inner.records.len();
        inner
            .records
            .retain(|r| r.data_source_id() != Some(data_source_id));
        Ok((before - inner.records.len()) as u64)
    }
}
