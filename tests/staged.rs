// tests/staged.rs

use anyhow::Result;
use oncoload::testing::*;
use oncoload::*;
use std::sync::Arc;

struct Stores {
    expressions: Arc<MemoryRepository<GeneExpression>>,
    data_sources: Arc<MemoryRepository<DataSource>>,
    data_sets: Arc<MemoryRepository<DataSet>>,
}

fn stores() -> Stores {
    Stores {
        expressions: Arc::new(MemoryRepository::new()),
        data_sources: Arc::new(MemoryRepository::new()),
        data_sets: Arc::new(MemoryRepository::new()),
    }
}

fn seeded(stores: &Stores) -> Result<(DataSource, DataSet)> {
    let data_source = stores
        .data_sources
        .insert(DataSource::new("expr.tsv", "gene-expression"))?;
    let data_set = stores
        .data_sets
        .insert(DataSet::new("ccle-expr", "CCLE Expression"))?;
    Ok((data_source, data_set))
}

fn expressions(n: usize) -> Vec<GeneExpression> {
    (0..n)
        .map(|i| GeneExpression::new(format!("G{i}"), "TCGA-A1-A0SB", i as f64))
        .collect()
}

#[test]
fn staged_write_then_bulk_import() -> Result<()> {
    let staging = TempStagingDir::new()?;
    let stores = stores();
    let (data_source, data_set) = seeded(&stores)?;

    let mut processor = Processor::builder()
        .reader(VecReader::new(expressions(5)))
        .writer(StagedFileWriter::<GeneExpression>::new(
            StagedFormat::delimited(),
        ))
        .importer(FileImporter::new(
            stores.expressions.clone(),
            StagedFormat::delimited(),
        ))
        .record_repository(stores.expressions.clone())
        .data_source_repository(stores.data_sources.clone())
        .data_set_repository(stores.data_sets.clone())
        .build()?;

    processor.configure(
        data_source,
        data_set,
        ImportOptions::default()
            .with_temp_dir(staging.path())
            .with_batch_size(2),
    )?;
    let summary = processor.run()?;

    assert_eq!(summary.state, RunState::Succeeded);
    assert_eq!(summary.records_written, 5);

    // records reached the store through the bulk loader, not the writer
    assert_eq!(stores.expressions.count()?, 5);
    assert_eq!(stores.expressions.bulk_sizes(), vec![2, 2, 1]);
    assert!(stores
        .expressions
        .all()
        .iter()
        .all(|r| r.data_source_id() == Some(summary.data_source_id.as_str())));

    // the staged file has a deterministic, rerun-stable name
    let staged = staging.path().join("ccle-expr.gene-expression.tmp");
    assert!(staged.exists());
    Ok(())
}

#[test]
fn staged_jsonl_round_trip() -> Result<()> {
    let staging = TempStagingDir::new()?;
    let stores = stores();
    let (data_source, data_set) = seeded(&stores)?;

    let mut processor = Processor::builder()
        .reader(VecReader::new(expressions(3)))
        .writer(StagedFileWriter::<GeneExpression>::new(StagedFormat::JsonLines))
        .importer(FileImporter::new(
            stores.expressions.clone(),
            StagedFormat::JsonLines,
        ))
        .record_repository(stores.expressions.clone())
        .data_source_repository(stores.data_sources.clone())
        .data_set_repository(stores.data_sets.clone())
        .build()?;

    processor.configure(
        data_source,
        data_set,
        ImportOptions::default().with_temp_dir(staging.path()),
    )?;
    processor.run()?;

    let stored = stores.expressions.all();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|r| r.id().is_some()));
    Ok(())
}

#[test]
fn failed_bulk_import_rolls_back() -> Result<()> {
    let staging = TempStagingDir::new()?;
    let stores = stores();
    let (data_source, data_set) = seeded(&stores)?;
    let data_source_id = data_source.id.clone().unwrap();

    let mut processor = Processor::builder()
        .reader(VecReader::new(expressions(4)))
        .writer(StagedFileWriter::<GeneExpression>::new(
            StagedFormat::delimited(),
        ))
        .importer(FailingImporter)
        .record_repository(stores.expressions.clone())
        .data_source_repository(stores.data_sources.clone())
        .data_set_repository(stores.data_sets.clone())
        .build()?;

    processor.configure(
        data_source,
        data_set,
        ImportOptions::default().with_temp_dir(staging.path()),
    )?;
    let err = processor.run().unwrap_err();
    assert!(matches!(err, ImportError::BulkImport { .. }));
    assert_eq!(processor.state(), RunState::Failed);

    assert_eq!(stores.expressions.count()?, 0);
    assert!(!stores.data_sources.exists(&data_source_id)?);
    Ok(())
}

#[test]
fn mid_run_write_failure_rolls_back() -> Result<()> {
    let stores = stores();
    let (data_source, data_set) = seeded(&stores)?;
    let data_source_id = data_source.id.clone().unwrap();

    let mut processor = Processor::builder()
        .reader(VecReader::new(expressions(4)))
        .writer(FailingWriter::<GeneExpression>::after(2))
        .record_repository(stores.expressions.clone())
        .data_source_repository(stores.data_sources.clone())
        .data_set_repository(stores.data_sets.clone())
        .build()?;

    processor.configure(data_source, data_set, ImportOptions::default())?;
    let err = processor.run().unwrap_err();
    assert!(matches!(err, ImportError::Store(_)));
    assert!(!stores.data_sources.exists(&data_source_id)?);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_source_is_read_transparently() -> Result<()> {
    let plain = mock_delimited_file(
        &["gene_symbol", "sample_name", "value"],
        &[
            &["TP53", "TCGA-A1-A0SB", "1.5"],
            &["KRAS", "TCGA-A1-A0SB", "0.25"],
        ],
        '\t',
    )?;
    let compressed = gzip_fixture(plain.path())?;

    let stores = stores();
    let (data_source, data_set) = seeded(&stores)?;

    let mut processor = Processor::builder()
        .reader(DelimitedRecordReader::<GeneExpression>::new(
            compressed.path(),
        ))
        .writer(RepositoryWriter::new(
            stores.expressions.clone(),
            WriteMode::Insert,
        ))
        .validator(ModelValidator)
        .record_repository(stores.expressions.clone())
        .data_source_repository(stores.data_sources.clone())
        .data_set_repository(stores.data_sets.clone())
        .build()?;

    processor.configure(data_source, data_set, ImportOptions::default())?;
    let summary = processor.run()?;
    assert_eq!(summary.records_written, 2);
    Ok(())
}
