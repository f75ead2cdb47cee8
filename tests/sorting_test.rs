//! Integration tests for sorted results, boosts and suggestions.

use std::sync::Arc;

use tessera::document::entry::{FieldValue, IndexEntryWriter};
use tessera::error::Result;
use tessera::index::config::IndexWriterConfig;
use tessera::index::fields::{IndexFieldBinding, IndexFieldsMapping};
use tessera::index::writer::IndexWriter;
use tessera::search::config::IndexSearcherConfig;
use tessera::search::matches::QueryMatch;
use tessera::search::searcher::IndexSearcher;
use tessera::search::sorting::OrderMetadata;
use tessera::search::sorting::spatial::SpatialUnits;
use tessera::storage::{StorageConfig, StorageEnvironment};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct City {
    name: &'static str,
    population: i64,
    location: Option<(f64, f64)>,
}

const CITIES: [City; 5] = [
    City { name: "paris", population: 2_100_000, location: Some((48.8566, 2.3522)) },
    City { name: "berlin", population: 3_600_000, location: Some((52.52, 13.405)) },
    City { name: "madrid", population: 3_300_000, location: Some((40.4168, -3.7038)) },
    City { name: "atlantis", population: 0, location: None },
    City { name: "vienna", population: 1_900_000, location: Some((48.2082, 16.3738)) },
];

/// Cities get entry ids 1..=5 in declaration order.
fn index_cities(env: &StorageEnvironment) -> Result<Arc<IndexFieldsMapping>> {
    let mut mapping = IndexFieldsMapping::new();
    mapping.add(IndexFieldBinding::new(0, "name"))?;
    mapping.add(IndexFieldBinding::new(1, "population"))?;
    mapping.add(IndexFieldBinding::new(2, "location"))?;
    let mapping = Arc::new(mapping);

    let mut writer = IndexWriter::new(env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    for city in &CITIES {
        let population = city.population.to_string();
        let mut doc = IndexEntryWriter::new();
        doc.write(0, FieldValue::Text(city.name.as_bytes()))?;
        doc.write(1, FieldValue::Tuple {
            text: population.as_bytes(),
            long: city.population,
            double: city.population as f64,
        })?;
        if let Some((latitude, longitude)) = city.location {
            doc.write(2, FieldValue::Spatial { latitude, longitude })?;
        }
        writer.index(&format!("cities/{}", city.name), &doc.finish())?;
    }
    writer.commit()?;
    Ok(mapping)
}

#[test]
fn test_sort_by_term_and_number() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = index_cities(&env)?;
    let searcher = IndexSearcher::new(&env, mapping);

    let mut by_name = searcher.order_by(searcher.all_entries(), OrderMetadata::term("name"))?;
    assert_eq!(by_name.collect_all()?, vec![4, 2, 3, 1, 5]);

    let mut by_name_desc = searcher.order_by(searcher.all_entries(), OrderMetadata::term("name").descending())?;
    assert_eq!(by_name_desc.collect_all()?, vec![5, 1, 3, 2, 4]);

    let mut by_population = searcher.order_by(searcher.all_entries(), OrderMetadata::long("population"))?;
    assert_eq!(by_population.collect_all()?, vec![4, 5, 1, 3, 2]);

    let mut by_double = searcher.order_by(
        searcher.all_entries(),
        OrderMetadata::double("population").descending(),
    )?;
    assert_eq!(by_double.collect_all()?, vec![2, 3, 1, 5, 4]);

    Ok(())
}

#[test]
fn test_small_sort_batches_merge() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = index_cities(&env)?;
    let searcher = IndexSearcher::new(&env, mapping)
        .with_config(IndexSearcherConfig::default().with_sort_batch_size(2))?;

    let mut sorted = searcher.order_by(searcher.all_entries(), OrderMetadata::long("population"))?;
    assert_eq!(sorted.collect_all()?, vec![4, 5, 1, 3, 2]);

    assert!(
        IndexSearcherConfig::default()
            .with_sort_batch_size(0)
            .validate()
            .is_err()
    );

    Ok(())
}

#[test]
fn test_sort_by_distance() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = index_cities(&env)?;
    let searcher = IndexSearcher::new(&env, mapping);

    // From Munich: Vienna, Berlin, Paris, Madrid; Atlantis has no point.
    let order = OrderMetadata::spatial("location", 48.1351, 11.582, 0.0, SpatialUnits::Kilometers);
    let mut nearest = searcher.order_by(searcher.all_entries(), order.clone())?;
    assert_eq!(nearest.collect_all()?, vec![5, 2, 1, 3, 4]);

    let mut farthest = searcher.order_by(searcher.all_entries(), order.descending())?;
    assert_eq!(farthest.collect_all()?, vec![3, 1, 2, 5, 4]);

    let invalid = OrderMetadata::spatial("location", 123.0, 0.0, 0.0, SpatialUnits::Miles);
    assert!(searcher.order_by(searcher.all_entries(), invalid).is_err());

    Ok(())
}

#[test]
fn test_random_sort_is_seeded() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = index_cities(&env)?;
    let searcher = IndexSearcher::new(&env, mapping);

    let first = searcher
        .order_by(searcher.all_entries(), OrderMetadata::random(7))?
        .collect_all()?;
    let second = searcher
        .order_by(searcher.all_entries(), OrderMetadata::random(7))?
        .collect_all()?;
    assert_eq!(first, second);

    let mut sorted = first.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3, 4, 5]);

    Ok(())
}

#[test]
fn test_document_boosts_drive_score_sort() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mut mapping = IndexFieldsMapping::new();
    mapping.add(IndexFieldBinding::new(0, "kind"))?;
    let mapping = Arc::new(mapping);

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    for (entry_id, boost) in [(1u64, 1.0f32), (2, 4.0), (3, 2.0)] {
        let mut doc = IndexEntryWriter::new();
        doc.write(0, FieldValue::Text(b"post"))?;
        let data = doc.finish();
        let mut builder = writer.entry_builder(entry_id, &format!("posts/{entry_id}"), &data)?;
        builder.write(0, b"post")?;
        builder.boost(boost)?;
        builder.finish()?;
    }
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    assert!(searcher.documents_are_boosted());

    let mut by_score = searcher.order_by(searcher.term_query("kind", "post")?, OrderMetadata::score())?;
    assert_eq!(by_score.collect_all()?, vec![2, 3, 1]);

    let mut reversed = searcher.order_by(
        searcher.term_query("kind", "post")?,
        OrderMetadata::score().descending(),
    )?;
    assert_eq!(reversed.collect_all()?, vec![1, 3, 2]);

    assert!(searcher.boost(searcher.all_entries(), -1.0).is_err());

    Ok(())
}

#[test]
fn test_alphanumeric_sort() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mut mapping = IndexFieldsMapping::new();
    mapping.add(IndexFieldBinding::new(0, "file"))?;
    let mapping = Arc::new(mapping);

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    for name in ["file10", "file2", "file1"] {
        let mut doc = IndexEntryWriter::new();
        doc.write(0, FieldValue::Text(name.as_bytes()))?;
        writer.index(name, &doc.finish())?;
    }
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    let mut natural = searcher.order_by(searcher.all_entries(), OrderMetadata::alphanumeric("file"))?;
    assert_eq!(natural.collect_all()?, vec![3, 2, 1]);

    let mut bytewise = searcher.order_by(searcher.all_entries(), OrderMetadata::term("file"))?;
    assert_eq!(bytewise.collect_all()?, vec![3, 1, 2]);

    Ok(())
}

#[test]
fn test_suggestions() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mut mapping = IndexFieldsMapping::new();
    mapping.add(IndexFieldBinding::new(0, "query").suggestions(true))?;
    let mapping = Arc::new(mapping);

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    for (i, text) in ["rust", "rusty", "rust", "ruby", "rust", "rusty"].iter().enumerate() {
        let mut doc = IndexEntryWriter::new();
        doc.write(0, FieldValue::Text(text.as_bytes()))?;
        writer.index(&format!("queries/{i}"), &doc.finish())?;
    }
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    assert_eq!(
        searcher.suggest("query", "rus", 10),
        vec![("rust".to_string(), 3), ("rusty".to_string(), 2)]
    );
    assert_eq!(searcher.suggest("query", "ru", 1), vec![("rust".to_string(), 3)]);
    assert!(searcher.suggest("query", "go", 10).is_empty());

    Ok(())
}
