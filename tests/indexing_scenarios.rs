//! Integration tests for indexing and persisted postings shapes.

use std::sync::Arc;

use tessera::document::entry::{FieldValue, IndexEntryWriter};
use tessera::error::{Result, TesseraError};
use tessera::index::config::IndexWriterConfig;
use tessera::index::fields::{FieldIndexingMode, IndexFieldBinding, IndexFieldsMapping};
use tessera::index::postings::PostingList;
use tessera::index::stored::StoredValue;
use tessera::index::writer::IndexWriter;
use tessera::search::matches::QueryMatch;
use tessera::search::searcher::IndexSearcher;
use tessera::storage::{StorageConfig, StorageEnvironment};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mapping(bindings: Vec<IndexFieldBinding>) -> Result<Arc<IndexFieldsMapping>> {
    let mut mapping = IndexFieldsMapping::new();
    for binding in bindings {
        mapping.add(binding)?;
    }
    Ok(Arc::new(mapping))
}

fn text_doc(field_id: u32, value: &str) -> Result<Vec<u8>> {
    let mut doc = IndexEntryWriter::new();
    doc.write(field_id, FieldValue::Text(value.as_bytes()))?;
    Ok(doc.finish())
}

#[test]
fn test_single_entry_term_query() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![IndexFieldBinding::new(0, "status")])?;

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    writer.index_entry(100, "users/100", &text_doc(0, "active")?)?;
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    assert_eq!(searcher.term_query("status", "active")?.collect_all()?, vec![100]);
    assert_eq!(
        searcher.term_postings("status", b"active"),
        Some(PostingList::Single(100))
    );
    assert!(searcher.term_query("status", "inactive")?.collect_all()?.is_empty());
    assert_eq!(searcher.entry_key(100)?.as_deref(), Some("users/100"));

    Ok(())
}

#[test]
fn test_five_entries_use_small_postings() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![IndexFieldBinding::new(0, "tag")])?;

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    for i in 1..=5 {
        writer.index(&format!("items/{i}"), &text_doc(0, "x")?)?;
    }
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    assert!(matches!(
        searcher.term_postings("tag", b"x"),
        Some(PostingList::Small(_))
    ));
    assert_eq!(searcher.term_query("tag", "x")?.collect_all()?, vec![1, 2, 3, 4, 5]);
    assert_eq!(searcher.number_of_documents_under_specific_term("tag", "x")?, 5);

    Ok(())
}

#[test]
fn test_tuple_values_answer_long_and_double_ranges() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![IndexFieldBinding::new(0, "n")])?;

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    let mut doc = IndexEntryWriter::new();
    doc.write(0, FieldValue::Tuple { text: b"10", long: 10, double: 10.0 })?;
    writer.index("numbers/1", &doc.finish())?;
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    assert_eq!(searcher.between_query("n", 5i64, 15i64)?.collect_all()?, vec![1]);
    assert_eq!(searcher.between_query("n", 5.0, 15.0)?.collect_all()?, vec![1]);
    assert!(searcher.between_query("n", 11i64, 15i64)?.collect_all()?.is_empty());
    assert_eq!(searcher.long_query("n", 10)?.collect_all()?, vec![1]);
    assert_eq!(searcher.double_query("n", 10.0)?.collect_all()?, vec![1]);
    assert_eq!(searcher.term_query("n", "10")?.collect_all()?, vec![1]);

    Ok(())
}

#[test]
fn test_postings_upgrade_across_commits() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![IndexFieldBinding::new(0, "tag")])?;
    let doc = text_doc(0, "grow")?;

    let mut expected = Vec::new();
    let mut next_id = 1u64;
    let mut commit_up_to = |total: u64, expected: &mut Vec<u64>| -> Result<()> {
        let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
        while next_id <= total {
            writer.index_entry(next_id, &format!("items/{next_id}"), &doc)?;
            expected.push(next_id);
            next_id += 1;
        }
        writer.commit()?;
        Ok(())
    };

    commit_up_to(1, &mut expected)?;
    let searcher = IndexSearcher::new(&env, Arc::clone(&mapping));
    assert_eq!(searcher.term_postings("tag", b"grow"), Some(PostingList::Single(1)));

    commit_up_to(3, &mut expected)?;
    let searcher = IndexSearcher::new(&env, Arc::clone(&mapping));
    assert!(matches!(searcher.term_postings("tag", b"grow"), Some(PostingList::Small(_))));
    assert_eq!(searcher.term_query("tag", "grow")?.collect_all()?, expected);

    commit_up_to(50, &mut expected)?;
    let searcher = IndexSearcher::new(&env, Arc::clone(&mapping));
    assert!(matches!(searcher.term_postings("tag", b"grow"), Some(PostingList::Set(_))));
    assert_eq!(searcher.term_query("tag", "grow")?.collect_all()?, expected);
    assert_eq!(expected.len(), 50);

    Ok(())
}

#[test]
fn test_search_mode_field_is_analyzed() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![IndexFieldBinding::search(0, "title")])?;

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    writer.index("books/1", &text_doc(0, "The Quick Brown Fox")?)?;
    writer.index("books/2", &text_doc(0, "A quick study")?)?;
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    assert_eq!(searcher.term_query("title", "QUICK")?.collect_all()?, vec![1, 2]);
    assert_eq!(searcher.term_query("title", "fox")?.collect_all()?, vec![1]);
    // A multi-token query value is not a single term.
    assert!(searcher.term_query("title", "the quick").is_err());

    let terms = searcher.entry_terms(1)?.expect("entry terms");
    let title = terms.field("title").expect("title terms");
    assert!(title.contains_term(b"brown"));
    assert!(!title.contains_term(b"Brown"));

    Ok(())
}

#[test]
fn test_null_and_empty_values() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![IndexFieldBinding::new(0, "nick")])?;

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    let mut doc = IndexEntryWriter::new();
    doc.write(0, FieldValue::Null)?;
    writer.index("users/1", &doc.finish())?;
    writer.index("users/2", &text_doc(0, "")?)?;
    writer.index("users/3", &text_doc(0, "neo")?)?;
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    assert_eq!(searcher.null_query("nick")?.collect_all()?, vec![1]);
    assert_eq!(searcher.exists("nick").collect_all()?, vec![1, 2, 3]);
    // Sentinel terms never fall inside value ranges.
    assert_eq!(searcher.greater_than_or_equal("nick", "a")?.collect_all()?, vec![3]);
    assert_eq!(searcher.less_than("nick", "zzz")?.collect_all()?, vec![3]);

    Ok(())
}

#[test]
fn test_reserved_prefix_values_rejected() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![
        IndexFieldBinding::new(0, "nick"),
        IndexFieldBinding::new(1, "raw").with_mode(FieldIndexingMode::Search),
    ])?;

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    for value in [&b"\xFFNULL_VALUE"[..], b"\xFFzz"] {
        let mut doc = IndexEntryWriter::new();
        doc.write(0, FieldValue::Text(value))?;
        let err = writer.index("users/bad", &doc.finish()).unwrap_err();
        assert!(matches!(err, TesseraError::InvalidOperation(_)));
    }
    let mut doc = IndexEntryWriter::new();
    doc.write(1, FieldValue::Text(b"\xFFzz"))?;
    let err = writer.index("users/bad", &doc.finish()).unwrap_err();
    assert!(matches!(err, TesseraError::InvalidOperation(_)));
    writer.rollback();

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    let id = writer.index("users/1", &text_doc(0, "neo")?)?;
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    assert!(searcher.null_query("nick")?.collect_all()?.is_empty());
    assert_eq!(searcher.greater_than_or_equal("nick", "\0")?.collect_all()?, vec![id]);
    assert!(matches!(
        searcher.term_query("nick", b"\xFFNULL_VALUE"),
        Err(TesseraError::InvalidOperation(_))
    ));

    Ok(())
}

#[test]
fn test_stored_fields_keep_list_order() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![
        IndexFieldBinding::new(0, "tags").stored(true),
        IndexFieldBinding::new(1, "plain"),
    ])?;

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    let mut doc = IndexEntryWriter::new();
    doc.write_list(0, &[FieldValue::Text(b"rust"), FieldValue::Text(b"db")])?;
    doc.write(1, FieldValue::Text(b"hidden"))?;
    let id = writer.index("posts/1", &doc.finish())?;
    writer.commit()?;

    let searcher = IndexSearcher::new(&env, mapping);
    let stored = searcher.stored_values(id, "tags")?.expect("stored tags");
    assert!(stored.is_list);
    assert_eq!(
        stored.values,
        vec![
            StoredValue::Term(b"rust".to_vec()),
            StoredValue::Term(b"db".to_vec())
        ]
    );
    assert_eq!(searcher.stored_values(id, "plain")?, None);
    assert_eq!(searcher.term_query("tags", "db")?.collect_all()?, vec![id]);

    Ok(())
}

#[test]
fn test_rollback_discards_batch() -> Result<()> {
    init();
    let env = StorageEnvironment::new(StorageConfig::default());
    let mapping = mapping(vec![IndexFieldBinding::new(0, "status")])?;

    let mut writer = IndexWriter::new(&env, Arc::clone(&mapping), IndexWriterConfig::default())?;
    writer.index("users/1", &text_doc(0, "active")?)?;
    writer.rollback();

    let searcher = IndexSearcher::new(&env, mapping);
    assert_eq!(searcher.number_of_entries(), 0);
    assert!(searcher.term_query("status", "active")?.collect_all()?.is_empty());

    Ok(())
}
