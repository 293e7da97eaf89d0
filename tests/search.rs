use std::collections::{BTreeMap, BTreeSet};

use encrypted_index::{
    base::{lookup_table_from_json, lookup_table_to_json, LookupTable},
    builder::RawDocument,
    error::Error,
    normalizer::DefaultNormalizer,
    storage::IndexStorage,
    BlobContent, EncryptedIndex, EncryptedSearch, IndexOptions,
};
use helpers::{
    index::{expected_conjunction, TestIndex},
    store::MockStore,
};
use rstest::rstest;

/// Initialize the logger
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn upload(index: &EncryptedIndex, cutoff: usize, store: &mut MockStore) -> LookupTable {
    let mut storage = IndexStorage::new(index, cutoff).unwrap();
    storage.upload_all(store).unwrap().clone()
}

fn three_documents() -> (LookupTable, MockStore) {
    let documents = vec![
        RawDocument::new("d1", "cat mat"),
        RawDocument::new("d2", "cat hat"),
        RawDocument::new("d3", "hat mat"),
    ];
    let index = EncryptedIndex::build(
        &documents,
        &DefaultNormalizer,
        IndexOptions { s: 2, locality: 1 },
    )
    .unwrap();

    let mut store = MockStore::new();
    let lookup_table = upload(&index, 1000, &mut store);
    (lookup_table, store)
}

#[rstest]
#[case("cat", &["d1", "d2"])]
#[case("hat", &["d2", "d3"])]
#[case("Mat!", &["d1", "d3"])]
#[case("cat hat", &["d2"])]
#[case("cat hat mat", &[])]
#[case("cat dog", &[])]
#[case("the", &[])]
fn test_three_documents(#[case] query: &str, #[case] expected: &[&str]) {
    init_logger();
    let (lookup_table, store) = three_documents();
    let mut search = EncryptedSearch::new(vec![lookup_table]).unwrap();

    assert_eq!(search.search(&store, query).unwrap(), set(expected));
}

#[test]
fn test_two_phases() {
    let (lookup_table, store) = three_documents();
    let mut search = EncryptedSearch::new(vec![lookup_table]).unwrap();

    let references = search.lookup("cat");
    assert!(!references.is_empty());

    let fetched: BTreeMap<String, BlobContent> = references
        .iter()
        .map(|r| (r.clone(), store.content(r)))
        .collect();
    assert_eq!(search.locate(&fetched).unwrap(), set(&["d1", "d2"]));

    // A new lookup discards the previous query
    assert!(search.lookup("dog").is_empty());
    assert!(search.locate(&fetched).unwrap().is_empty());

    search.lookup("hat");
    assert!(matches!(
        search.locate(&BTreeMap::new()),
        Err(Error::MissingBlob(_))
    ));
}

#[test]
fn test_lookup_table_hand_off() {
    let (lookup_table, store) = three_documents();

    let json = lookup_table_to_json(&lookup_table).unwrap();
    let restored = lookup_table_from_json(&json).unwrap();
    assert_eq!(restored, lookup_table);

    let mut search = EncryptedSearch::new(vec![restored]).unwrap();
    assert_eq!(search.search(&store, "mat").unwrap(), set(&["d1", "d3"]));
}

#[rstest]
#[case(100)]
#[case(400)]
#[case(100_000)]
fn test_several_scopes(#[case] cutoff: usize) {
    init_logger();
    let first = TestIndex::new(60, 100, 5., 10, Some(10), IndexOptions::default());
    let second = TestIndex::new(60, 100, 5., 10, Some(20), IndexOptions { s: 3, locality: 2 });

    let mut store = MockStore::new();
    let tables = vec![
        upload(&first.index, cutoff, &mut store),
        upload(&second.index, cutoff, &mut store),
    ];
    let mut search = EncryptedSearch::new(tables).unwrap();

    let mut expected = first.inverted_index.clone();
    for (keyword, doc_ids) in &second.inverted_index {
        expected
            .entry(keyword.clone())
            .or_default()
            .extend(doc_ids.iter().cloned());
    }

    for query in [&["w1"][..], &["w2", "w3"], &["w4", "w5", "w6"], &["w7", "nothing"]] {
        assert_eq!(
            search.search(&store, &query.join(" ")).unwrap(),
            expected_conjunction(&expected, query),
            "Query {:?}",
            query
        );
    }
}
