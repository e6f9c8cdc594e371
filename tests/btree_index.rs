//! End-to-end tests over built index directories.
//!
//! Each test builds a real index into a temp directory, reopens it through
//! the public API, and verifies lookup behavior against the in-memory
//! mapping it was built from.

use dixi::index::{open_index_dir, save_index_dir, BtreeIndex, IndexedWords};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

/// Build `words` into a fresh index directory and reopen it
fn build_and_open(words: &IndexedWords) -> (TempDir, Arc<BtreeIndex>) {
    let dir = TempDir::new().expect("failed to create temp dir");
    save_index_dir(words, dir.path()).expect("failed to build index");
    let (index, _meta) = open_index_dir(dir.path()).expect("failed to reopen index");
    (dir, index)
}

#[test]
fn test_empty_index() {
    let words = IndexedWords::new();
    let (_dir, index) = build_and_open(&words);

    assert!(index.find_articles("anything").unwrap().is_empty());

    let request = index.prefix_match("a", 100);
    request.wait();
    assert!(request.error().is_none());
    assert!(request.matches().is_empty());

    let stats = index.stats().unwrap();
    assert_eq!(stats.depth, 1);
    assert_eq!(stats.leaf_count, 1);
    assert_eq!(stats.key_count, 0);
}

#[test]
fn test_single_key_exact_lookup() {
    let mut words = IndexedWords::new();
    words.add_single_word("apple", 0x10);
    let (_dir, index) = build_and_open(&words);

    // Case differences fold away; antialias keeps the case-insensitive match
    let links = index.find_articles("Apple").unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].word, "apple");
    assert_eq!(links[0].article_offset, 0x10);

    assert!(index.find_articles("apples").unwrap().is_empty());
    assert!(index.find_articles("appl").unwrap().is_empty());
}

#[test]
fn test_round_trip_all_keys() {
    let mut words = IndexedWords::new();
    for n in 0..500u32 {
        words.add_single_word(&format!("word{n:04}"), n);
    }
    let (_dir, index) = build_and_open(&words);

    for n in 0..500u32 {
        let headword = format!("word{n:04}");
        let links = index.find_articles(&headword).unwrap();
        assert_eq!(links.len(), 1, "missing {headword}");
        assert_eq!(links[0].word, headword);
        assert_eq!(links[0].article_offset, n);
    }
}

#[test]
fn test_chains_preserve_insertion_order() {
    let mut words = IndexedWords::new();
    words.add_single_word("echo", 30);
    words.add_single_word("echo", 10);
    words.add_single_word("echo", 20);
    let (_dir, index) = build_and_open(&words);

    let offsets: Vec<_> = index
        .find_articles("echo")
        .unwrap()
        .iter()
        .map(|link| link.article_offset)
        .collect();
    assert_eq!(offsets, vec![30, 10, 20]);
}

#[test]
fn test_two_level_tree_prefix_scan() {
    // 100 keys force an inner root (branching factor clamps to 64), so the
    // k50..k59 range spans several leaves
    let mut words = IndexedWords::new();
    for n in 0..100u32 {
        words.add_single_word(&format!("k{n:02}"), n);
    }
    let (_dir, index) = build_and_open(&words);

    let stats = index.stats().unwrap();
    assert_eq!(stats.depth, 2);
    assert_eq!(stats.key_count, 100);

    let request = index.prefix_match("k5", 100);
    request.wait();
    assert!(request.error().is_none());

    let expected: Vec<String> = (50..60).map(|n| format!("k{n}")).collect();
    assert_eq!(request.matches(), expected);
}

#[test]
fn test_prefix_scan_crosses_leaves() {
    // 200 keys sharing a prefix across a 64-way tree: the scan must follow
    // next-leaf links to gather them all, in ascending folded order
    let mut words = IndexedWords::new();
    for n in 0..200u32 {
        words.add_single_word(&format!("shared{n:03}"), n);
    }
    let (_dir, index) = build_and_open(&words);

    let stats = index.stats().unwrap();
    assert!(stats.leaf_count > 1, "test needs a multi-leaf tree");

    let request = index.prefix_match("shared", 500);
    request.wait();
    assert!(request.error().is_none());

    let matches = request.matches();
    assert_eq!(matches.len(), 200);
    let expected: Vec<String> = (0..200).map(|n| format!("shared{n:03}")).collect();
    assert_eq!(matches, expected);
}

#[test]
fn test_leaf_linkage_visits_every_key_once() {
    let mut words = IndexedWords::new();
    for n in 0..1000u32 {
        words.add_single_word(&format!("entry{n:04}"), n);
    }
    let (_dir, index) = build_and_open(&words);

    // stats() walks the leaf linked list front to back; key_count only adds
    // up if every leaf is visited exactly once and the list terminates
    let stats = index.stats().unwrap();
    assert_eq!(stats.key_count, 1000);
    assert_eq!(stats.link_count, 1000);
    assert_eq!(stats.depth, 2);
}

#[test]
fn test_balance_two_levels_at_ten_thousand() {
    let mut words = IndexedWords::new();
    for n in 0..10_000u32 {
        words.add_single_word(&format!("w{n:05}"), n);
    }
    let (_dir, index) = build_and_open(&words);

    // sqrt sizing keeps moderate dictionaries at root + leaves
    let stats = index.stats().unwrap();
    assert_eq!(stats.depth, 2);
    assert_eq!(stats.key_count, 10_000);
}

#[test]
fn test_max_results_overshoot_only_by_last_chain() {
    let mut words = IndexedWords::new();
    for n in 0..100u32 {
        words.add_single_word(&format!("p{n:02}"), n);
    }
    let (_dir, index) = build_and_open(&words);

    let request = index.prefix_match("p", 10);
    request.wait();

    // Each chain here holds one link, so no overshoot is possible
    assert_eq!(request.matches().len(), 10);
    assert_eq!(request.max_results(), 10);
}

#[test]
fn test_phrase_indexing_and_middle_match() {
    let mut words = IndexedWords::new();
    words.add_word("the quick brown fox", 7);
    let (_dir, index) = build_and_open(&words);

    // One key per token starting position
    let stats = index.stats().unwrap();
    assert_eq!(stats.key_count, 4);

    // The phrase itself is an exact whole-word match
    let links = index.find_articles("The Quick Brown Fox").unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].word, "the quick brown fox");
    assert_eq!(links[0].prefix, "");
    assert_eq!(links[0].article_offset, 7);

    // The interior position surfaces through a prefix scan, with the
    // skipped lead-in restored
    let request = index.prefix_match("brown fox", 10);
    request.wait();
    assert_eq!(request.matches(), vec!["the quick brown fox".to_string()]);
}

#[test]
fn test_prefix_match_includes_middle_matches_stemmed_excludes() {
    let mut words = IndexedWords::new();
    words.add_word("dark matter", 1);
    words.add_single_word("matter", 2);
    let (_dir, index) = build_and_open(&words);

    let request = index.prefix_match("matter", 10);
    request.wait();
    let matches: HashSet<_> = request.matches().into_iter().collect();
    assert!(matches.contains("dark matter"));
    assert!(matches.contains("matter"));

    // Stemmed matching skips middle matches
    let request = index.stemmed_match("matter", 3, 0, 10);
    request.wait();
    let matches: HashSet<_> = request.matches().into_iter().collect();
    assert!(!matches.contains("dark matter"));
    assert!(matches.contains("matter"));
}

#[test]
fn test_stemmed_match_chops_suffix() {
    let mut words = IndexedWords::new();
    for (word, offset) in [("run", 1), ("runs", 2), ("running", 3), ("runner", 4)] {
        words.add_single_word(word, offset);
    }
    let (_dir, index) = build_and_open(&words);

    // Needles: "running", "runnin", "runni", "runn". The last one reaches
    // "runner", whose folded size stays within the suffix allowance.
    let request = index.stemmed_match("running", 4, 3, 100);
    request.wait();
    assert!(request.error().is_none());

    let matches: HashSet<_> = request.matches().into_iter().collect();
    assert!(matches.contains("running"));
    assert!(matches.contains("runner"));

    // Chopping stops at min_length, so "runs" and "run" are never reached
    // by any needle
    assert!(!matches.contains("runs"));
    assert!(!matches.contains("run"));
}

#[test]
fn test_stemmed_match_full_family() {
    let mut words = IndexedWords::new();
    for (word, offset) in [
        ("test", 1),
        ("tested", 2),
        ("testing", 3),
        ("testbed", 4),
        ("tests", 5),
    ] {
        words.add_single_word(word, offset);
    }
    let (_dir, index) = build_and_open(&words);

    // Chopping sequence: "testing", "testin", "testi", "test"; the final
    // needle accepts the whole family within the 3-byte suffix allowance
    let request = index.stemmed_match("testing", 4, 3, 100);
    request.wait();
    assert!(request.error().is_none());

    let matches: HashSet<_> = request.matches().into_iter().collect();
    let expected: HashSet<_> = ["test", "tested", "testing", "testbed", "tests"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(matches, expected);
}

#[test]
fn test_stemmed_match_suffix_allowance_excludes_long_words() {
    let mut words = IndexedWords::new();
    words.add_single_word("run", 1);
    words.add_single_word("runaround", 2);
    let (_dir, index) = build_and_open(&words);

    // "runaround" is 9 folded bytes; allowance is len("run") + 2 = 5
    let request = index.stemmed_match("run", 3, 2, 100);
    request.wait();

    let matches: HashSet<_> = request.matches().into_iter().collect();
    assert!(matches.contains("run"));
    assert!(!matches.contains("runaround"));
}

#[test]
fn test_cancellation_finishes_without_deadlock() {
    let mut words = IndexedWords::new();
    for n in 0..5000u32 {
        words.add_single_word(&format!("c{n:04}"), n);
    }
    let (_dir, index) = build_and_open(&words);

    let request = index.prefix_match("c", usize::MAX);
    request.cancel();
    request.wait();
    assert!(request.is_finished());

    // Dropping a finished request must not block
    drop(request);

    // Dropping an in-flight request cancels it and joins the worker
    let request = index.prefix_match("c", usize::MAX);
    drop(request);
}

#[test]
fn test_concurrent_queries_match_sequential() {
    let mut words = IndexedWords::new();
    for n in 0..2000u32 {
        words.add_single_word(&format!("word{n:04}"), n);
    }
    let (_dir, index) = build_and_open(&words);

    let sequential: Vec<Vec<String>> = (0..16)
        .map(|t| {
            let request = index.prefix_match(&format!("word{t:01}"), 2000);
            request.wait();
            request.matches()
        })
        .collect();

    let concurrent: Vec<Vec<String>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|t| {
                let index = Arc::clone(&index);
                scope.spawn(move || {
                    let request = index.prefix_match(&format!("word{t:01}"), 2000);
                    request.wait();
                    request.matches()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, concurrent);
}

#[test]
fn test_query_against_unopened_index_records_error() {
    let index = Arc::new(BtreeIndex::new());

    let request = index.prefix_match("word", 10);
    request.wait();

    assert!(request.matches().is_empty());
    let error = request.error().expect("expected an error string");
    assert!(error.contains("not opened"), "unexpected error: {error}");
}

#[test]
fn test_folded_matching_ignores_case_and_punctuation() {
    let mut words = IndexedWords::new();
    words.add_single_word("self-taught", 11);
    let (_dir, index) = build_and_open(&words);

    // "Self Taught" folds to the same key; antialias then compares the
    // case-folded original spellings, which differ
    assert!(index.find_articles("Self Taught").unwrap().is_empty());

    let links = index.find_articles("Self-Taught").unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].article_offset, 11);

    // The prefix scan works on folded keys, so both spellings reach it
    let request = index.prefix_match("self taught", 10);
    request.wait();
    assert_eq!(request.matches(), vec!["self-taught".to_string()]);
}
