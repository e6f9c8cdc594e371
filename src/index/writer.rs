//! Index construction: phrase tokenization into an ordered key mapping, and
//! recursive emission of the balanced compressed B-tree.
//!
//! Build is single-threaded and writes nodes depth-first, so a parent's
//! child offsets are always known before the parent itself is emitted.
//! Leaves are additionally linked into a forward list: each leaf block is
//! followed by a u32 slot holding the file offset of the next leaf, patched
//! in place when that next leaf gets written.

use crate::error::Result;
use crate::index::node::write_node;
use crate::index::types::*;
use crate::utils::{folding, put_u32_le, write_u32_le};
use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom, Write};

/// Ordered mapping `folded_key -> chain`, filled by the build pipeline and
/// consumed by [`build_index`]. Chains preserve insertion order.
#[derive(Debug, Default)]
pub struct IndexedWords {
    words: BTreeMap<String, Vec<WordArticleLink>>,
}

impl IndexedWords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct folded keys
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Chain stored under a folded key
    pub fn chain(&self, folded_key: &str) -> Option<&[WordArticleLink]> {
        self.words.get(folded_key).map(|c| c.as_slice())
    }

    /// Index a headword or phrase under every token starting position.
    ///
    /// The key for position `p` folds the *entire remaining phrase* from `p`,
    /// not just the token at `p`; the stored link keeps the skipped lead-in
    /// as `prefix` so `prefix + word` reconstructs the trimmed phrase. This
    /// is what makes in-phrase prefix matches work: a folded needle compares
    /// against folded phrase tails directly.
    pub fn add_word(&mut self, word: &str, article_offset: ArticleOffset) {
        let trimmed = word.trim_matches(folding::is_whitespace);

        let mut pos = 0;
        loop {
            // Skip the whitespace/punctuation run before the next token
            match trimmed[pos..]
                .char_indices()
                .find(|&(_, ch)| !folding::is_whitespace(ch) && !folding::is_punct(ch))
            {
                Some((i, _)) => pos += i,
                None => return,
            }

            let key = folding::apply(&trimmed[pos..]);
            let chain = self.words.entry(key).or_default();

            // Don't overpopulate chains with middle matches; the phrase-start
            // entry is always kept
            if chain.len() < MAX_MIDDLE_MATCHES_PER_CHAIN || pos == 0 {
                // Exact growth: common folded tokens reach thousands of
                // entries and doubling would waste most of the allocation
                chain.reserve_exact(1);
                chain.push(WordArticleLink::with_prefix(
                    &trimmed[pos..],
                    &trimmed[..pos],
                    article_offset,
                ));
            }

            // Skip the token itself
            match trimmed[pos..]
                .char_indices()
                .find(|&(_, ch)| folding::is_whitespace(ch) || folding::is_punct(ch))
            {
                Some((i, _)) => pos += i,
                None => return,
            }
        }
    }

    /// Index a single word as-is, with no tokenization and no prefix
    pub fn add_single_word(&mut self, word: &str, article_offset: ArticleOffset) {
        self.words
            .entry(folding::apply(word))
            .or_default()
            .push(WordArticleLink::new(word, article_offset));
    }

    fn sorted_entries(&self) -> Vec<(&str, &[WordArticleLink])> {
        self.words
            .iter()
            .map(|(key, chain)| (key.as_str(), chain.as_slice()))
            .collect()
    }
}

/// Build the B-tree for `words` into `file`, returning the metadata the
/// lookup engine needs to reattach.
///
/// The branching factor is `clamp(floor(sqrt(n)) + 1, 64, 4096)`, which for
/// typical dictionaries yields a two-level tree: one inner root over roughly
/// sqrt(n) leaves, so a lookup costs two node reads.
pub fn build_index<F: Write + Seek>(words: &IndexedWords, file: &mut F) -> Result<IndexInfo> {
    let mut entries = words.sorted_entries();

    // Some dictionaries are known to inject empty synonym entries; those
    // sort first and get dropped rather than indexed
    let empty_keys = entries.iter().take_while(|(key, _)| key.is_empty()).count();
    entries.drain(..empty_keys);

    let max_elements = ((entries.len() as f64).sqrt() as usize + 1)
        .clamp(BTREE_MIN_ELEMENTS, BTREE_MAX_ELEMENTS);

    let mut last_leaf_link = 0u32;
    let root_offset = build_node(&entries, file, max_elements, &mut last_leaf_link)?;

    Ok(IndexInfo::new(max_elements as u32, root_offset))
}

/// Recursively emit the node covering `entries`, returning its file offset.
///
/// `last_leaf_link` carries the file offset of the previously written leaf's
/// next-leaf slot across the whole build, so leaves end up chained in key
/// order regardless of where they sit in the tree.
fn build_node<F: Write + Seek>(
    entries: &[(&str, &[WordArticleLink])],
    file: &mut F,
    max_elements: usize,
    last_leaf_link: &mut u32,
) -> Result<u32> {
    let is_leaf = entries.len() <= max_elements;

    let offset = if is_leaf {
        write_node(file, &serialize_leaf(entries))?
    } else {
        let mut payload = vec![0u8; 4 + (max_elements + 1) * 4];
        put_u32_le(&mut payload, 0, NODE_SENTINEL);

        let total = entries.len() as u64;
        let mut prev = 0usize;

        for x in 0..max_elements {
            let cur = (total * (x as u64 + 1) / (max_elements as u64 + 1)) as usize;

            let child = build_node(&entries[prev..cur], file, max_elements, last_leaf_link)?;
            put_u32_le(&mut payload, 4 + x * 4, child);

            // The separator is the first key of the right subtree, so an
            // equal comparison during lookup correctly directs to the right
            payload.extend_from_slice(entries[cur].0.as_bytes());
            payload.push(0);

            prev = cur;
        }

        let child = build_node(&entries[prev..], file, max_elements, last_leaf_link)?;
        put_u32_le(&mut payload, 4 + max_elements * 4, child);

        write_node(file, &payload)?
    };

    if is_leaf {
        // Zero link slot for now; the next leaf written will patch it
        write_u32_le(file, 0)?;
        let here = file.stream_position()? as u32;

        if *last_leaf_link != 0 {
            file.seek(SeekFrom::Start(*last_leaf_link as u64))?;
            write_u32_le(file, offset)?;
            file.seek(SeekFrom::Start(here as u64))?;
        }

        *last_leaf_link = here - 4;
    }

    Ok(offset)
}

/// Leaf payload: entry count, then per key a byte-counted run of
/// `word\0 prefix\0 article_offset` records
fn serialize_leaf(entries: &[(&str, &[WordArticleLink])]) -> Vec<u8> {
    let total: usize = entries
        .iter()
        .map(|(_, chain)| 4 + chain.iter().map(|link| link.record_size()).sum::<usize>())
        .sum();

    let mut payload = Vec::with_capacity(4 + total);
    payload.extend_from_slice(&(entries.len() as u32).to_le_bytes());

    for (_, chain) in entries {
        let chain_bytes: usize = chain.iter().map(|link| link.record_size()).sum();
        payload.extend_from_slice(&(chain_bytes as u32).to_le_bytes());

        for link in *chain {
            payload.extend_from_slice(link.word.as_bytes());
            payload.push(0);
            payload.extend_from_slice(link.prefix.as_bytes());
            payload.push(0);
            payload.extend_from_slice(&link.article_offset.to_le_bytes());
        }
    }

    payload
}
