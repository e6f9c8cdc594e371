use serde::{Deserialize, Serialize};

/// Opaque pointer into the external article store
pub type ArticleOffset = u32;

/// Sentinel first-u32 distinguishing an inner node from a leaf
pub const NODE_SENTINEL: u32 = 0xffff_ffff;

/// Smallest allowed B-tree branching factor
pub const BTREE_MIN_ELEMENTS: usize = 64;

/// Largest allowed B-tree branching factor
pub const BTREE_MAX_ELEMENTS: usize = 4096;

/// Once a chain holds this many entries, further middle matches are dropped.
/// Whole-word entries are always kept.
pub const MAX_MIDDLE_MATCHES_PER_CHAIN: usize = 1024;

/// A single index entry: a word, the phrase prefix it was cut from, and the
/// article it points at. The displayable headword is `prefix + word`;
/// `prefix` is empty for whole-word entries and non-empty for matches in the
/// middle of an indexed phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordArticleLink {
    pub word: String,
    pub prefix: String,
    pub article_offset: ArticleOffset,
}

impl WordArticleLink {
    pub fn new(word: impl Into<String>, article_offset: ArticleOffset) -> Self {
        Self {
            word: word.into(),
            prefix: String::new(),
            article_offset,
        }
    }

    pub fn with_prefix(
        word: impl Into<String>,
        prefix: impl Into<String>,
        article_offset: ArticleOffset,
    ) -> Self {
        Self {
            word: word.into(),
            prefix: prefix.into(),
            article_offset,
        }
    }

    /// Size of this link's on-disk record: word and prefix with their
    /// terminators plus the article offset
    pub(crate) fn record_size(&self) -> usize {
        self.word.len() + 1 + self.prefix.len() + 1 + 4
    }
}

/// The only metadata the lookup engine needs to reattach to an index file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub max_elements: u32,
    pub root_offset: u32,
}

impl IndexInfo {
    pub fn new(max_elements: u32, root_offset: u32) -> Self {
        Self {
            max_elements,
            root_offset,
        }
    }
}

/// Index metadata stored in meta.json next to the tree file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub word_count: u64,
    pub max_elements: u32,
    pub root_offset: u32,
    pub created_at: u64,
}

impl IndexMeta {
    pub fn index_info(&self) -> IndexInfo {
        IndexInfo::new(self.max_elements, self.root_offset)
    }
}
