//! Index construction and lookup.
//!
//! This module provides the on-disk headword index:
//!
//! - [`writer`] - Phrase tokenization and B-tree construction
//! - [`reader`] - Lookup engine over a built index file
//! - [`node`] - Compressed node codec
//! - [`types`] - Data structures (WordArticleLink, IndexInfo, etc.)
//! - [`stats`] - Index statistics
//!
//! ## Index Structure
//!
//! The on-disk index layout:
//!
//! ```text
//! <dir>/
//! ├── meta.json    # IndexMeta: version, word count, branching, root offset
//! └── index.bin    # compressed B-tree nodes + leaf link slots
//! ```
//!
//! Inside `index.bin`, every node is an independently compressed block; leaf
//! blocks are followed by a u32 link to the next leaf so prefix scans can
//! walk the keyspace without re-descending the tree.
//!
//! ## Usage
//!
//! ```ignore
//! use dixi::index::writer::{build_index, IndexedWords};
//! use dixi::index::open_index_dir;
//!
//! let mut words = IndexedWords::new();
//! words.add_word("the quick brown fox", 7);
//! // ... build into <dir>/index.bin + meta.json, then:
//! let (index, meta) = open_index_dir(&dir)?;
//! let links = index.find_articles("brown fox")?;
//! ```

pub mod node;
pub mod reader;
pub mod stats;
pub mod types;
pub mod writer;

pub use reader::BtreeIndex;
pub use stats::IndexStats;
pub use types::*;
pub use writer::{build_index, IndexedWords};

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Tree file name inside an index directory
pub const INDEX_FILE: &str = "index.bin";

/// Metadata file name inside an index directory
pub const META_FILE: &str = "meta.json";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Build `words` into `<dir>/index.bin` and write `<dir>/meta.json`.
pub fn save_index_dir(words: &IndexedWords, dir: &Path) -> Result<IndexMeta> {
    std::fs::create_dir_all(dir)?;

    let mut file = File::create(dir.join(INDEX_FILE))
        .with_context(|| format!("failed to create index file in {}", dir.display()))?;
    let info = build_index(words, &mut file)?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let meta = IndexMeta {
        version: FORMAT_VERSION,
        word_count: words.len() as u64,
        max_elements: info.max_elements,
        root_offset: info.root_offset,
        created_at: now,
    };

    let meta_file = File::create(dir.join(META_FILE))?;
    serde_json::to_writer_pretty(meta_file, &meta)?;

    Ok(meta)
}

/// Open a built index directory: read meta.json, attach to index.bin.
pub fn open_index_dir(dir: &Path) -> Result<(Arc<BtreeIndex>, IndexMeta)> {
    let meta_path = dir.join(META_FILE);
    let meta_file = File::open(&meta_path)
        .with_context(|| format!("no index found at {}", dir.display()))?;
    let meta: IndexMeta = serde_json::from_reader(meta_file).context("failed to parse meta.json")?;

    let file = File::open(dir.join(INDEX_FILE))
        .with_context(|| format!("failed to open index file in {}", dir.display()))?;

    let index = BtreeIndex::open(meta.index_info(), Arc::new(Mutex::new(file)));
    Ok((Arc::new(index), meta))
}
