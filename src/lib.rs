//! # dixi - Dictionary Headword Index
//!
//! dixi maps normalized headwords to article locations through a balanced,
//! compressed B-tree held on disk, built once and then queried concurrently
//! without loading the whole tree into memory.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Index building and reading (compressed B-tree)
//! - [`query`] - Worker-pool search requests (prefix and stemmed matching)
//! - [`utils`] - Utility functions (folding, little-endian encoding)
//! - [`error`] - Error taxonomy shared by build and lookup paths
//!
//! ## Quick Start
//!
//! ```ignore
//! use dixi::index::{open_index_dir, save_index_dir, IndexedWords};
//! use std::path::Path;
//!
//! // Build an index
//! let mut words = IndexedWords::new();
//! words.add_word("the quick brown fox", 0x10);
//! save_index_dir(&words, Path::new("/tmp/dict-index")).unwrap();
//!
//! // Query it
//! let (index, _meta) = open_index_dir(Path::new("/tmp/dict-index")).unwrap();
//! let links = index.find_articles("brown fox").unwrap();
//!
//! let request = index.prefix_match("bro", 100);
//! request.wait();
//! for headword in request.matches() {
//!     println!("{headword}");
//! }
//! ```
//!
//! ## Index layout
//!
//! Keys are folded headwords compared byte-wise; each key owns a chain of
//! word-article links. Inner nodes hold child offsets plus packed separator
//! keys, leaves hold the chains and link forward to the next leaf so prefix
//! scans continue across node boundaries. Every node is deflate-compressed
//! independently, so lookups touch only the nodes on their root-to-leaf
//! path.

pub mod error;
pub mod index;
pub mod query;
pub mod utils;

pub use error::{Error, Result};
pub use index::{BtreeIndex, IndexInfo, IndexedWords, WordArticleLink};
pub use query::BtreeWordSearchRequest;
