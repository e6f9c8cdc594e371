//! Lookup engine over a built index file.
//!
//! A [`BtreeIndex`] attaches to an already-opened file through
//! [`open_index`](BtreeIndex::open_index) and answers exact lookups
//! directly; prefix and stemmed scans run through the worker requests in
//! [`crate::query`], which drive the same traversal primitives.
//!
//! All file access goes through the handle-scoped mutex shared at open time.
//! The root node is read once under that mutex and cached in a `OnceLock`,
//! so later traversals start lock-free from the cached buffer and only take
//! the mutex to read deeper nodes.

use crate::error::{Error, Result};
use crate::index::node::read_node;
use crate::index::types::*;
use crate::utils::{folding, get_u32_le, read_u32_le};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fs::File;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// A decompressed leaf buffer plus a chain position inside it.
///
/// The traversal hands the whole buffer to the caller so the lifetime of the
/// chain bytes is explicit; `next_leaf` lets prefix scans continue across
/// leaf boundaries.
#[derive(Debug)]
pub(crate) struct ChainRef {
    pub leaf: Vec<u8>,
    pub offset: usize,
    pub next_leaf: u32,
}

struct OpenState {
    file: Arc<Mutex<File>>,
    node_size: u32,
    root_offset: u32,
    root_node: OnceLock<Vec<u8>>,
}

/// Read-side handle to one on-disk B-tree index.
#[derive(Default)]
pub struct BtreeIndex {
    state: Option<OpenState>,
}

impl BtreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to an index file. `file` carries the handle-scoped mutex that
    /// serializes every seek and read issued through this handle.
    pub fn open_index(&mut self, info: IndexInfo, file: Arc<Mutex<File>>) {
        self.state = Some(OpenState {
            file,
            node_size: info.max_elements,
            root_offset: info.root_offset,
            root_node: OnceLock::new(),
        });
    }

    /// Convenience constructor for the common open-then-share pattern
    pub fn open(info: IndexInfo, file: Arc<Mutex<File>>) -> Self {
        let mut index = Self::new();
        index.open_index(info, file);
        index
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Exact-match lookup: fold the word, locate its chain, and antialias
    /// the result against the original spelling.
    pub fn find_articles(&self, word: &str) -> Result<Vec<WordArticleLink>> {
        let folded = folding::apply(word);

        match self.find_chain_exact_or_prefix(folded.as_bytes())? {
            Some((chain_ref, true)) => {
                let mut offset = chain_ref.offset;
                let mut chain = Self::read_chain(&chain_ref.leaf, &mut offset)?;
                antialias(word, &mut chain);
                Ok(chain)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Core traversal: locate the chain whose folded first word equals
    /// `target`, or the least chain ≥ `target` for prefix scans.
    ///
    /// Returns `None` when the tree is empty or `target` sorts past the last
    /// chain of the last leaf. The `bool` is the exact-match flag; when it is
    /// false the returned position is the prefix-scan starting candidate.
    pub(crate) fn find_chain_exact_or_prefix(
        &self,
        target: &[u8],
    ) -> Result<Option<(ChainRef, bool)>> {
        let state = self.opened()?;
        let mut file = lock_file(&state.file);

        let root = match state.root_node.get() {
            Some(buf) => buf,
            None => {
                // First traversal through this handle; the file mutex is
                // held, so exactly one thread performs the initialization
                let buf = read_node(&mut *file, state.root_offset)?;
                state.root_node.get_or_init(|| buf)
            }
        };

        let mut current_offset = state.root_offset;
        let mut node: Cow<[u8]> = Cow::Borrowed(root.as_slice());

        loop {
            let first = get_u32_le(&node, 0).ok_or(Error::DecompressError)?;

            if first == NODE_SENTINEL {
                let child_offset = inner_child(&node, state.node_size, target)?;
                node = Cow::Owned(read_node(&mut *file, child_offset)?);
                current_offset = child_offset;
                continue;
            }

            // A leaf. The root is cached, so the file position is only
            // meaningful for nodes we just read; the root also simply has no
            // trailing link to read.
            let next_leaf = if current_offset != state.root_offset {
                read_u32_le(&mut *file)?
            } else {
                0
            };

            let leaf_entries = first as usize;
            if leaf_entries == 0 {
                // Only an entirely empty tree may have an empty leaf
                if current_offset != state.root_offset {
                    return Err(Error::CorruptedChainData);
                }
                return Ok(None);
            }

            return leaf_search(node, leaf_entries, next_leaf, target, &mut file);
        }
    }

    /// Decode the chain starting at `*offset`, advancing the offset past it
    /// so sequential scans can call this repeatedly.
    pub(crate) fn read_chain(leaf: &[u8], offset: &mut usize) -> Result<Vec<WordArticleLink>> {
        let mut left = get_u32_le(leaf, *offset).ok_or(Error::CorruptedChainData)? as usize;
        let mut pos = *offset + 4;

        let mut chain = Vec::new();

        while left > 0 {
            let word = read_cstr(leaf, pos)?;
            let prefix = read_cstr(leaf, pos + word.len() + 1)?;

            let offset_pos = pos + word.len() + 1 + prefix.len() + 1;
            let article_offset = get_u32_le(leaf, offset_pos).ok_or(Error::CorruptedChainData)?;

            let record = word.len() + 1 + prefix.len() + 1 + 4;
            if left < record {
                return Err(Error::CorruptedChainData);
            }
            left -= record;

            chain.push(WordArticleLink::with_prefix(word, prefix, article_offset));
            pos = offset_pos + 4;
        }

        *offset = pos;
        Ok(chain)
    }

    /// Read a non-root node and the u32 that follows its compressed block.
    /// For leaves that u32 is the next-leaf link.
    pub(crate) fn node_with_link(&self, offset: u32) -> Result<(Vec<u8>, u32)> {
        let state = self.opened()?;
        let mut file = lock_file(&state.file);

        let buf = read_node(&mut *file, offset)?;
        let link = read_u32_le(&mut *file)?;
        Ok((buf, link))
    }

    /// Cached root payload (cloned) plus the root's file offset
    pub(crate) fn root_buffer(&self) -> Result<(Vec<u8>, u32)> {
        let state = self.opened()?;

        if let Some(buf) = state.root_node.get() {
            return Ok((buf.clone(), state.root_offset));
        }

        let mut file = lock_file(&state.file);
        let buf = read_node(&mut *file, state.root_offset)?;
        Ok((state.root_node.get_or_init(|| buf).clone(), state.root_offset))
    }

    fn opened(&self) -> Result<&OpenState> {
        self.state.as_ref().ok_or(Error::IndexNotOpened)
    }
}

/// A poisoned lock only means another query panicked mid-read; every section
/// re-seeks before reading, so the guard state is still usable.
fn lock_file(file: &Mutex<File>) -> MutexGuard<'_, File> {
    file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Binary-search the packed separator region of an inner node and pick the
/// child to descend into.
///
/// The region is a span of zero-terminated folded keys with no stored count.
/// The search shoots at the middle byte and snaps left to the enclosing
/// separator's start; a separator without a terminator means the node is
/// corrupt.
fn inner_child(node: &[u8], node_size: u32, target: &[u8]) -> Result<u32> {
    let region_start = 4 + (node_size as usize + 1) * 4;
    let keys = node.get(region_start..).ok_or(Error::DecompressError)?;

    if keys.is_empty() {
        return Err(Error::DecompressError);
    }

    let mut window = 0usize;
    let mut window_size = keys.len();

    let (separator_start, outcome) = loop {
        let test_point = window + window_size / 2;

        let mut start = test_point;
        while start > 0 && keys[start - 1] != 0 {
            start -= 1;
        }

        let end = keys[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| start + i)
            .ok_or(Error::DecompressError)?;

        let separator = &keys[start..end];
        std::str::from_utf8(separator).map_err(|_| Error::CantDecode)?;

        match target.cmp(separator) {
            Ordering::Equal => break (start, Ordering::Equal),
            Ordering::Less => {
                window_size = start - window;
                if window_size == 0 {
                    break (start, Ordering::Less);
                }
            }
            Ordering::Greater => {
                let consumed = end + 1 - window;
                window_size -= consumed.min(window_size);
                window = end + 1;
                if window_size == 0 {
                    break (start, Ordering::Greater);
                }
            }
        }
    };

    let entry = keys[..separator_start].iter().filter(|&&b| b == 0).count();

    // Separators are the first key of their right subtree, so both the equal
    // and the greater outcome descend right
    let child = match outcome {
        Ordering::Less => entry,
        _ => entry + 1,
    };

    get_u32_le(node, 4 + child * 4).ok_or(Error::DecompressError)
}

/// Binary-search the chains of a leaf for `target`.
fn leaf_search(
    node: Cow<[u8]>,
    leaf_entries: usize,
    mut next_leaf: u32,
    target: &[u8],
    file: &mut MutexGuard<'_, File>,
) -> Result<Option<(ChainRef, bool)>> {
    // Table of chain start offsets, built by hopping over chain_bytes runs
    let mut chain_offsets = Vec::with_capacity(leaf_entries);
    let mut pos = 4usize;

    for _ in 0..leaf_entries {
        let chain_bytes = get_u32_le(&node, pos).ok_or(Error::CorruptedChainData)? as usize;
        chain_offsets.push(pos);
        pos = pos
            .checked_add(4 + chain_bytes)
            .filter(|&next| next <= node.len())
            .ok_or(Error::CorruptedChainData)?;
    }

    let mut window = 0usize;
    let mut window_size = chain_offsets.len();

    loop {
        let probe = window + window_size / 2;
        let offset = chain_offsets[probe];

        // Leaves store unfolded words, so fold again before comparing
        let word = read_cstr(&node, offset + 4)?;
        let folded = folding::apply(word);

        match target.cmp(folded.as_bytes()) {
            Ordering::Equal => {
                return Ok(Some((
                    ChainRef {
                        leaf: node.into_owned(),
                        offset,
                        next_leaf,
                    },
                    true,
                )));
            }
            Ordering::Less => {
                window_size /= 2;
                if window_size == 0 {
                    // Target lands before the probed chain: that chain is the
                    // least one ≥ target, the prefix-scan candidate
                    return Ok(Some((
                        ChainRef {
                            leaf: node.into_owned(),
                            offset,
                            next_leaf,
                        },
                        false,
                    )));
                }
            }
            Ordering::Greater => {
                window_size -= window_size / 2 + 1;
                if window_size == 0 {
                    // Target lands after the probed chain: the candidate is
                    // the following chain, possibly in the next leaf
                    if probe + 1 == chain_offsets.len() {
                        if next_leaf != 0 {
                            let buf = read_node(&mut **file, next_leaf)?;
                            next_leaf = read_u32_le(&mut **file)?;
                            return Ok(Some((
                                ChainRef {
                                    leaf: buf,
                                    offset: 4,
                                    next_leaf,
                                },
                                false,
                            )));
                        }
                        return Ok(None);
                    }

                    return Ok(Some((
                        ChainRef {
                            leaf: node.into_owned(),
                            offset: chain_offsets[probe + 1],
                            next_leaf,
                        },
                        false,
                    )));
                }
                window = probe + 1;
            }
        }
    }
}

/// Zero-terminated UTF-8 string at `pos`
fn read_cstr(buf: &[u8], pos: usize) -> Result<&str> {
    let bytes = buf.get(pos..).ok_or(Error::CorruptedChainData)?;
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::CorruptedChainData)?;
    std::str::from_utf8(&bytes[..end]).map_err(|_| Error::CantDecode)
}

/// Drop chain entries whose case-folded headword disagrees with the query's,
/// and merge prefixes into words so consumers get one headword string.
fn antialias(word: &str, chain: &mut Vec<WordArticleLink>) {
    let case_folded = folding::apply_simple_case_only(word);

    chain.retain_mut(|link| {
        let headword = format!("{}{}", link.prefix, link.word);
        if folding::apply_simple_case_only(&headword) != case_folded {
            return false;
        }
        if !link.prefix.is_empty() {
            link.word = headword;
            link.prefix.clear();
        }
        true
    });
}
