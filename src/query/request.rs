//! Word-search requests running on the global worker pool.
//!
//! A request is constructed with its parameters, immediately enqueued on the
//! rayon global pool, and then observed through its accessors: matches
//! accumulate under a per-request data mutex while the owner polls or waits.
//! Cancellation is a flag checked between chains; dropping a request cancels
//! it and blocks until the worker has signalled the completion rendezvous,
//! so a request never outlives its owner's borrow of the index.

use crate::error::{Error, Result};
use crate::index::reader::BtreeIndex;
use crate::utils::folding;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

impl BtreeIndex {
    /// Find every headword starting with `word`, middle matches included.
    pub fn prefix_match(self: &Arc<Self>, word: &str, max_results: usize) -> BtreeWordSearchRequest {
        BtreeWordSearchRequest::spawn(Arc::clone(self), word, 0, -1, true, max_results)
    }

    /// Find headwords matching `word` with up to `max_suffix_variation`
    /// folded bytes chopped off its end, never shorter than `min_length`.
    /// Middle matches are excluded.
    pub fn stemmed_match(
        self: &Arc<Self>,
        word: &str,
        min_length: usize,
        max_suffix_variation: u32,
        max_results: usize,
    ) -> BtreeWordSearchRequest {
        BtreeWordSearchRequest::spawn(
            Arc::clone(self),
            word,
            min_length,
            max_suffix_variation as i32,
            false,
            max_results,
        )
    }
}

/// Handle to an in-flight prefix or stemmed search.
pub struct BtreeWordSearchRequest {
    state: Arc<SearchState>,
}

struct SearchState {
    index: Arc<BtreeIndex>,
    word: String,
    max_results: usize,
    min_length: usize,
    /// Negative disables suffix chopping entirely
    max_suffix_variation: i32,
    allow_middle_matches: bool,
    cancelled: AtomicBool,
    matches: Mutex<Vec<String>>,
    error: Mutex<Option<String>>,
    done: Mutex<bool>,
    done_signal: Condvar,
}

/// Signals the completion rendezvous when the worker exits, whichever way
struct FinishGuard<'a>(&'a SearchState);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.0.done) = true;
        self.0.done_signal.notify_all();
    }
}

impl BtreeWordSearchRequest {
    fn spawn(
        index: Arc<BtreeIndex>,
        word: &str,
        min_length: usize,
        max_suffix_variation: i32,
        allow_middle_matches: bool,
        max_results: usize,
    ) -> Self {
        let state = Arc::new(SearchState {
            index,
            word: word.to_string(),
            max_results,
            min_length,
            max_suffix_variation,
            allow_middle_matches,
            cancelled: AtomicBool::new(false),
            matches: Mutex::new(Vec::new()),
            error: Mutex::new(None),
            done: Mutex::new(false),
            done_signal: Condvar::new(),
        });

        let worker_state = Arc::clone(&state);
        rayon::spawn(move || {
            let _finished = FinishGuard(&worker_state);
            worker_state.run();
        });

        Self { state }
    }

    /// Ask the worker to stop at its next check; returns immediately
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn max_results(&self) -> usize {
        self.state.max_results
    }

    pub fn is_finished(&self) -> bool {
        *lock(&self.state.done)
    }

    /// Block until the worker has finished (normally, by error, or after
    /// cancellation)
    pub fn wait(&self) {
        let mut done = lock(&self.state.done);
        while !*done {
            done = match self.state.done_signal.wait(done) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Snapshot of the matches gathered so far, in traversal order
    pub fn matches(&self) -> Vec<String> {
        lock(&self.state.matches).clone()
    }

    /// Error recorded by the worker, if any
    pub fn error(&self) -> Option<String> {
        lock(&self.state.error).clone()
    }
}

impl Drop for BtreeWordSearchRequest {
    fn drop(&mut self) {
        self.cancel();
        self.wait();
    }
}

impl SearchState {
    fn run(&self) {
        if self.cancelled.load(Ordering::Relaxed) {
            return;
        }

        // The needle lives as folded bytes: chopping removes single bytes
        // and every prefix comparison below is byte-wise
        let mut folded = folding::apply(&self.word).into_bytes();
        let initial_size = folded.len();

        let mut chars_left_to_chop = if self.max_suffix_variation >= 0 {
            folded
                .len()
                .saturating_sub(self.min_length)
                .min(self.max_suffix_variation as usize)
        } else {
            0
        };

        loop {
            if let Err(err) = self.scan_from(&folded, initial_size) {
                *lock(&self.error) = Some(err.to_string());
                return;
            }

            if chars_left_to_chop > 0 && !self.cancelled.load(Ordering::Relaxed) {
                chars_left_to_chop -= 1;
                folded.pop();
            } else {
                break;
            }
        }
    }

    /// One prefix scan: position at the least chain ≥ `folded`, then read
    /// chains forward across leaf boundaries while they still match.
    fn scan_from(&self, folded: &[u8], initial_size: usize) -> Result<()> {
        let Some((mut chain_ref, _)) = self.index.find_chain_exact_or_prefix(folded)? else {
            return Ok(());
        };
        let mut offset = chain_ref.offset;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Ok(());
            }

            let chain = BtreeIndex::read_chain(&chain_ref.leaf, &mut offset)?;
            let head = chain.first().ok_or(Error::CorruptedChainData)?;
            let head_folded = folding::apply(&head.word);

            let is_prefix = head_folded.len() >= folded.len()
                && head_folded.as_bytes()[..folded.len()] == *folded;
            if !is_prefix {
                // Past the matching range, end this scan
                return Ok(());
            }

            {
                let mut matches = lock(&self.matches);

                for link in &chain {
                    // Skip middle matches if requested; with suffix variation
                    // set, drop results that grew past the allowance
                    let middle_ok =
                        self.allow_middle_matches || folding::apply(&link.prefix).is_empty();
                    let suffix_ok = self.max_suffix_variation < 0
                        || head_folded.len() as i64 - initial_size as i64
                            <= self.max_suffix_variation as i64;

                    if middle_ok && suffix_ok {
                        matches.push(format!("{}{}", link.prefix, link.word));
                    }
                }

                // Allowing the last chain to overshoot max_results is fine
                // and arguably preferable to cutting a chain in half
                if matches.len() >= self.max_results {
                    return Ok(());
                }
            }

            if offset >= chain_ref.leaf.len() {
                if chain_ref.next_leaf == 0 {
                    return Ok(()); // that was the last leaf
                }
                let (leaf, link) = self.index.node_with_link(chain_ref.next_leaf)?;
                chain_ref.leaf = leaf;
                chain_ref.next_leaf = link;
                offset = 4;
            }
        }
    }
}

/// A poisoned request mutex means a panic elsewhere; the data is still
/// consistent for our push/snapshot pattern, so recover the guard.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
