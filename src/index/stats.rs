use crate::error::{Error, Result};
use crate::index::reader::BtreeIndex;
use crate::index::types::NODE_SENTINEL;
use crate::index::{open_index_dir, INDEX_FILE};
use crate::utils::get_u32_le;
use std::path::Path;

/// Shape counters gathered by walking the tree's leftmost spine and then the
/// leaf linked list front to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Levels from the root down to the leaves
    pub depth: u32,
    pub leaf_count: u64,
    /// Distinct folded keys across all leaves
    pub key_count: u64,
    /// Word-article links across all chains
    pub link_count: u64,
}

impl BtreeIndex {
    /// Walk the whole index and count its shape. Visits every leaf once via
    /// the next-leaf links, which doubles as a linkage sanity check.
    pub fn stats(&self) -> Result<IndexStats> {
        let (mut node, _) = self.root_buffer()?;
        let mut depth = 1u32;
        let mut at_root = true;
        let mut next_leaf = 0u32;

        // Descend the leftmost spine to the first leaf
        loop {
            let first = get_u32_le(&node, 0).ok_or(Error::DecompressError)?;
            if first != NODE_SENTINEL {
                break;
            }

            let child = get_u32_le(&node, 4).ok_or(Error::DecompressError)?;
            let (buf, link) = self.node_with_link(child)?;
            node = buf;
            next_leaf = link;
            depth += 1;
            at_root = false;
        }

        let mut stats = IndexStats {
            depth,
            leaf_count: 0,
            key_count: 0,
            link_count: 0,
        };

        loop {
            let entries = get_u32_le(&node, 0).ok_or(Error::DecompressError)? as usize;
            stats.leaf_count += 1;
            stats.key_count += entries as u64;

            let mut pos = 4usize;
            for _ in 0..entries {
                let chain = Self::read_chain(&node, &mut pos)?;
                stats.link_count += chain.len() as u64;
            }

            // The root has no trailing link slot
            if at_root || next_leaf == 0 {
                break;
            }

            let (buf, link) = self.node_with_link(next_leaf)?;
            node = buf;
            next_leaf = link;
        }

        Ok(stats)
    }
}

/// Display index statistics
pub fn show_stats(dir: &Path) -> anyhow::Result<()> {
    let (index, meta) = open_index_dir(dir)?;
    let stats = index.stats()?;

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index location:   {}", dir.display());
    println!("Index version:    {}", meta.version);
    println!("Word count:       {}", meta.word_count);
    println!("Branching factor: {}", meta.max_elements);
    println!("Root offset:      {:#x}", meta.root_offset);
    println!();
    println!("Tree depth:       {}", stats.depth);
    println!("Leaves:           {}", stats.leaf_count);
    println!("Folded keys:      {}", stats.key_count);
    println!("Article links:    {}", stats.link_count);

    if let Ok(len) = std::fs::metadata(dir.join(INDEX_FILE)).map(|m| m.len()) {
        println!();
        println!("Index size:       {}", format_size(len));
    }

    Ok(())
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
