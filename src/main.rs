use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dixi::index::{open_index_dir, save_index_dir, stats, IndexedWords};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dixi")]
#[command(about = "Compressed on-disk B-tree headword index for dictionary lookup")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a word list
    Build {
        /// Word list: one `headword<TAB>article_offset` per line
        wordlist: PathBuf,

        /// Output index directory
        #[arg(short, long, default_value = "dixi-index")]
        out: PathBuf,

        /// Index whole lines only, without phrase tokenization
        #[arg(long)]
        single_words: bool,
    },
    /// Exact headword lookup
    Lookup {
        /// Index directory
        dir: PathBuf,
        word: String,
    },
    /// List headwords starting with a string
    Prefix {
        /// Index directory
        dir: PathBuf,
        pattern: String,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "100")]
        max_count: usize,
    },
    /// Stemmed lookup: also match with trailing characters chopped off
    Stem {
        /// Index directory
        dir: PathBuf,
        pattern: String,

        /// Never chop the needle shorter than this many bytes
        #[arg(long, default_value = "3")]
        min_length: usize,

        /// Longest allowed suffix difference, in folded bytes
        #[arg(long, default_value = "3")]
        max_suffix: u32,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "100")]
        max_count: usize,
    },
    /// Show index statistics
    Stats {
        /// Index directory
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            wordlist,
            out,
            single_words,
        } => build(&wordlist, &out, single_words),
        Commands::Lookup { dir, word } => lookup(&dir, &word),
        Commands::Prefix {
            dir,
            pattern,
            max_count,
        } => prefix(&dir, &pattern, max_count),
        Commands::Stem {
            dir,
            pattern,
            min_length,
            max_suffix,
            max_count,
        } => stem(&dir, &pattern, min_length, max_suffix, max_count),
        Commands::Stats { dir } => stats::show_stats(&dir),
    }
}

/// Read a `headword<TAB>offset` word list and build the index
fn build(wordlist: &Path, out: &Path, single_words: bool) -> Result<()> {
    let file = std::fs::File::open(wordlist)
        .with_context(|| format!("failed to open word list {}", wordlist.display()))?;

    let mut words = IndexedWords::new();
    let mut line_count = 0u64;

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let (headword, offset) = line
            .split_once('\t')
            .with_context(|| format!("line {}: expected `headword<TAB>offset`", number + 1))?;
        let offset: u32 = offset
            .trim()
            .parse()
            .with_context(|| format!("line {}: bad article offset", number + 1))?;

        if single_words {
            words.add_single_word(headword, offset);
        } else {
            words.add_word(headword, offset);
        }
        line_count += 1;
    }

    let meta = save_index_dir(&words, out)?;

    println!(
        "Indexed {} headwords into {} keys ({} branching) at {}",
        line_count,
        meta.word_count,
        meta.max_elements,
        out.display()
    );
    Ok(())
}

fn lookup(dir: &Path, word: &str) -> Result<()> {
    let (index, _) = open_index_dir(dir)?;

    let links = index.find_articles(word)?;
    if links.is_empty() {
        println!("No articles for {word:?}");
        return Ok(());
    }

    for link in links {
        println!("{}\t{:#x}", link.word, link.article_offset);
    }
    Ok(())
}

fn prefix(dir: &Path, pattern: &str, max_count: usize) -> Result<()> {
    let (index, _) = open_index_dir(dir)?;

    let request = index.prefix_match(pattern, max_count);
    request.wait();

    if let Some(error) = request.error() {
        anyhow::bail!("search failed: {error}");
    }
    for headword in request.matches() {
        println!("{headword}");
    }
    Ok(())
}

fn stem(dir: &Path, pattern: &str, min_length: usize, max_suffix: u32, max_count: usize) -> Result<()> {
    let (index, _) = open_index_dir(dir)?;

    let request = index.stemmed_match(pattern, min_length, max_suffix, max_count);
    request.wait();

    if let Some(error) = request.error() {
        anyhow::bail!("search failed: {error}");
    }
    for headword in request.matches() {
        println!("{headword}");
    }
    Ok(())
}
