use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kbsearch_core::persist::{load_snapshot, save_snapshot, IndexPaths, SnapshotFormat};
use kbsearch_core::{RawDocument, Snapshot, DEFAULT_LIMIT};
use tracing_subscriber::{fmt, EnvFilter};

mod ingest;

#[derive(Parser)]
#[command(name = "kbsearch")]
#[command(about = "Build and query a TF-IDF index over a document corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Snapshot encoding: json or bincode
        #[arg(long, default_value = "json")]
        format: SnapshotFormat,
        /// Worker threads for tokenization (0 = one per core)
        #[arg(long, default_value_t = 0)]
        jobs: usize,
    },
    /// Run a free-text query against a built index
    Search {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: String,
        /// Query text
        #[arg(long)]
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print corpus statistics of a built index
    Stats {
        #[arg(long, default_value = "./index")]
        index: String,
        /// Number of most frequent terms to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, format, jobs } => build_index(&input, &output, format, jobs),
        Commands::Search { index, query, limit, json } => run_search(&index, &query, limit, json),
        Commands::Stats { index, top } => print_stats(&index, top),
    }
}

fn build_index(input: &str, output: &str, format: SnapshotFormat, jobs: usize) -> Result<()> {
    let corpus = ingest::read_corpus(input.as_ref())?;
    tracing::info!(records = corpus.documents.len(), skipped = corpus.skipped, "ingested records");

    let docs: Vec<RawDocument> = corpus.documents;
    let pool = rayon_pool(jobs)?;
    let snapshot = pool.install(|| Snapshot::build(docs));
    tracing::info!(num_docs = snapshot.num_docs(), num_terms = snapshot.num_terms(), "built index");

    let paths = IndexPaths::new(output);
    save_snapshot(&paths, &snapshot, format).with_context(|| format!("writing index to {output}"))?;
    tracing::info!(output, "index build complete");
    Ok(())
}

fn rayon_pool(jobs: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("starting tokenizer thread pool")
}

fn run_search(index: &str, query: &str, limit: usize, json: bool) -> Result<()> {
    let (snapshot, _meta) = load_snapshot(&IndexPaths::new(index)).with_context(|| format!("loading index from {index}"))?;
    let hits = snapshot.search(query, limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("no results");
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>3}. {:.6}  {}  ({})", rank + 1, hit.score, hit.title, hit.path);
    }
    Ok(())
}

fn print_stats(index: &str, top: usize) -> Result<()> {
    let (snapshot, meta) = load_snapshot(&IndexPaths::new(index)).with_context(|| format!("loading index from {index}"))?;
    let postings: usize = snapshot.index.values().map(|p| p.len()).sum();
    let tokens: u64 = snapshot.documents.values().map(|d| d.word_count as u64).sum();
    println!("created:   {}", meta.created_at);
    println!("format:    {:?}", meta.format);
    println!("documents: {}", snapshot.num_docs());
    println!("terms:     {}", snapshot.num_terms());
    println!("postings:  {postings}");
    println!("tokens:    {tokens}");

    let mut by_df: Vec<(&String, usize)> = snapshot.index.iter().map(|(t, p)| (t, p.len())).collect();
    by_df.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    for (term, df) in by_df.into_iter().take(top) {
        println!("  {term:<24} df={df:<6} idf={:.4}", snapshot.idf.get(term).copied().unwrap_or_default());
    }
    Ok(())
}
