use anyhow::{Context, Result};
use clap::Parser;
use engine::{Document, GeoFilter, QueryOptions, SearchEngine};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "facility-search")]
#[command(about = "Build an in-memory facility index and run ranked queries", long_about = None)]
struct Cli {
    /// Document snapshot: a JSON array or JSONL file of documents
    #[arg(long)]
    documents: PathBuf,
    /// Query string; an empty query lists everything, estates first
    #[arg(long, default_value = "")]
    query: String,
    /// Maximum number of results
    #[arg(long, default_value_t = 10)]
    limit: usize,
    /// Disable prefix expansion
    #[arg(long)]
    no_prefix: bool,
    /// Disable fuzzy (edit-distance) expansion
    #[arg(long)]
    no_fuzzy: bool,
    /// Disable substring (n-gram) expansion
    #[arg(long)]
    no_contains: bool,
    /// Fuzzy edit budget (capped by the engine)
    #[arg(long, default_value_t = 1)]
    fuzzy_edits: usize,
    /// Radius filter as lat,lon,meters
    #[arg(long, value_parser = parse_radius)]
    near: Option<GeoFilter>,
}

fn parse_radius(raw: &str) -> Result<GeoFilter, String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 3 {
        return Err("expected lat,lon,meters".to_string());
    }
    let parse = |s: &str| s.trim().parse::<f64>().map_err(|e| e.to_string());
    Ok(GeoFilter::Radius {
        lat: parse(parts[0])?,
        lon: parse(parts[1])?,
        radius_m: parse(parts[2])?,
    })
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let documents = load_documents(&cli.documents)
        .with_context(|| format!("loading documents from {}", cli.documents.display()))?;
    tracing::info!(count = documents.len(), "loaded document snapshot");

    let mut engine = SearchEngine::new();
    engine.build(documents);

    let opts = QueryOptions {
        enable_prefix: !cli.no_prefix,
        enable_fuzzy: !cli.no_fuzzy,
        enable_contains: !cli.no_contains,
        fuzzy_max_edits: cli.fuzzy_edits,
        max_results: cli.limit,
        geo: cli.near,
        ..QueryOptions::default()
    };

    let start = std::time::Instant::now();
    let results = engine.search(&cli.query, &opts);
    tracing::info!(
        hits = results.len(),
        took_us = start.elapsed().as_micros() as u64,
        "query complete"
    );

    for result in &results {
        println!("{}", serde_json::to_string(result)?);
    }
    Ok(())
}

fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let reader = BufReader::new(file);
        let mut documents = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            documents.push(serde_json::from_str(&line)?);
        }
        Ok(documents)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
