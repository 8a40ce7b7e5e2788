//! Reads corpus exports (JSON objects, JSON arrays, JSONL) into `RawDocument`s.
//!
//! Records come from an upstream markdown/frontmatter exporter and are loosely
//! typed: every field is optional and `tags` may be a list or a comma-separated
//! string. Records that fail to parse are skipped with a warning.

use anyhow::{Context, Result};
use kbsearch_core::RawDocument;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tags: Option<Value>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default)]
pub struct Corpus {
    pub documents: Vec<RawDocument>,
    pub skipped: usize,
}

impl Corpus {
    fn push(&mut self, value: Value, fallback_id: String) {
        match serde_json::from_value::<InputDoc>(value) {
            Ok(doc) => self.documents.push(to_raw(doc, fallback_id)),
            Err(err) => {
                tracing::warn!(record = %fallback_id, %err, "skipping unparsable record");
                self.skipped += 1;
            }
        }
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// `id` wins over `path`, `body` over `content`.
fn to_raw(doc: InputDoc, fallback_id: String) -> RawDocument {
    let id = non_blank(doc.id).or(non_blank(doc.path)).unwrap_or(fallback_id);
    let body = doc.body.or(doc.content);
    RawDocument::new(id, doc.title, doc.tags.map(normalize_tags), body)
}

fn normalize_tags(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Collect every `.json` / `.jsonl` file under `input` in a stable order.
fn input_files(input: &Path) -> Vec<PathBuf> {
    if input.is_file() {
        return vec![input.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect();
    files.sort();
    files
}

pub fn read_corpus(input: &Path) -> Result<Corpus> {
    if !input.exists() {
        anyhow::bail!("input path {} does not exist", input.display());
    }
    let mut corpus = Corpus::default();
    for file in input_files(input) {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut corpus)?;
        } else {
            read_json(&file, &mut corpus)?;
        }
    }
    Ok(corpus)
}

fn read_jsonl(file: &Path, corpus: &mut Corpus) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let fallback = format!("{}:{}", file.display(), n + 1);
        match serde_json::from_str::<Value>(&line) {
            Ok(value) => corpus.push(value, fallback),
            Err(err) => {
                tracing::warn!(record = %fallback, %err, "skipping malformed line");
                corpus.skipped += 1;
            }
        }
    }
    Ok(())
}

fn read_json(file: &Path, corpus: &mut Corpus) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let json: Value = match serde_json::from_reader(BufReader::new(f)) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(file = %file.display(), %err, "skipping malformed file");
            corpus.skipped += 1;
            return Ok(());
        }
    };
    match json {
        Value::Array(arr) => {
            for (i, v) in arr.into_iter().enumerate() {
                corpus.push(v, format!("{}#{}", file.display(), i));
            }
        }
        obj @ Value::Object(_) => corpus.push(obj, file.display().to_string()),
        _ => {
            tracing::warn!(file = %file.display(), "expected a JSON object or array");
            corpus.skipped += 1;
        }
    }
    Ok(())
}
