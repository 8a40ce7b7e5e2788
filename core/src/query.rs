//! TF-IDF ranked retrieval over a [`Snapshot`].
//!
//! `score(d) = Σ (freq(t, d) / word_count(d)) * idf(t)` over query tokens `t`.
//! Documents with a non-positive score are not returned; ties are broken by
//! document path so results are reproducible.

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub score: f64,
}

/// Top hits plus the number of documents that scored above zero before truncation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

pub fn search(snapshot: &Snapshot, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    search_counted(snapshot, query, limit).map(|r| r.hits)
}

pub fn search_counted(snapshot: &Snapshot, query: &str, limit: usize) -> Result<SearchResults> {
    if limit == 0 {
        return Err(Error::InvalidArgument("limit must be positive".into()));
    }
    let terms = tokenize(query);
    if terms.is_empty() {
        return Ok(SearchResults::default());
    }

    let mut scores: HashMap<&str, f64> = HashMap::new();
    for term in &terms {
        let (Some(postings), Some(&idf)) = (snapshot.index.get(term), snapshot.idf.get(term)) else {
            continue;
        };
        for (doc_id, &freq) in postings {
            let Some(doc) = snapshot.documents.get(doc_id) else { continue };
            let tf = freq as f64 / doc.word_count as f64;
            *scores.entry(doc_id.as_str()).or_insert(0.0) += tf * idf;
        }
    }

    let mut ranked: Vec<(&str, f64)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let total_hits = ranked.len();
    ranked.truncate(limit);
    tracing::debug!(query, terms = terms.len(), total_hits, "search");

    let hits = ranked
        .into_iter()
        .map(|(path, score)| SearchHit {
            path: path.to_string(),
            title: snapshot.documents.get(path).map(|d| d.title.clone()).unwrap_or_default(),
            score,
        })
        .collect();
    Ok(SearchResults { total_hits, hits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::RawDocument;

    fn doc(id: &str, title: &str, body: &str) -> RawDocument {
        RawDocument::new(id, Some(title.into()), None, Some(body.into()))
    }

    #[test]
    fn zero_limit_is_invalid() {
        let snap = Snapshot::default();
        assert!(matches!(search(&snap, "anything", 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn punctuation_only_query_is_empty() {
        let snap = Snapshot::build(vec![doc("a.md", "Alpha", "beta")]);
        assert!(search(&snap, "!!! 42 #", 10).unwrap().is_empty());
    }

    #[test]
    fn score_matches_formula() {
        let snap = Snapshot::build(vec![doc("a.md", "Rust", "cargo"), doc("b.md", "Go", "modules")]);
        let hits = search(&snap, "cargo", 10).unwrap();
        assert_eq!(hits.len(), 1);
        // a.md indexes "rust rust rust cargo": word_count 4, cargo once, idf ln 2
        let expected = 0.25 * 2f64.ln();
        assert!((hits[0].score - expected).abs() < 1e-12);
        assert_eq!(hits[0].title, "Rust");
    }

    #[test]
    fn ties_break_by_path() {
        let snap = Snapshot::build(vec![
            doc("c.md", "Same", "shared"),
            doc("a.md", "Same", "shared"),
            doc("b.md", "Other", "nothing"),
        ]);
        let hits = search(&snap, "shared", 10).unwrap();
        let paths: Vec<_> = hits.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "c.md"]);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn truncates_to_limit() {
        let docs = (0..5).map(|i| doc(&format!("{i}.md"), "Note", &"needle ".repeat(i + 1))).chain([doc("x.md", "Other", "hay")]);
        let snap = Snapshot::build(docs.collect());
        let counted = search_counted(&snap, "needle", 2).unwrap();
        assert_eq!(counted.total_hits, 5);
        let hits = counted.hits;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "4.md");
        assert_eq!(hits[1].path, "3.md");
    }
}
