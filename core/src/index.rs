use crate::tokenizer::tokenize;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Document identifier: the source path of the document.
pub type DocId = String;
/// Posting list of one term: document → occurrences (always ≥ 1).
pub type Postings = BTreeMap<DocId, u32>;
pub type DocumentTable = BTreeMap<DocId, Document>;
pub type InvertedIndex = BTreeMap<String, Postings>;
pub type IdfTable = BTreeMap<String, f64>;

/// How many times the title is repeated in the indexed text.
const TITLE_WEIGHT: usize = 3;

/// A document as handed over by ingestion, with optional fields already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub id: DocId,
    pub title: String,
    pub tags: Vec<String>,
    pub body: String,
}

impl RawDocument {
    /// Build a record from loosely-typed upstream fields. A missing or blank
    /// title falls back to the id, missing tags become an empty list.
    pub fn new(id: impl Into<DocId>, title: Option<String>, tags: Option<Vec<String>>, body: Option<String>) -> Self {
        let id = id.into();
        let title = match title {
            Some(t) if !t.trim().is_empty() => t,
            _ => id.clone(),
        };
        Self { id, title, tags: tags.unwrap_or_default(), body: body.unwrap_or_default() }
    }

    /// Title three times, then body, then tags.
    pub fn indexed_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(TITLE_WEIGHT + 1 + self.tags.len());
        parts.extend(std::iter::repeat(self.title.as_str()).take(TITLE_WEIGHT));
        parts.push(&self.body);
        parts.extend(self.tags.iter().map(String::as_str));
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub tags: Vec<String>,
    /// Token count of the indexed text; TF denominator.
    pub word_count: u32,
}

/// Per-document term counts, computed before the document touches the shared index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermCounts {
    counts: BTreeMap<String, u32>,
    total: u32,
}

impl TermCounts {
    pub fn from_tokens<I: IntoIterator<Item = String>>(tokens: I) -> Self {
        let mut tc = Self::default();
        for token in tokens {
            *tc.counts.entry(token).or_insert(0) += 1;
            tc.total += 1;
        }
        tc
    }

    pub fn total(&self) -> u32 { self.total }
    pub fn is_empty(&self) -> bool { self.total == 0 }
    pub fn get(&self, term: &str) -> u32 { self.counts.get(term).copied().unwrap_or(0) }
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(t, c)| (t.as_str(), *c))
    }
}

/// One document's complete contribution to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTerms {
    pub id: DocId,
    pub document: Document,
    pub counts: TermCounts,
}

/// Tokenize one document. Returns `None` when it yields no terms.
pub fn analyze(raw: RawDocument) -> Option<DocumentTerms> {
    let counts = TermCounts::from_tokens(tokenize(&raw.indexed_text()));
    if counts.is_empty() {
        return None;
    }
    let document = Document { title: raw.title, tags: raw.tags, word_count: counts.total() };
    Some(DocumentTerms { id: raw.id, document, counts })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub indexed: usize,
    /// Documents with no terms.
    pub dropped: usize,
    /// Documents whose id was already indexed.
    pub duplicates: usize,
}

/// Owns all intermediate state of one build pass.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    documents: DocumentTable,
    index: InvertedIndex,
    stats: BuildStats,
}

impl IndexBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, raw: RawDocument) {
        let id = raw.id.clone();
        match analyze(raw) {
            Some(terms) => self.add_terms(terms),
            None => self.drop_empty(&id),
        }
    }

    fn drop_empty(&mut self, id: &str) {
        tracing::debug!(doc = %id, "document has no terms, dropped");
        self.stats.dropped += 1;
    }

    /// Merge one document's batch. The first document with a given id wins.
    pub fn add_terms(&mut self, terms: DocumentTerms) {
        let DocumentTerms { id, document, counts } = terms;
        match self.documents.entry(id) {
            Entry::Occupied(e) => {
                tracing::warn!(doc = %e.key(), "duplicate document id, skipped");
                self.stats.duplicates += 1;
            }
            Entry::Vacant(e) => {
                for (term, count) in counts.iter() {
                    self.index.entry(term.to_string()).or_default().insert(e.key().clone(), count);
                }
                e.insert(document);
                self.stats.indexed += 1;
            }
        }
    }

    pub fn stats(&self) -> BuildStats { self.stats }

    pub fn finish(self) -> (DocumentTable, InvertedIndex) {
        tracing::debug!(
            indexed = self.stats.indexed,
            dropped = self.stats.dropped,
            duplicates = self.stats.duplicates,
            terms = self.index.len(),
            "index build finished"
        );
        (self.documents, self.index)
    }
}

/// Tokenize documents on the rayon pool, then merge in input order.
pub fn build_parallel(docs: Vec<RawDocument>) -> IndexBuilder {
    let analyzed: Vec<(DocId, Option<DocumentTerms>)> = docs
        .into_par_iter()
        .map(|raw| (raw.id.clone(), analyze(raw)))
        .collect();
    let mut builder = IndexBuilder::new();
    for (id, terms) in analyzed {
        match terms {
            Some(t) => builder.add_terms(t),
            None => builder.drop_empty(&id),
        }
    }
    builder
}
