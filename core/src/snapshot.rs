use crate::error::{Error, Result};
use crate::idf;
use crate::index::{build_parallel, DocumentTable, IdfTable, IndexBuilder, InvertedIndex, RawDocument};
use crate::query::{self, SearchHit, SearchResults};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Relative slack allowed between a stored idf weight and `ln(N / df)`.
const IDF_TOLERANCE: f64 = 1e-9;

/// The immutable triple a query runs against. Field names are the persisted format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub documents: DocumentTable,
    pub index: InvertedIndex,
    pub idf: IdfTable,
}

impl Snapshot {
    /// Attach IDF weights to a finished build.
    pub fn new(documents: DocumentTable, index: InvertedIndex) -> Self {
        let idf = idf::compute(&index, documents.len());
        Self { documents, index, idf }
    }

    pub fn from_builder(builder: IndexBuilder) -> Self {
        let (documents, index) = builder.finish();
        Self::new(documents, index)
    }

    /// Build a snapshot from raw documents, tokenizing on the rayon pool.
    pub fn build(docs: Vec<RawDocument>) -> Self {
        Self::from_builder(build_parallel(docs))
    }

    pub fn num_docs(&self) -> usize { self.documents.len() }
    pub fn num_terms(&self) -> usize { self.index.len() }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        query::search(self, query, limit)
    }

    pub fn search_counted(&self, query: &str, limit: usize) -> Result<SearchResults> {
        query::search_counted(self, query, limit)
    }

    /// Check that documents, postings and idf weights agree with each other:
    /// every posting points at a known document, postings of a document sum to
    /// its `word_count`, and every weight is `ln(N / df)`.
    pub fn validate(&self) -> Result<()> {
        for (id, doc) in &self.documents {
            if doc.word_count == 0 {
                return Err(Error::Corrupt(format!("document {id:?} has zero word_count")));
            }
        }
        let n = self.documents.len() as f64;
        let mut token_totals: HashMap<&str, u64> = HashMap::new();
        for (term, postings) in &self.index {
            if postings.is_empty() {
                return Err(Error::Corrupt(format!("term {term:?} has an empty posting list")));
            }
            for (id, freq) in postings {
                if *freq == 0 {
                    return Err(Error::Corrupt(format!("term {term:?} stores zero frequency for {id:?}")));
                }
                if !self.documents.contains_key(id) {
                    return Err(Error::Corrupt(format!("term {term:?} references unknown document {id:?}")));
                }
                *token_totals.entry(id.as_str()).or_insert(0) += u64::from(*freq);
            }
            let Some(&weight) = self.idf.get(term) else {
                return Err(Error::Corrupt(format!("term {term:?} has no idf weight")));
            };
            let expected = (n / postings.len() as f64).ln();
            if !weight.is_finite() || (weight - expected).abs() > IDF_TOLERANCE * expected.abs().max(1.0) {
                return Err(Error::Corrupt(format!("term {term:?} has idf {weight}, expected {expected}")));
            }
        }
        if let Some(term) = self.idf.keys().find(|t| !self.index.contains_key(*t)) {
            return Err(Error::Corrupt(format!("idf weight for unindexed term {term:?}")));
        }
        for (id, doc) in &self.documents {
            let total = token_totals.get(id.as_str()).copied().unwrap_or(0);
            if total != u64::from(doc.word_count) {
                return Err(Error::Corrupt(format!(
                    "document {id:?} has word_count {} but its postings sum to {total}",
                    doc.word_count
                )));
            }
        }
        Ok(())
    }
}

/// Holds the currently published snapshot. Publishing swaps an `Arc`;
/// queries clone the `Arc` and run without holding the lock.
#[derive(Debug, Default)]
pub struct SnapshotHandle {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self { Self::default() }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let handle = Self::new();
        handle.publish(snapshot);
        handle
    }

    /// Replace the published snapshot. Queries already running keep the old one.
    pub fn publish(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        let next = Arc::new(snapshot);
        tracing::info!(num_docs = next.num_docs(), num_terms = next.num_terms(), "publishing index snapshot");
        self.current.write().replace(next)
    }

    pub fn is_ready(&self) -> bool { self.current.read().is_some() }

    pub fn current(&self) -> Result<Arc<Snapshot>> {
        self.current.read().clone().ok_or(Error::NotReady)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.current()?.search(query, limit)
    }
}
