use crate::index::{IdfTable, InvertedIndex};

/// `idf(t) = ln(N / df(t))` for every indexed term. Empty when there are no documents.
pub fn compute(index: &InvertedIndex, total_docs: usize) -> IdfTable {
    if total_docs == 0 {
        return IdfTable::new();
    }
    let n = total_docs as f64;
    index
        .iter()
        .map(|(term, postings)| (term.clone(), (n / postings.len() as f64).ln()))
        .collect()
}
