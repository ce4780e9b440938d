use crate::document::Field;
use std::collections::{BTreeSet, HashMap};

pub type DocId = u32;

/// Sentinel position marking a posting produced by n-gram (substring)
/// expansion rather than a real token occurrence.
pub const NGRAM_POSITION: i32 = -1;

/// Where a term occurs: one posting per (document, field), positions in
/// occurrence order.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub doc: DocId,
    pub field: Field,
    pub positions: Vec<i32>,
}

/// Positional inverted index with a 3-character prefix lookup.
///
/// Append-only within one build; a rebuild replaces the whole index. The
/// prefix buckets are ordered sets so prefix expansion iterates terms in a
/// stable order regardless of insertion history.
#[derive(Debug, Default)]
pub struct TermIndex {
    inverted: HashMap<String, Vec<Posting>>,
    prefix: HashMap<String, BTreeSet<String>>,
}

impl TermIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one occurrence of `token`. Consecutive occurrences in the same
    /// (document, field) extend the tail posting; tokens of at least three
    /// characters also register under their 3-character prefix key.
    pub fn add(&mut self, token: &str, doc: DocId, field: Field, position: i32) {
        let postings = self.inverted.entry(token.to_string()).or_default();
        match postings.last_mut() {
            Some(last) if last.doc == doc && last.field == field => {
                last.positions.push(position);
            }
            _ => postings.push(Posting {
                doc,
                field,
                positions: vec![position],
            }),
        }
        if let Some(key) = prefix_key(token) {
            self.prefix
                .entry(key)
                .or_default()
                .insert(token.to_string());
        }
    }

    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.inverted.get(term).map(Vec::as_slice)
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.inverted.contains_key(term)
    }

    /// All indexed tokens sharing the given 3-character prefix key.
    pub fn prefix_bucket(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.prefix.get(key)
    }

    pub fn term_count(&self) -> usize {
        self.inverted.len()
    }
}

/// First three characters of a token, or None for tokens too short to take
/// part in prefix lookup.
pub fn prefix_key(token: &str) -> Option<String> {
    let key: String = token.chars().take(3).collect();
    if key.chars().count() == 3 {
        Some(key)
    } else {
        None
    }
}
