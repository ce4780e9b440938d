//! In-memory multi-field search and ranking engine for facility data
//! (estates, buildings, rooms).
//!
//! A [`SearchEngine`] is built wholesale from a document snapshot and then
//! answers ranked queries with exact, prefix, substring and fuzzy matching,
//! BM25-style scoring with field weights and bonuses, proximity boosting
//! and optional geospatial filtering. Rebuilds publish a fresh engine
//! through a [`SnapshotStore`] rather than mutating a live one.

pub mod document;
pub mod engine;
pub mod fuzzy;
pub mod index;
pub mod snapshot;
pub mod tokenizer;

pub use document::{AncestorRef, DocKind, Document, Field, GeoPoint};
pub use engine::{GeoFilter, QueryOptions, SearchEngine, SearchResult};
pub use fuzzy::{FuzzyDictionary, Suggestion, Verbosity};
pub use index::{DocId, Posting, TermIndex};
pub use snapshot::SnapshotStore;
