//! Build and query orchestration: field indexing, candidate expansion,
//! BM25 scoring with bonuses, proximity and geo adjustments, result
//! composition.

use crate::document::{DocKind, Document, Field};
use crate::fuzzy::{FuzzyDictionary, Verbosity, DEFAULT_MAX_EDIT_DISTANCE};
use crate::index::{self, DocId, TermIndex, NGRAM_POSITION};
use crate::tokenizer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

const EXACT_MATCH_BONUS: f64 = 60.0;
const STARTS_WITH_BONUS: f64 = 50.0;
const POPULAR_NAME_STARTS_WITH_BONUS: f64 = 12.0;
const TOKEN_HIT_BONUS: f64 = 0.2;

/// Position weight for postings carrying the n-gram sentinel, in place of
/// the 1/(1+position) weight real occurrences get.
const NGRAM_POSITION_WEIGHT: f64 = 0.3;

const NGRAM_MIN_LEN: usize = 3;
const NGRAM_MAX_LEN: usize = 6;

const MIN_FUZZY_TOKEN_LEN: usize = 3;
const FUZZY_DICTIONARY_MIN_CAPACITY: usize = 1024;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geospatial post-filter. Documents without a geolocation are dropped by
/// either variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeoFilter {
    /// Great-circle radius around an anchor coordinate, in meters.
    Radius { lat: f64, lon: f64, radius_m: f64 },
    /// Axis-aligned box in degrees.
    BoundingBox {
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub enable_prefix: bool,
    pub enable_fuzzy: bool,
    /// Requested fuzzy edit budget; capped at the dictionary's own maximum.
    pub fuzzy_max_edits: usize,
    pub enable_contains: bool,
    pub max_results: usize,
    pub prefer_estates_on_tie: bool,
    /// Keep only these kinds (empty = no filter).
    pub filter_by_kinds: Vec<DocKind>,
    /// Keep only these business-type ids (empty = no filter).
    pub filter_by_business_types: Vec<i64>,
    pub geo: Option<GeoFilter>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enable_prefix: true,
            enable_fuzzy: true,
            fuzzy_max_edits: 1,
            enable_contains: true,
            max_results: 50,
            prefer_estates_on_tie: true,
            filter_by_kinds: Vec::new(),
            filter_by_business_types: Vec::new(),
            geo: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document: Document,
    pub score: f64,
    /// Query token -> index terms that matched for this document.
    pub matched: BTreeMap<String, BTreeSet<String>>,
}

/// Per-candidate scoring state. Ordered maps keep floating-point
/// accumulation order independent of hash iteration, so identical queries
/// produce identical scores.
struct Hit {
    score: f64,
    matched: BTreeMap<String, BTreeSet<String>>,
    /// Real occurrence positions pooled per matched index term, for the
    /// proximity pass.
    term_positions: BTreeMap<String, Vec<i32>>,
    starts_with_awarded: bool,
    exact_awarded: bool,
}

impl Hit {
    fn new(base_boost: f64) -> Self {
        Self {
            score: base_boost,
            matched: BTreeMap::new(),
            term_positions: BTreeMap::new(),
            starts_with_awarded: false,
            exact_awarded: false,
        }
    }
}

/// In-memory multi-field search engine over a facility document snapshot.
///
/// `build` replaces every internal structure wholesale; it must not run
/// concurrently with `search` on the same instance. The supported pattern
/// is to build a fresh engine and publish it through a
/// [`SnapshotStore`](crate::snapshot::SnapshotStore), after which `search`
/// is read-only and safe for any number of concurrent callers.
#[derive(Default)]
pub struct SearchEngine {
    docs: Vec<Document>,
    index: TermIndex,
    doc_len: Vec<u32>,
    avgdl: f64,
    idf: HashMap<String, f64>,
    fuzzy: FuzzyDictionary,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Index a full document snapshot, replacing any previous index.
    ///
    /// Field order per document: name and popular name (with 3-6 character
    /// n-grams of every token), path, address, then each ancestor's name
    /// and popular name. Document length counts real word tokens only;
    /// document frequency counts n-gram terms too, since they live in the
    /// same index namespace.
    pub fn build(&mut self, documents: Vec<Document>) {
        let mut index = TermIndex::new();
        let mut doc_len: Vec<u32> = Vec::with_capacity(documents.len());
        let mut df: HashMap<String, u32> = HashMap::new();
        // Ordered so the fuzzy dictionary is populated deterministically.
        let mut term_freq: BTreeMap<String, u64> = BTreeMap::new();

        for (ordinal, doc) in documents.iter().enumerate() {
            let doc_id = ordinal as DocId;
            let mut seen_terms: HashSet<String> = HashSet::new();
            let mut tokens_in_doc: u32 = 0;
            let mut field = |index: &mut TermIndex, f: Field, text: &str, with_ngrams: bool| {
                index_field(
                    index,
                    &mut df,
                    &mut term_freq,
                    &mut seen_terms,
                    &mut tokens_in_doc,
                    doc_id,
                    f,
                    text,
                    with_ngrams,
                );
            };

            field(&mut index, Field::Name, &doc.name, true);
            if let Some(popular) = &doc.popular_name {
                field(&mut index, Field::PopularName, popular, true);
            }
            field(&mut index, Field::Path, &doc.path(), false);
            if let Some(address) = &doc.address {
                field(&mut index, Field::Address, address, false);
            }
            for ancestor in &doc.ancestors {
                field(&mut index, Field::AncestorName, &ancestor.name, false);
                if let Some(popular) = &ancestor.popular_name {
                    field(&mut index, Field::AncestorPopularName, popular, false);
                }
            }

            doc_len.push(tokens_in_doc.max(1));
        }

        let n = documents.len() as f64;
        let avgdl = if doc_len.is_empty() {
            0.0
        } else {
            doc_len.iter().map(|&l| l as f64).sum::<f64>() / doc_len.len() as f64
        };

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(df.len());
        for (term, &df_t) in &df {
            let df_t = df_t as f64;
            idf.insert(term.clone(), (1.0 + (n - df_t + 0.5) / (df_t + 0.5)).ln());
        }

        let mut fuzzy = FuzzyDictionary::with_capacity(
            DEFAULT_MAX_EDIT_DISTANCE,
            term_freq.len().max(FUZZY_DICTIONARY_MIN_CAPACITY),
        );
        for (term, &freq) in &term_freq {
            fuzzy.insert(term, freq);
        }

        tracing::info!(
            num_docs = documents.len(),
            num_terms = index.term_count(),
            dictionary_terms = fuzzy.len(),
            avgdl,
            "index build complete"
        );

        self.docs = documents;
        self.index = index;
        self.doc_len = doc_len;
        self.avgdl = avgdl;
        self.idf = idf;
        self.fuzzy = fuzzy;
    }

    /// Ranked, truncated search over the indexed snapshot.
    ///
    /// An empty query lists every document at its kind's base boost, so the
    /// result is "everything, estates first" (optionally geo-filtered). A
    /// non-empty query requires every distinct query token to match each
    /// returned document (AND semantics).
    pub fn search(&self, query: &str, opts: &QueryOptions) -> Vec<SearchResult> {
        if self.docs.is_empty() {
            return Vec::new();
        }

        let query_tokens: Vec<String> = tokenizer::tokenize(query)
            .into_iter()
            .map(|(token, _)| token)
            .collect();

        let mut hits: HashMap<DocId, Hit> = if query_tokens.is_empty() {
            (0..self.docs.len() as DocId)
                .map(|doc| (doc, Hit::new(self.docs[doc as usize].kind.base_boost())))
                .collect()
        } else {
            let mut distinct: Vec<String> = Vec::new();
            for token in query_tokens {
                if !distinct.contains(&token) {
                    distinct.push(token);
                }
            }

            let expansions: Vec<(String, Vec<String>)> = distinct
                .into_iter()
                .map(|token| {
                    let terms = self.expand_token(&token, opts);
                    (token, terms)
                })
                .collect();

            let Some(candidates) = self.candidate_docs(&expansions) else {
                return Vec::new();
            };
            tracing::debug!(
                candidates = candidates.len(),
                tokens = expansions.len(),
                "scoring candidates"
            );
            self.score_candidates(&candidates, &expansions, query)
        };

        apply_proximity(&mut hits);
        if let Some(filter) = &opts.geo {
            self.apply_geo_filter(&mut hits, filter);
        }
        self.compose(hits, opts)
    }

    /// Expand one query token into index-term candidates: the verbatim
    /// token, prefix-bucket terms starting with it, its 3-6 character
    /// n-grams present in the index, and fuzzy suggestions. A token with no
    /// candidates is kept literally so the expansion stays explainable even
    /// though it will never match.
    fn expand_token(&self, token: &str, opts: &QueryOptions) -> Vec<String> {
        let mut terms: BTreeSet<String> = BTreeSet::new();

        if self.index.contains_term(token) {
            terms.insert(token.to_string());
        }

        if opts.enable_prefix {
            if let Some(bucket) = index::prefix_key(token)
                .and_then(|key| self.index.prefix_bucket(&key))
            {
                for candidate in bucket {
                    if candidate.starts_with(token) {
                        terms.insert(candidate.clone());
                    }
                }
            }
        }

        if opts.enable_contains {
            for gram in ngrams(token) {
                if self.index.contains_term(&gram) {
                    terms.insert(gram);
                }
            }
        }

        if opts.enable_fuzzy && token.chars().count() >= MIN_FUZZY_TOKEN_LEN {
            let max_edits = opts.fuzzy_max_edits.min(self.fuzzy.max_edit_distance());
            for suggestion in self.fuzzy.lookup(token, Verbosity::Closest, max_edits) {
                if self.index.contains_term(&suggestion.term) {
                    terms.insert(suggestion.term);
                }
            }
        }

        if terms.is_empty() {
            terms.insert(token.to_string());
        }
        terms.into_iter().collect()
    }

    /// Intersect per-token candidate document sets. None = empty
    /// intersection (short-circuit).
    fn candidate_docs(&self, expansions: &[(String, Vec<String>)]) -> Option<HashSet<DocId>> {
        let mut candidates: Option<HashSet<DocId>> = None;
        for (_, terms) in expansions {
            let mut docs_for_token: HashSet<DocId> = HashSet::new();
            for term in terms {
                if let Some(postings) = self.index.postings(term) {
                    for posting in postings {
                        docs_for_token.insert(posting.doc);
                    }
                }
            }
            let merged = match candidates {
                None => docs_for_token,
                Some(prev) => prev.intersection(&docs_for_token).copied().collect(),
            };
            if merged.is_empty() {
                return None;
            }
            candidates = Some(merged);
        }
        candidates
    }

    fn score_candidates(
        &self,
        candidates: &HashSet<DocId>,
        expansions: &[(String, Vec<String>)],
        query: &str,
    ) -> HashMap<DocId, Hit> {
        let normalized_query = tokenizer::normalize(query);
        let mut hits: HashMap<DocId, Hit> = HashMap::new();

        for (token, terms) in expansions {
            let mut touched: HashSet<DocId> = HashSet::new();

            for term in terms {
                let Some(postings) = self.index.postings(term) else {
                    continue;
                };
                let idf = self.idf.get(term).copied().unwrap_or(0.0);
                let term_is_extension = term.starts_with(token.as_str());

                // Postings are appended in document order during build, so
                // one document's postings form a contiguous run.
                let mut start = 0;
                while start < postings.len() {
                    let doc = postings[start].doc;
                    let mut end = start;
                    while end < postings.len() && postings[end].doc == doc {
                        end += 1;
                    }
                    let run = &postings[start..end];
                    start = end;

                    if !candidates.contains(&doc) {
                        continue;
                    }

                    let mut tf_weighted = 0.0;
                    for posting in run {
                        let position_weight = match posting.positions.first() {
                            Some(&NGRAM_POSITION) => NGRAM_POSITION_WEIGHT,
                            Some(&first) => 1.0 / (1.0 + first as f64),
                            None => 0.0,
                        };
                        tf_weighted += posting.field.weight()
                            * posting.positions.len() as f64
                            * position_weight;
                    }

                    let hit = hits
                        .entry(doc)
                        .or_insert_with(|| Hit::new(self.docs[doc as usize].kind.base_boost()));
                    touched.insert(doc);
                    hit.matched
                        .entry(token.clone())
                        .or_default()
                        .insert(term.clone());

                    if tf_weighted > 0.0 && idf > 0.0 {
                        let len_norm = if self.avgdl > 0.0 {
                            self.doc_len[doc as usize] as f64 / self.avgdl
                        } else {
                            1.0
                        };
                        hit.score += idf * tf_weighted * (BM25_K1 + 1.0)
                            / (tf_weighted + BM25_K1 * (1.0 - BM25_B + BM25_B * len_norm));
                    }

                    for posting in run {
                        for &position in &posting.positions {
                            if position >= 0 {
                                hit.term_positions
                                    .entry(term.clone())
                                    .or_default()
                                    .push(position);
                            }
                        }
                        if !hit.starts_with_awarded
                            && term_is_extension
                            && matches!(posting.field, Field::Name | Field::PopularName)
                            && posting.positions.first() == Some(&0)
                        {
                            hit.starts_with_awarded = true;
                            hit.score += STARTS_WITH_BONUS;
                            if posting.field == Field::PopularName {
                                hit.score += POPULAR_NAME_STARTS_WITH_BONUS;
                            }
                        }
                    }

                    if !hit.exact_awarded {
                        let doc_ref = &self.docs[doc as usize];
                        let exact = tokenizer::normalize(&doc_ref.name) == normalized_query
                            || doc_ref
                                .popular_name
                                .as_deref()
                                .is_some_and(|p| tokenizer::normalize(p) == normalized_query);
                        if exact {
                            hit.exact_awarded = true;
                            hit.score += EXACT_MATCH_BONUS;
                        }
                    }
                }
            }

            for doc in touched {
                if let Some(hit) = hits.get_mut(&doc) {
                    hit.score += TOKEN_HIT_BONUS;
                }
            }
        }

        hits
    }

    fn apply_geo_filter(&self, hits: &mut HashMap<DocId, Hit>, filter: &GeoFilter) {
        match *filter {
            GeoFilter::Radius { lat, lon, radius_m } => {
                hits.retain(|&doc, hit| {
                    let Some(geo) = self.docs[doc as usize].geo else {
                        return false;
                    };
                    let distance = haversine_distance_m(lat, lon, geo.lat, geo.lon);
                    if distance > radius_m {
                        return false;
                    }
                    hit.score += ((radius_m - distance) / radius_m).max(0.0);
                    true
                });
            }
            GeoFilter::BoundingBox {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            } => {
                let center_lat = (min_lat + max_lat) / 2.0;
                let center_lon = (min_lon + max_lon) / 2.0;
                let half_lat = ((max_lat - min_lat) / 2.0).max(f64::EPSILON);
                let half_lon = ((max_lon - min_lon) / 2.0).max(f64::EPSILON);
                hits.retain(|&doc, hit| {
                    let Some(geo) = self.docs[doc as usize].geo else {
                        return false;
                    };
                    if geo.lat < min_lat
                        || geo.lat > max_lat
                        || geo.lon < min_lon
                        || geo.lon > max_lon
                    {
                        return false;
                    }
                    let lat_offset = (geo.lat - center_lat).abs() / half_lat;
                    let lon_offset = (geo.lon - center_lon).abs() / half_lon;
                    hit.score += (1.0 - (lat_offset + lon_offset) / 2.0).max(0.0);
                    true
                });
            }
        }
    }

    /// Sort by score, apply tie-breaks and result filters, truncate.
    fn compose(&self, hits: HashMap<DocId, Hit>, opts: &QueryOptions) -> Vec<SearchResult> {
        let mut ranked: Vec<(DocId, Hit)> = hits.into_iter().collect();
        ranked.sort_by(|(a_doc, a), (b_doc, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    if opts.prefer_estates_on_tie {
                        let a_estate = self.docs[*a_doc as usize].kind == DocKind::Estate;
                        let b_estate = self.docs[*b_doc as usize].kind == DocKind::Estate;
                        b_estate.cmp(&a_estate)
                    } else {
                        Ordering::Equal
                    }
                })
                .then_with(|| {
                    let a_name = self.docs[*a_doc as usize].display_name().to_lowercase();
                    let b_name = self.docs[*b_doc as usize].display_name().to_lowercase();
                    a_name.cmp(&b_name)
                })
                .then_with(|| a_doc.cmp(b_doc))
        });

        let by_kind = !opts.filter_by_kinds.is_empty();
        let by_business_type = !opts.filter_by_business_types.is_empty();
        ranked
            .into_iter()
            .filter(|(doc, _)| {
                let doc_ref = &self.docs[*doc as usize];
                let business_ok = !by_business_type
                    || doc_ref
                        .business_type_id
                        .is_some_and(|id| opts.filter_by_business_types.contains(&id));
                let kind_ok = !by_kind || opts.filter_by_kinds.contains(&doc_ref.kind);
                business_ok && kind_ok
            })
            .take(opts.max_results)
            .map(|(doc, hit)| SearchResult {
                document: self.docs[doc as usize].clone(),
                score: hit.score,
                matched: hit.matched,
            })
            .collect()
    }
}

/// Index one field's text: every word token at its real position, and when
/// `with_ngrams` is set, each token's 3-6 character substrings under the
/// sentinel position. N-grams identical to their source token are skipped;
/// the real posting already covers them.
#[allow(clippy::too_many_arguments)]
fn index_field(
    index: &mut TermIndex,
    df: &mut HashMap<String, u32>,
    term_freq: &mut BTreeMap<String, u64>,
    seen_terms: &mut HashSet<String>,
    tokens_in_doc: &mut u32,
    doc_id: DocId,
    field: Field,
    text: &str,
    with_ngrams: bool,
) {
    for (token, position) in tokenizer::tokenize(text) {
        index.add(&token, doc_id, field, position as i32);
        *tokens_in_doc += 1;
        *term_freq.entry(token.clone()).or_insert(0) += 1;
        if seen_terms.insert(token.clone()) {
            *df.entry(token.clone()).or_insert(0) += 1;
        }
        if with_ngrams {
            for gram in ngrams(&token) {
                index.add(&gram, doc_id, field, NGRAM_POSITION);
                if seen_terms.insert(gram.clone()) {
                    *df.entry(gram).or_insert(0) += 1;
                }
            }
        }
    }
}

/// Distinct 3-6 character substrings of a token, the token itself excluded,
/// in lexicographic order.
fn ngrams(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let mut grams: BTreeSet<String> = BTreeSet::new();
    for len in NGRAM_MIN_LEN..=NGRAM_MAX_LEN {
        if len > chars.len() {
            break;
        }
        for window in chars.windows(len) {
            grams.insert(window.iter().collect());
        }
    }
    grams.remove(token);
    grams.into_iter().collect()
}

/// Smallest window (max - min) covering one position from each list, and
/// the 1/(1+span) bonus it earns. Skips documents with fewer than two
/// matched terms carrying real positions.
fn apply_proximity(hits: &mut HashMap<DocId, Hit>) {
    for hit in hits.values_mut() {
        for positions in hit.term_positions.values_mut() {
            positions.sort_unstable();
        }
        let lists: Vec<&[i32]> = hit
            .term_positions
            .values()
            .filter(|positions| !positions.is_empty())
            .map(Vec::as_slice)
            .collect();
        if lists.len() < 2 {
            continue;
        }
        if let Some(span) = min_window_span(&lists) {
            hit.score += 1.0 / (1.0 + span as f64);
        }
    }
}

/// K-way merge over sorted position lists: repeatedly advance the pointer
/// at the smallest current value, tracking the tightest max-min span seen.
fn min_window_span(lists: &[&[i32]]) -> Option<i64> {
    let mut pointers = vec![0usize; lists.len()];
    let mut best: Option<i64> = None;
    loop {
        let mut min_value = i64::MAX;
        let mut max_value = i64::MIN;
        let mut min_list = 0;
        for (i, list) in lists.iter().enumerate() {
            let value = list[pointers[i]] as i64;
            if value < min_value {
                min_value = value;
                min_list = i;
            }
            if value > max_value {
                max_value = value;
            }
        }
        let span = max_value - min_value;
        if best.map_or(true, |b| span < b) {
            best = Some(span);
        }
        pointers[min_list] += 1;
        if pointers[min_list] >= lists[min_list].len() {
            return best;
        }
    }
}

/// Great-circle distance in meters via the haversine formula.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}
