//! Symmetric-delete fuzzy matching over the corpus dictionary.
//!
//! Every dictionary term is expanded into its delete variants up to the
//! construction-time edit distance cap, so a lookup only has to generate the
//! deletes of the query term and probe the map. Candidate matches found that
//! way are a superset of the true matches, so each one is verified with a
//! Levenshtein distance computation before it is returned.

use std::collections::{HashMap, HashSet};

pub const DEFAULT_MAX_EDIT_DISTANCE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Only suggestions at the smallest edit distance found.
    Closest,
    /// Every suggestion within the requested edit distance.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub term: String,
    pub distance: usize,
    pub frequency: u64,
}

pub struct FuzzyDictionary {
    terms: HashMap<String, u64>,
    /// Delete variant -> original dictionary terms it was derived from.
    deletes: HashMap<String, Vec<String>>,
    max_edit_distance: usize,
}

impl FuzzyDictionary {
    pub fn new(max_edit_distance: usize) -> Self {
        Self::with_capacity(max_edit_distance, 0)
    }

    pub fn with_capacity(max_edit_distance: usize, capacity: usize) -> Self {
        Self {
            terms: HashMap::with_capacity(capacity),
            deletes: HashMap::with_capacity(capacity),
            max_edit_distance,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn max_edit_distance(&self) -> usize {
        self.max_edit_distance
    }

    /// Register a term with its corpus frequency. Re-inserting an existing
    /// term accumulates frequency without regenerating delete variants.
    pub fn insert(&mut self, term: &str, frequency: u64) {
        if let Some(freq) = self.terms.get_mut(term) {
            *freq += frequency;
            return;
        }
        self.terms.insert(term.to_string(), frequency);
        for variant in delete_variants(term, self.max_edit_distance) {
            self.deletes.entry(variant).or_default().push(term.to_string());
        }
    }

    /// Dictionary terms within `max_edits` edit operations of `input`,
    /// ordered by edit distance, then corpus frequency descending, then
    /// term. `max_edits` is capped at the construction-time distance.
    pub fn lookup(&self, input: &str, verbosity: Verbosity, max_edits: usize) -> Vec<Suggestion> {
        let max_edits = max_edits.min(self.max_edit_distance);
        let mut seen: HashSet<&str> = HashSet::new();
        let mut suggestions: Vec<Suggestion> = Vec::new();

        for variant in delete_variants(input, max_edits) {
            let Some(originals) = self.deletes.get(&variant) else {
                continue;
            };
            for original in originals {
                if !seen.insert(original) {
                    continue;
                }
                let distance = levenshtein(input, original);
                if distance <= max_edits {
                    suggestions.push(Suggestion {
                        term: original.clone(),
                        distance,
                        frequency: self.terms[original],
                    });
                }
            }
        }

        suggestions.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| b.frequency.cmp(&a.frequency))
                .then_with(|| a.term.cmp(&b.term))
        });

        if verbosity == Verbosity::Closest {
            if let Some(best) = suggestions.first().map(|s| s.distance) {
                suggestions.retain(|s| s.distance == best);
            }
        }
        suggestions
    }
}

impl Default for FuzzyDictionary {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EDIT_DISTANCE)
    }
}

/// All variants of `term` reachable by deleting up to `max_distance`
/// characters, the unmodified term included.
fn delete_variants(term: &str, max_distance: usize) -> HashSet<String> {
    let mut variants: HashSet<String> = HashSet::new();
    variants.insert(term.to_string());
    let mut frontier: Vec<Vec<char>> = vec![term.chars().collect()];

    for _ in 0..max_distance {
        let mut next_frontier: Vec<Vec<char>> = Vec::new();
        for chars in frontier {
            if chars.is_empty() {
                continue;
            }
            for skip in 0..chars.len() {
                let mut shorter = chars.clone();
                shorter.remove(skip);
                let variant: String = shorter.iter().collect();
                if variants.insert(variant) {
                    next_frontier.push(shorter);
                }
            }
        }
        frontier = next_frontier;
    }
    variants
}

/// Levenshtein edit distance over characters, two-row DP.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> FuzzyDictionary {
        let mut dict = FuzzyDictionary::new(2);
        dict.insert("library", 10);
        dict.insert("lobby", 3);
        dict.insert("laundry", 1);
        dict
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("library", "library"), 0);
        assert_eq!(levenshtein("libary", "library"), 1);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn exact_term_is_its_own_closest_match() {
        let dict = dictionary();
        let suggestions = dict.lookup("library", Verbosity::Closest, 2);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].term, "library");
        assert_eq!(suggestions[0].distance, 0);
    }

    #[test]
    fn one_edit_matches_within_distance_one() {
        let dict = dictionary();
        let suggestions = dict.lookup("libary", Verbosity::Closest, 1);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].term, "library");
        assert_eq!(suggestions[0].distance, 1);
    }

    #[test]
    fn two_edits_do_not_match_within_distance_one() {
        let dict = dictionary();
        assert!(dict.lookup("libaryy", Verbosity::Closest, 1).is_empty());
        assert!(!dict.lookup("libaryy", Verbosity::All, 2).is_empty());
    }

    #[test]
    fn requested_distance_is_capped_by_construction() {
        let mut dict = FuzzyDictionary::new(1);
        dict.insert("library", 1);
        // Two edits away, so invisible even when the caller asks for more.
        assert!(dict.lookup("libaryy", Verbosity::All, 5).is_empty());
    }

    #[test]
    fn ties_prefer_higher_frequency() {
        let mut dict = FuzzyDictionary::new(1);
        dict.insert("hallen", 2);
        dict.insert("hallon", 9);
        let suggestions = dict.lookup("hallan", Verbosity::All, 1);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].term, "hallon");
        assert_eq!(suggestions[1].term, "hallen");
    }

    #[test]
    fn reinsert_accumulates_frequency() {
        let mut dict = FuzzyDictionary::new(1);
        dict.insert("annex", 2);
        dict.insert("annex", 3);
        assert_eq!(dict.len(), 1);
        let s = dict.lookup("annex", Verbosity::Closest, 0);
        assert_eq!(s[0].frequency, 5);
    }
}
