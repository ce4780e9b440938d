use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)[\p{L}\p{N}]+").expect("valid regex");
}

/// Produce the lowercase, NFKC-normalized, trimmed comparison form of `text`.
///
/// This is the form used for exact-equality checks against document names,
/// so it must not drop or fold letters beyond case ("Umeå" stays "umeå").
/// No stemming and no stopword removal: street addresses, room codes and
/// proper names have to compare literally.
pub fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase().trim().to_string()
}

/// Tokenize text into (token, position) pairs over the normalized form.
///
/// Tokens are maximal runs of letters and digits, so "Skolgatan 31A" yields
/// `[("skolgatan", 0), ("31a", 1)]`. Empty input yields an empty vector.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    let normalized = normalize(text);
    WORD.find_iter(&normalized)
        .enumerate()
        .map(|(pos, m)| (m.as_str().to_string(), pos))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize("  Central LIBRARY "), "central library");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(normalize("Umeå Café"), "umeå café");
        let tokens: Vec<String> = tokenize("Umeå").into_iter().map(|(t, _)| t).collect();
        assert_eq!(tokens, vec!["umeå"]);
    }

    #[test]
    fn tokenizes_with_positions() {
        let toks = tokenize("Skolgatan 31A, 901 84 Umeå");
        assert_eq!(
            toks,
            vec![
                ("skolgatan".to_string(), 0),
                ("31a".to_string(), 1),
                ("901".to_string(), 2),
                ("84".to_string(), 3),
                ("umeå".to_string(), 4),
            ]
        );
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  \t ").is_empty());
    }
}
