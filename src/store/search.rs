//! Text query parsing and scoring.
//!
//! Query syntax: whitespace-separated terms, `-term` to exclude, and
//! `"quoted phrases"` that must appear verbatim (case-insensitive). Terms are
//! split on non-alphanumeric characters and lowercased.

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    terms: BTreeSet<String>,
    excluded: BTreeSet<String>,
    phrases: Vec<String>,
}

impl TextQuery {
    /// Parse a raw search string. Returns `None` when nothing searchable is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut terms = BTreeSet::new();
        let mut excluded = BTreeSet::new();
        let mut phrases = Vec::new();

        let mut rest = raw;
        while let Some(start) = rest.find('"') {
            let (before, after) = rest.split_at(start);
            collect_terms(before, &mut terms, &mut excluded);
            let after = &after[1..];
            match after.find('"') {
                Some(end) => {
                    let phrase = after[..end].trim().to_lowercase();
                    if !phrase.is_empty() {
                        phrases.push(phrase);
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // unbalanced quote: treat the tail as plain terms
                    rest = after;
                    break;
                }
            }
        }
        collect_terms(rest, &mut terms, &mut excluded);

        if terms.is_empty() && phrases.is_empty() {
            return None;
        }
        Some(Self {
            terms,
            excluded,
            phrases,
        })
    }

    /// Number of distinct positive terms and phrases found in `text`, or
    /// `None` when the text does not match.
    pub fn score(&self, text: &str) -> Option<usize> {
        let lowered = text.to_lowercase();
        let words: BTreeSet<String> = tokenize(&lowered).collect();

        if self.excluded.iter().any(|w| words.contains(w)) {
            return None;
        }
        if !self.phrases.iter().all(|p| lowered.contains(p.as_str())) {
            return None;
        }

        let term_hits = self.terms.iter().filter(|t| words.contains(*t)).count();
        if term_hits == 0 && self.phrases.is_empty() {
            return None;
        }
        Some(term_hits + self.phrases.len())
    }
}

fn collect_terms(chunk: &str, terms: &mut BTreeSet<String>, excluded: &mut BTreeSet<String>) {
    for raw in chunk.split_whitespace() {
        let (negated, body) = match raw.strip_prefix('-') {
            Some(body) => (true, body),
            None => (false, raw),
        };
        let lowered = body.to_lowercase();
        for word in tokenize(&lowered) {
            if negated {
                excluded.insert(word);
            } else {
                terms.insert(word);
            }
        }
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_queries_are_rejected() {
        assert!(TextQuery::parse("").is_none());
        assert!(TextQuery::parse("   ").is_none());
        assert!(TextQuery::parse("-rum").is_none());
        assert!(TextQuery::parse("\"\"").is_none());
    }

    #[test]
    fn any_term_matches_case_insensitively() {
        let q = TextQuery::parse("gin FIZZ").unwrap();
        assert_eq!(q.score("Gin Fizz"), Some(2));
        assert_eq!(q.score("Sloe gin"), Some(1));
        assert_eq!(q.score("Mojito"), None);
    }

    #[test]
    fn punctuation_splits_words() {
        let q = TextQuery::parse("tom").unwrap();
        assert_eq!(q.score("Tom-Collins"), Some(1));
        assert_eq!(q.score("Tomato juice"), None);
    }

    #[test]
    fn excluded_terms_veto_a_match() {
        let q = TextQuery::parse("sour -whiskey").unwrap();
        assert_eq!(q.score("Amaretto Sour"), Some(1));
        assert_eq!(q.score("Whiskey Sour"), None);
    }

    #[test]
    fn phrases_must_appear_verbatim() {
        let q = TextQuery::parse("\"old fashioned\"").unwrap();
        assert_eq!(q.score("Old Fashioned"), Some(1));
        assert_eq!(q.score("Fashioned Old"), None);

        let mixed = TextQuery::parse("rum \"mai tai\"").unwrap();
        assert_eq!(mixed.score("Mai Tai with dark rum"), Some(2));
        assert_eq!(mixed.score("Mai Tai"), Some(1));
    }

    #[test]
    fn unbalanced_quote_falls_back_to_terms() {
        let q = TextQuery::parse("\"blue lagoon").unwrap();
        assert_eq!(q.score("Blue Hawaii"), Some(1));
    }
}
