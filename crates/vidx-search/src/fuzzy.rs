//! Term matching with Elasticsearch `fuzziness: AUTO` semantics.
//!
//! Used by the in-memory index so it ranks the way the real store does for
//! the common cases: misspellings within the edit budget still match.

use std::collections::HashSet;

/// Lowercase `text` and split it on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Allowed edits for a term of `len` characters under `AUTO`.
pub fn auto_fuzziness(len: usize) -> usize {
    match len {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Levenshtein distance over chars.
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
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Whether `query_term` matches `doc_term` within the `AUTO` budget.
pub fn term_matches(query_term: &str, doc_term: &str) -> bool {
    let budget = auto_fuzziness(query_term.chars().count());
    if budget == 0 {
        return query_term == doc_term;
    }

    // Length difference is a lower bound on the distance.
    let diff = query_term.chars().count().abs_diff(doc_term.chars().count());
    diff <= budget && levenshtein(query_term, doc_term) <= budget
}

/// Number of distinct query terms matching at least one field term.
pub fn field_score(query_terms: &[String], field: &str) -> usize {
    let field_terms: HashSet<String> = tokenize(field).into_iter().collect();
    let distinct: HashSet<&String> = query_terms.iter().collect();

    distinct
        .into_iter()
        .filter(|q| field_terms.iter().any(|t| term_matches(q, t)))
        .count()
}

/// `best_fields` score: the best single field wins.
pub fn best_fields_score(query_terms: &[String], fields: &[&str]) -> usize {
    fields
        .iter()
        .map(|field| field_score(query_terms, field))
        .max()
        .unwrap_or(0)
}
