// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Case-insensitive term matching over item text.
//!
//! Non-CJK terms match on word boundaries so "AI" does not hit "maintain".
//! Terms containing CJK codepoints use substring containment instead: CJK
//! text has no word delimiters, so `\b` never fires inside it.

use regex::RegexBuilder;

/// True when any character of `term` is a CJK codepoint (Han ideographs,
/// kana, or Hangul).
pub fn contains_cjk(term: &str) -> bool {
    term.chars().any(|c| {
        matches!(c,
            '\u{4E00}'..='\u{9FFF}'   // CJK Unified Ideographs
            | '\u{3400}'..='\u{4DBF}' // CJK Extension A
            | '\u{F900}'..='\u{FAFF}' // CJK Compatibility Ideographs
            | '\u{3040}'..='\u{30FF}' // Hiragana + Katakana
            | '\u{AC00}'..='\u{D7AF}' // Hangul Syllables
        )
    })
}

/// True when `text` contains `term`, case-insensitively, using the matching
/// mode appropriate for the term's script.
pub fn term_matches(text: &str, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return false;
    }
    if contains_cjk(term) {
        return text.contains(term);
    }
    let pattern = format!(r"\b{}\b", regex::escape(term));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(text),
        // An unbuildable pattern (escape covers metacharacters, so this is
        // unreachable in practice) falls back to case-insensitive containment.
        Err(_) => text.to_lowercase().contains(&term.to_lowercase()),
    }
}

/// The subset of `terms` that match `text`, preserving term order.
pub fn matching_terms<'a>(text: &str, terms: &'a [String]) -> Vec<&'a str> {
    terms
        .iter()
        .filter(|term| term_matches(text, term))
        .map(|term| term.as_str())
        .collect()
}

/// Keyword signal from the number of distinct must-term hits.
///
/// Zero hits score zero; otherwise partial credit scales with hit count and
/// saturates at 1.0 from two hits up.
pub fn keyword_score(hits: usize) -> f64 {
    if hits == 0 {
        0.0
    } else {
        (0.3 + 0.35 * hits as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_boundary_prevents_substring_hits() {
        assert!(term_matches("The AI wave continues", "AI"));
        assert!(!term_matches("maintain the system", "AI"));
        assert!(term_matches("GPT-5 launch announced", "GPT"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(term_matches("quantum computing breakthrough", "Quantum"));
        assert!(term_matches("RUST 1.85 RELEASED", "rust"));
    }

    #[test]
    fn cjk_terms_use_containment() {
        assert!(contains_cjk("人工知能"));
        assert!(contains_cjk("머신러닝"));
        assert!(!contains_cjk("machine learning"));
        // No word boundaries exist in CJK text; containment must still hit.
        assert!(term_matches("最新の人工知能ニュース", "人工知能"));
        assert!(!term_matches("最新のニュース", "人工知能"));
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert!(term_matches("the c++ language", "c++"));
        assert!(!term_matches("the cxx language", "c++"));
    }

    #[test]
    fn matching_terms_returns_hits_in_order() {
        let terms = vec!["GPT".to_string(), "launch".to_string(), "missing".to_string()];
        let hits = matching_terms("GPT-5 launch announced", &terms);
        assert_eq!(hits, vec!["GPT", "launch"]);
    }

    #[test]
    fn keyword_score_partial_credit() {
        assert_eq!(keyword_score(0), 0.0);
        assert!((keyword_score(1) - 0.65).abs() < 1e-9);
        assert!((keyword_score(2) - 1.0).abs() < 1e-9);
        assert!((keyword_score(5) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_terms_never_match() {
        assert!(!term_matches("anything", ""));
        assert!(!term_matches("anything", "  "));
    }
}
