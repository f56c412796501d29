use std::sync::OnceLock;

use regex::Regex;

use crate::collector::KeywordMatcher;

fn long_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{8,}\b").expect("valid regex"))
}

/// Numeric tokens of 8 or more digits, word-bounded: a long number is
/// returned whole, and digits embedded in a longer alphanumeric token are
/// not matched.
pub fn long_numbers(text: &str) -> Vec<String> {
    long_number_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Lines of `text` that match the same keyword pattern used for
/// acceptance, in document order. Trailing carriage returns are trimmed.
pub fn matching_lines(text: &str, matcher: &KeywordMatcher) -> Vec<String> {
    text.lines()
        .filter(|line| matcher.is_match(line))
        .map(str::to_string)
        .collect()
}
