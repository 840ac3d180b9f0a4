use std::sync::LazyLock;

use regex::Regex;

static QUOTES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"['’`]").unwrap());
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Maps an arbitrary label to a lowercase, underscore-separated token that is
/// safe to use as a column header or as part of a filename.
///
/// Quote characters are dropped first so that possessives collapse
/// (`Hospital's` becomes `hospitals`), then any other punctuation, then
/// whitespace runs become a single `_`. Leading and trailing whitespace never
/// produces an underscore. Never fails; a label made only of punctuation
/// yields the empty string.
pub fn normalize(label: &str) -> String {
    let without_quotes = QUOTES.replace_all(label, "");
    let word_chars = PUNCTUATION.replace_all(&without_quotes, "");
    WHITESPACE
        .replace_all(word_chars.trim(), "_")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn possessive_and_parentheses() {
        assert_eq!(
            normalize("Hospital's Rating (Overall)"),
            "hospitals_rating_overall"
        );
    }

    #[test]
    fn collapses_and_trims_whitespace() {
        assert_eq!(normalize("  Multiple   Spaces "), "multiple_spaces");
        assert_eq!(normalize("tab\tand\nnewline"), "tab_and_newline");
    }

    #[test]
    fn empty_and_punctuation_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("()-/?!"), "");
    }

    #[test]
    fn curly_quote_and_backtick() {
        assert_eq!(normalize("Patient’s `Score`"), "patients_score");
    }

    #[test]
    fn keeps_existing_underscores_and_digits() {
        assert_eq!(normalize("Facility_ID 2024"), "facility_id_2024");
    }

    #[test]
    fn punctuation_between_words_leaves_single_separator() {
        assert_eq!(normalize("Score - Total"), "score_total");
        assert_eq!(normalize("ZIP/Postal"), "zippostal");
    }
}
