/// Interpret the oracle's free-text answer to the validation question.
///
/// The answer is lower-cased and trimmed; the verdict is positive iff it contains `"yes"`
/// anywhere. Anything else, including an empty answer, is negative.
pub fn parse_verdict(answer: &str) -> bool {
    answer.trim().to_lowercase().contains("yes")
}

#[cfg(test)]
mod tests {
    use super::parse_verdict;

    #[test]
    fn affirmative_answers() {
        assert!(parse_verdict("yes"));
        assert!(parse_verdict("  YES.\n"));
        assert!(parse_verdict("Yes, this shows fingernails."));
    }

    #[test]
    fn everything_else_is_negative() {
        assert!(!parse_verdict("no"));
        assert!(!parse_verdict(""));
        assert!(!parse_verdict("I cannot tell"));
    }

    #[test]
    fn substring_match_is_kept_verbatim() {
        // "eyes" contains "yes".
        assert!(parse_verdict("No, but I see eyes"));
    }
}
