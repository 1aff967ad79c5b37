//! Word-count segmentation of chapter text.
//!
//! Splits a chapter into bounded-size pieces for synthesis. Pure and
//! deterministic: segmentation is re-derived from the chapter text on
//! every play action and never persisted.

/// Split `text` into segments of exactly `words_per_segment` whitespace
/// words each; the last segment may be shorter.
///
/// Wordless input yields a single empty segment so callers can
/// distinguish "no words" from "no text" — blank segments must be
/// filtered before scheduling synthesis.
pub fn segment_words(text: &str, words_per_segment: usize) -> Vec<String> {
    debug_assert!(words_per_segment > 0);

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new()];
    }

    words
        .chunks(words_per_segment)
        .map(|chunk| chunk.join(" "))
        .collect()
}

/// Number of whitespace words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_single_empty_segment() {
        assert_eq!(segment_words("", 100), vec![String::new()]);
        assert_eq!(segment_words("   \n\t  ", 100), vec![String::new()]);
    }

    #[test]
    fn test_short_text_single_segment() {
        let segments = segment_words("the quick brown fox", 100);
        assert_eq!(segments, vec!["the quick brown fox".to_string()]);
    }

    #[test]
    fn test_exact_multiple_of_segment_size() {
        let segments = segment_words("a b c d e f", 3);
        assert_eq!(segments, vec!["a b c".to_string(), "d e f".to_string()]);
    }

    #[test]
    fn test_last_segment_shorter() {
        let segments = segment_words("a b c d e f g", 3);
        assert_eq!(
            segments,
            vec!["a b c".to_string(), "d e f".to_string(), "g".to_string()]
        );
    }

    #[test]
    fn test_whitespace_normalized() {
        let segments = segment_words("one\n\ntwo\t three   four", 2);
        assert_eq!(segments, vec!["one two".to_string(), "three four".to_string()]);
    }

    #[test]
    fn test_word_sequence_reconstructed() {
        let text = "Call me Ishmael. Some years ago, never mind how long precisely, \
                    having little or no money in my purse, and nothing particular \
                    to interest me on shore, I thought I would sail about a little.";
        for n in [1, 3, 7, 100] {
            let segments = segment_words(text, n);
            let rejoined = segments.join(" ");
            let original: Vec<&str> = text.split_whitespace().collect();
            let roundtrip: Vec<&str> = rejoined.split_whitespace().collect();
            assert_eq!(roundtrip, original, "word sequence lost at n={n}");
        }
    }

    #[test]
    fn test_segment_count_matches_ceiling_division() {
        let text = (0..250).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let segments = segment_words(&text, 100);
        assert_eq!(segments.len(), 3);
        assert_eq!(word_count(&segments[0]), 100);
        assert_eq!(word_count(&segments[1]), 100);
        assert_eq!(word_count(&segments[2]), 50);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("one"), 1);
        assert_eq!(word_count("  one \n two  "), 2);
    }
}
