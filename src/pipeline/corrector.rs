use crate::error::{DeposcribeError, Result};
use crate::transcript::TranscriptSegment;

/// Reject malformed rules before any segment is touched. Application is
/// all-or-nothing: a single bad rule fails the whole correction pass, and
/// this runs before any model stage so bad config never wastes inference.
pub fn validate_rules(rules: &[(String, String)]) -> Result<()> {
    for (pattern, _) in rules {
        if pattern.is_empty() {
            return Err(DeposcribeError::Validation(
                "dictionary rule with empty pattern".to_string(),
            ));
        }
    }
    Ok(())
}

/// Apply deterministic find/replace corrections to every segment's text.
///
/// Rules are ordered by descending pattern length (stable, so equal-length
/// patterns keep their declared order) before a single substitution pass per
/// segment, so multi-word phrases are replaced before their component words.
/// A segment's word count is recomputed only when the corrected text differs
/// byte-for-byte from the input. Returns the number of changed segments.
pub fn apply_dictionary(
    segments: &mut [TranscriptSegment],
    rules: &[(String, String)],
) -> Result<usize> {
    validate_rules(rules)?;
    if rules.is_empty() {
        return Ok(0);
    }

    let mut ordered: Vec<&(String, String)> = rules.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut changed = 0;
    for segment in segments.iter_mut() {
        let mut corrected = segment.text.clone();
        for (pattern, replacement) in &ordered {
            corrected = corrected.replace(pattern, replacement);
        }

        if corrected != segment.text {
            segment.set_text(corrected);
            changed += 1;
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::RecognizedSegment;

    fn segment(text: &str) -> TranscriptSegment {
        TranscriptSegment::from_recognized(&RecognizedSegment {
            index: 0,
            start_ms: 0,
            end_ms: 1000,
            text: text.to_string(),
            confidence: 0.9,
            language: "en".to_string(),
        })
    }

    fn rules(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(p, r)| (p.to_string(), r.to_string()))
            .collect()
    }

    #[test]
    fn test_longest_pattern_first() {
        let mut segments = vec![segment("New York City")];
        let rules = rules(&[("New", "N"), ("New York", "NY")]);
        let changed = apply_dictionary(&mut segments, &rules).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(segments[0].text, "NY City");
    }

    #[test]
    fn test_changed_segments_get_word_count_recomputed() {
        let mut segments = vec![segment("New York City")];
        assert_eq!(segments[0].word_count, 3);
        apply_dictionary(&mut segments, &rules(&[("New York", "NY")])).unwrap();
        assert_eq!(segments[0].word_count, 2);
    }

    #[test]
    fn test_untouched_segments_unchanged() {
        let mut segments = vec![segment("nothing to fix"), segment("Acme here")];
        let changed = apply_dictionary(&mut segments, &rules(&[("Acme", "ACME Corp")])).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(segments[0].text, "nothing to fix");
        assert_eq!(segments[0].word_count, 3);
        assert_eq!(segments[1].text, "ACME Corp here");
    }

    #[test]
    fn test_correction_never_sets_edit_provenance() {
        let mut segments = vec![segment("Acme here")];
        apply_dictionary(&mut segments, &rules(&[("Acme", "ACME")])).unwrap();
        assert!(!segments[0].is_edited);
        assert!(segments[0].original_text.is_none());
    }

    #[test]
    fn test_empty_pattern_rejected_before_any_change() {
        let mut segments = vec![segment("Acme here")];
        let bad = rules(&[("Acme", "ACME"), ("", "x")]);
        let result = apply_dictionary(&mut segments, &bad);
        assert!(matches!(result, Err(DeposcribeError::Validation(_))));
        // All-or-nothing: nothing was applied.
        assert_eq!(segments[0].text, "Acme here");
    }

    #[test]
    fn test_tie_break_follows_config_declaration_order() {
        use crate::config::settings::TranscriptionSettings;

        // "ba" is declared first and must apply first, even though "ab"
        // sorts before it alphabetically.
        let settings: TranscriptionSettings =
            toml::from_str(r#"custom_dictionary = [["ba", "y"], ["ab", "x"]]"#).unwrap();
        let mut segments = vec![segment("abab")];
        apply_dictionary(&mut segments, &settings.dictionary_rules()).unwrap();
        assert_eq!(segments[0].text, "ayb");
    }

    #[test]
    fn test_equal_length_patterns_keep_declared_order() {
        // Both patterns match and have equal length; the first declared one
        // applies first and removes the other's match site.
        let mut segments = vec![segment("abab")];
        let rules = rules(&[("ab", "x"), ("ba", "y")]);
        apply_dictionary(&mut segments, &rules).unwrap();
        assert_eq!(segments[0].text, "xx");
    }

    #[test]
    fn test_no_rules_is_noop() {
        let mut segments = vec![segment("hello")];
        assert_eq!(apply_dictionary(&mut segments, &[]).unwrap(), 0);
    }
}
