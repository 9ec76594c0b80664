//! Heuristic cleanup of raw recognizer segments.
//!
//! There is no ground truth to compare against, so the filter is blunt:
//! segments that are too short to carry meaning or that contain characters
//! outside the expected alphabet are dropped wholesale. Survivors get their
//! punctuation spacing and capitalization fixed.

use regex::Regex;
use std::sync::OnceLock;

/// Matches any character outside basic Latin, German diacritics, whitespace
/// and the punctuation `,.?!-`. A hit marks a segment as garbled.
fn noisy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[^a-zA-ZäöüÄÖÜß\s,.?!-]").expect("noisy-character pattern is valid")
    })
}

const MIN_SEGMENT_TOKENS: usize = 3;

/// Clean recognizer segments into a readable transcript.
///
/// Deterministic and stateless; returns an empty string when no segment
/// survives the filter. Re-cleaning cleaned output yields the same text.
pub fn clean_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut cleaned_lines: Vec<String> = Vec::new();

    for raw in segments {
        let text = raw.trim();
        if text.split_whitespace().count() < MIN_SEGMENT_TOKENS {
            continue;
        }
        if noisy_pattern().is_match(text) {
            continue;
        }

        let text = text
            .replace(" ,", ",")
            .replace(" .", ".")
            .replace(" ?", "?")
            .replace(" !", "!");

        let mut chars = text.chars();
        if let Some(first) = chars.next() {
            let capitalized: String = first.to_uppercase().chain(chars).collect();
            cleaned_lines.push(capitalized);
        }
    }

    cleaned_lines.join("\n")
}
