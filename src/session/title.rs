//! Title derivation for finished sessions.
//!
//! Candidate order: section texts (configured order) → raw reply → first
//! transcript sentence. The first usable candidate wins; otherwise a
//! timestamp-based fallback label.

use chrono::NaiveDateTime;

use crate::summary::SummaryResult;

const MAX_TITLE_CHARS: usize = 120;

/// Candidates with this prefix are "no content" stubs, never titles.
const SKIP_PREFIX: &str = "keine inhalte";

pub fn derive_title(
    transcript: &str,
    summary: Option<&SummaryResult>,
    created_at: Option<NaiveDateTime>,
) -> String {
    let mut candidates: Vec<String> = Vec::new();

    if let Some(summary) = summary {
        for section in &summary.sections {
            if let Some(line) = first_line(&section.text) {
                candidates.push(line);
            }
        }
        if let Some(line) = first_line(&summary.raw) {
            candidates.push(line);
        }
    }

    let transcript = transcript.trim();
    if !transcript.is_empty() {
        candidates.push(first_sentence(transcript));
    }

    for candidate in candidates {
        let text = candidate
            .trim()
            .trim_matches(|c: char| matches!(c, ' ' | '-' | '–' | '—'));
        if text.is_empty() {
            continue;
        }
        if text.to_lowercase().starts_with(SKIP_PREFIX) {
            continue;
        }
        return truncate(text);
    }

    fallback_title(created_at)
}

/// Localized fallback label for sessions without any usable candidate.
pub fn fallback_title(created_at: Option<NaiveDateTime>) -> String {
    match created_at {
        Some(ts) => format!("Sitzung vom {}", ts.format("%d.%m.%Y %H:%M")),
        None => "Unbenannte Sitzung".to_string(),
    }
}

fn first_line(text: &str) -> Option<String> {
    text.trim()
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

/// First sentence, split at `.`/`!`/`?` followed by whitespace, terminator
/// included.
fn first_sentence(text: &str) -> String {
    let mut after_terminator = false;
    for (idx, c) in text.char_indices() {
        if after_terminator && c.is_whitespace() {
            return text[..idx].trim().to_string();
        }
        after_terminator = matches!(c, '.' | '!' | '?');
    }
    text.trim().to_string()
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_TITLE_CHARS {
        let mut truncated: String = text.chars().take(MAX_TITLE_CHARS).collect();
        truncated.push('…');
        truncated
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SectionSummary;

    fn summary_with(sections: &[(&str, &str)], raw: &str) -> SummaryResult {
        SummaryResult {
            sections: sections
                .iter()
                .map(|(name, text)| SectionSummary {
                    name: name.to_string(),
                    text: text.to_string(),
                })
                .collect(),
            highlights: Vec::new(),
            raw: raw.to_string(),
        }
    }

    #[test]
    fn test_first_section_line_wins() {
        let summary = summary_with(
            &[("Agenda-Ueberblick", "Budget wurde besprochen.\nMehr Text.")],
            "roher Text",
        );
        let title = derive_title("Transkript.", Some(&summary), None);
        assert_eq!(title, "Budget wurde besprochen.");
    }

    #[test]
    fn test_no_content_candidates_are_skipped() {
        let summary = summary_with(
            &[
                ("Agenda-Ueberblick", "Keine Inhalte gefunden"),
                ("Entscheidungen", "Rollout am Montag"),
            ],
            "",
        );
        let title = derive_title("", Some(&summary), None);
        assert_eq!(title, "Rollout am Montag");
    }

    #[test]
    fn test_raw_reply_is_used_when_sections_are_empty() {
        let summary = SummaryResult {
            sections: Vec::new(),
            highlights: Vec::new(),
            raw: "Protokoll der Budgetrunde\nweitere Zeilen".to_string(),
        };
        let title = derive_title("", Some(&summary), None);
        assert_eq!(title, "Protokoll der Budgetrunde");
    }

    #[test]
    fn test_transcript_first_sentence_as_last_resort() {
        let title = derive_title(
            "Wir haben das Budget besprochen. Keine weiteren Punkte.",
            None,
            None,
        );
        assert_eq!(title, "Wir haben das Budget besprochen.");
    }

    #[test]
    fn test_dashes_are_trimmed() {
        let summary = summary_with(&[("Entscheidungen", "– Rollout am Montag –")], "");
        let title = derive_title("", Some(&summary), None);
        assert_eq!(title, "Rollout am Montag");
    }

    #[test]
    fn test_long_candidates_are_truncated_with_ellipsis() {
        let long = "a".repeat(200);
        let summary = summary_with(&[("Entscheidungen", long.as_str())], "");
        let title = derive_title("", Some(&summary), None);
        assert_eq!(title.chars().count(), 121);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_timestamp_fallback() {
        let ts = NaiveDateTime::parse_from_str("2025-03-07 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let title = derive_title("", None, Some(ts));
        assert_eq!(title, "Sitzung vom 07.03.2025 14:30");
    }

    #[test]
    fn test_generic_fallback_without_timestamp() {
        assert_eq!(derive_title("", None, None), "Unbenannte Sitzung");
    }

    #[test]
    fn test_title_never_exceeds_121_chars() {
        for len in [1usize, 119, 120, 121, 400] {
            let text = "x".repeat(len);
            let title = derive_title(&text, None, None);
            assert!(title.chars().count() <= 121, "len {len} gave {}", title.len());
        }
    }
}
