//! Line-scanning parser for the generation reply.
//!
//! The reply is untrusted free text. A small state machine walks it line by
//! line: heading lines move the current-section pointer, everything else is
//! accumulated under the active section. Whatever the model left out is
//! filled with the placeholder afterwards, so the result is always complete.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use super::sections::{display_label, HIGHLIGHT_SECTION, PLACEHOLDER_TEXT};
use super::{SectionSummary, SummaryResult};

/// Leading enumeration markers like "1.", "2)", "3 -".
fn enumeration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+[\).\-\s]*").expect("enumeration pattern is valid"))
}

fn is_separator(c: char) -> bool {
    matches!(c, '*' | ':' | '-' | ' ')
}

/// Parse a reply against the configured sections.
///
/// `sections` defines the result keys and their order; `prompt_sections`
/// additionally contains the Highlights pseudo-section when it was prompted.
/// The caller attaches the raw reply afterwards.
pub(crate) fn parse_reply(
    reply: &str,
    sections: &[String],
    prompt_sections: &[String],
) -> SummaryResult {
    let mut buffers: Vec<(String, Vec<String>)> = sections
        .iter()
        .map(|s| (s.clone(), Vec::new()))
        .collect();
    let mut highlights: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    fn push_line(
        section: &str,
        line: &str,
        buffers: &mut [(String, Vec<String>)],
        highlights: &mut Vec<String>,
    ) {
        if section == HIGHLIGHT_SECTION {
            let bullet = line.trim_start_matches(['-', '•', ' ']).trim();
            if !bullet.is_empty() {
                highlights.push(bullet.to_string());
            }
        } else if let Some((_, lines)) = buffers.iter_mut().find(|(name, _)| name == section) {
            lines.push(line.to_string());
        }
    }

    for raw_line in reply.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((section, rest)) = match_section_heading(line, prompt_sections) {
            // Content trailing the label ("Label: text") stays content.
            if !rest.is_empty() {
                push_line(&section, &rest, &mut buffers, &mut highlights);
            }
            current = Some(section);
            continue;
        }

        // Anything before the first heading is discarded.
        let Some(section) = current.clone() else {
            continue;
        };
        push_line(&section, line, &mut buffers, &mut highlights);
    }

    let sections = buffers
        .into_iter()
        .map(|(name, lines)| {
            let text = lines.join(" ").trim().to_string();
            SectionSummary {
                name,
                text: if text.is_empty() {
                    PLACEHOLDER_TEXT.to_string()
                } else {
                    text
                },
            }
        })
        .collect();

    SummaryResult {
        sections,
        highlights,
        raw: String::new(),
    }
}

/// Decide whether a line is a section heading.
///
/// After stripping a leading enumeration marker and surrounding `*:- `
/// characters, the line must start (case-insensitively) with a prompted
/// section's display label. Returns the matched section key and whatever
/// trails the label.
pub(crate) fn match_section_heading(
    line: &str,
    prompt_sections: &[String],
) -> Option<(String, String)> {
    let stripped = enumeration_pattern().replace(line, "");
    let trimmed = stripped.trim_matches(is_separator);

    for section in prompt_sections {
        let label_lower = display_label(section).to_lowercase();
        let label_chars = label_lower.chars().count();
        let candidate: String = trimmed.chars().take(label_chars).collect();
        if candidate.to_lowercase() == label_lower {
            let rest: String = trimmed.chars().skip(label_chars).collect();
            let rest = rest.trim_start_matches(is_separator).to_string();
            return Some((section.clone(), rest));
        }
    }
    None
}

/// Advisory check only: a label missing from the reply is logged, never an
/// error, and never alters the parsed result.
pub(crate) fn validate_reply(reply: &str, prompt_sections: &[String]) {
    let lowered = reply.to_lowercase();
    let missing: Vec<String> = prompt_sections
        .iter()
        .map(|s| display_label(s).to_lowercase())
        .filter(|label| !lowered.contains(label.as_str()))
        .collect();
    if !missing.is_empty() {
        warn!(
            "Zusammenfassung enthaelt folgende Sektionen nicht eindeutig: {}",
            missing.join(", ")
        );
    }
}
