//! Section labels and hints for the result protocol.
//!
//! Section keys are stored ASCII-safe ("Agenda-Ueberblick"); prompts and
//! heading matching use the expanded display form ("Agenda-Überblick").

pub const HIGHLIGHT_SECTION: &str = "Highlights";

/// Exact placeholder the model is instructed to emit, and the text every
/// unfilled section receives.
pub const PLACEHOLDER_TEXT: &str = "(nicht eindeutig aus Transkript ersichtlich)";

/// Expand ASCII digraphs back to their umlaut display form.
pub fn display_label(section: &str) -> String {
    section
        .replace("Ae", "Ä")
        .replace("ae", "ä")
        .replace("Oe", "Ö")
        .replace("oe", "ö")
        .replace("Ue", "Ü")
        .replace("ue", "ü")
}

/// Guidance hint rendered next to a section in the prompt.
pub fn section_hint(section: &str) -> &'static str {
    match section {
        "Agenda-Ueberblick" => "Was wurde besprochen?",
        "Entscheidungen" => "Welche konkreten Entscheidungen wurden getroffen?",
        "Aufgaben" => "Welche Aufgaben wurden verteilt? Wer ist verantwortlich? Welche Fristen?",
        "Offene Punkte" => "Was ist noch zu klaeren oder nachzuholen?",
        HIGHLIGHT_SECTION => "Bemerkenswerte Aussagen, Zitate oder Stimmungen (optional).",
        _ => "Fasse klar strukturiert zusammen und nenne Verantwortliche sowie Fristen.",
    }
}

/// Sections as prompted: configured order, with a trailing Highlights
/// instruction when it is not configured already.
pub fn with_highlights(sections: &[String]) -> Vec<String> {
    let mut all = sections.to_vec();
    if !all.iter().any(|s| s == HIGHLIGHT_SECTION) {
        all.push(HIGHLIGHT_SECTION.to_string());
    }
    all
}
