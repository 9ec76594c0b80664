//! Deterministic prompt rendering.
//!
//! Same transcript and profile always yield byte-identical prompts; there is
//! no randomness, no timestamps, no environment input.

use super::sections::{display_label, section_hint, PLACEHOLDER_TEXT};
use crate::settings::SettingsProfile;

pub fn build_prompt(
    transcript: &str,
    prompt_sections: &[String],
    profile: &SettingsProfile,
) -> String {
    let section_lines: Vec<String> = prompt_sections
        .iter()
        .enumerate()
        .map(|(index, section)| {
            format!(
                "{}. **{}** – {}",
                index + 1,
                display_label(section),
                section_hint(section)
            )
        })
        .collect();

    let meeting_type = context_value(&profile.meeting_type);
    let audience = context_value(&profile.audience);
    let objectives = context_value(&profile.objectives);
    let notes = context_value(&profile.notes);

    format!(
        "Du erhaelst ein potenziell fehlerhaftes Transkript eines deutschsprachigen Meetings.\n\
         Bereinige offensichtliche Erkennungsfehler, ignoriere unverständliche Sätze und generiere ein kompaktes Ergebnisprotokoll.\n\
         Arbeite die folgenden Abschnitte muendlich sauber heraus:\n\
         {sections}\n\
         \n\
         Wichtige Regeln:\n\
         - Lasse Grussformeln, Smalltalk und irrelevante Inhalte weg.\n\
         - Verwende klare, korrekte deutsche Sprache.\n\
         - Wenn Informationen fehlen, schreibe genau: \"{PLACEHOLDER_TEXT}\".\n\
         - Erfinde keine Fakten.\n\
         - Gib die Antwort strukturiert mit den oben genannten Zwischenueberschriften aus.\n\
         \n\
         Kontext:\n\
         - Besprechungstyp: {meeting_type}\n\
         - Zielgruppe: {audience}\n\
         - Ziele: {objectives}\n\
         - Notizen: {notes}\n\
         \n\
         Transkript (bereinigt):\n\
         \n\
         {transcript}\n",
        sections = section_lines.join("\n"),
    )
}

fn context_value(field: &Option<String>) -> &str {
    match field.as_deref() {
        Some(value) if !value.is_empty() => value,
        _ => PLACEHOLDER_TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::sections::with_highlights;

    fn profile() -> SettingsProfile {
        SettingsProfile {
            sections: vec!["Agenda-Ueberblick".to_string(), "Entscheidungen".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let profile = profile();
        let sections = with_highlights(&profile.sections);
        let a = build_prompt("Wir haben gesprochen.", &sections, &profile);
        let b = build_prompt("Wir haben gesprochen.", &sections, &profile);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_numbers_sections_with_display_labels() {
        let profile = profile();
        let sections = with_highlights(&profile.sections);
        let prompt = build_prompt("Transkript", &sections, &profile);

        assert!(prompt.contains("1. **Agenda-Überblick** – Was wurde besprochen?"));
        assert!(prompt.contains("2. **Entscheidungen**"));
        assert!(prompt.contains("3. **Highlights**"));
    }

    #[test]
    fn test_absent_context_fields_render_placeholder() {
        let profile = profile();
        let sections = with_highlights(&profile.sections);
        let prompt = build_prompt("Transkript", &sections, &profile);

        assert!(prompt.contains(&format!("- Besprechungstyp: {PLACEHOLDER_TEXT}")));
        assert!(prompt.contains(&format!("- Notizen: {PLACEHOLDER_TEXT}")));
    }

    #[test]
    fn test_present_context_fields_render_value() {
        let mut profile = profile();
        profile.meeting_type = Some("Sprint-Review".to_string());
        profile.audience = Some("Team".to_string());
        let sections = with_highlights(&profile.sections);
        let prompt = build_prompt("Transkript", &sections, &profile);

        assert!(prompt.contains("- Besprechungstyp: Sprint-Review"));
        assert!(prompt.contains("- Zielgruppe: Team"));
    }

    #[test]
    fn test_transcript_is_appended_verbatim() {
        let profile = profile();
        let sections = with_highlights(&profile.sections);
        let prompt = build_prompt("Zeile eins.\nZeile zwei.", &sections, &profile);
        assert!(prompt.ends_with("Transkript (bereinigt):\n\nZeile eins.\nZeile zwei.\n"));
    }
}
