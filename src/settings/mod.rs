//! Protocol settings: which sections the result protocol contains and the
//! free-text context handed to the generation prompt.
//!
//! The profile lives as a singleton row in the database. Every new session
//! copies the profile by value, so edits never reach sessions that are
//! already recording or finished.

use serde::{Deserialize, Serialize};

/// Section order matters: it defines both the prompt order and the order of
/// the structured result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsProfile {
    pub language: String,
    pub tone: String,
    pub sections: Vec<String>,
    pub meeting_type: Option<String>,
    pub audience: Option<String>,
    pub objectives: Option<String>,
    pub notes: Option<String>,
}

impl Default for SettingsProfile {
    fn default() -> Self {
        Self {
            language: "de".to_string(),
            tone: "praegnant".to_string(),
            sections: default_sections(),
            meeting_type: None,
            audience: None,
            objectives: None,
            notes: None,
        }
    }
}

pub fn default_sections() -> Vec<String> {
    [
        "Agenda-Ueberblick",
        "Entscheidungen",
        "Aufgaben",
        "Verantwortliche",
        "Fristen",
        "Risiken",
        "Offene Punkte",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl SettingsProfile {
    /// Configured sections with blanks and duplicates removed, falling back
    /// to the defaults when nothing usable is configured.
    pub fn effective_sections(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for section in &self.sections {
            let trimmed = section.trim();
            if trimmed.is_empty() || seen.iter().any(|s| s == trimmed) {
                continue;
            }
            seen.push(trimmed.to_string());
        }
        if seen.is_empty() {
            return default_sections();
        }
        seen
    }
}
