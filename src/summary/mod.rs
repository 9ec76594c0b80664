//! Structured protocol generation.
//!
//! One best-effort call to the text-generation service turns the cleaned
//! transcript into a section-complete protocol. The service is treated as
//! unreliable by contract: timeouts, transport errors, garbage envelopes and
//! empty replies all degrade to the placeholder result instead of failing
//! the session.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::settings::SettingsProfile;

pub mod ollama;
mod parser;
pub mod prompt;
pub mod sections;

pub use ollama::OllamaClient;
pub use sections::{HIGHLIGHT_SECTION, PLACEHOLDER_TEXT};

/// One named section of the protocol, in configured order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub name: String,
    pub text: String,
}

/// Structured result of one summarize attempt.
///
/// Built once per finalize attempt and never mutated afterwards; every
/// configured section is guaranteed an entry with non-empty text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub sections: Vec<SectionSummary>,
    pub highlights: Vec<String>,
    /// The unmodified reply text; empty on the fallback path.
    pub raw: String,
}

impl SummaryResult {
    /// Placeholder-only result used when generation is skipped or fails.
    pub fn fallback(sections: &[String]) -> Self {
        Self {
            sections: sections
                .iter()
                .map(|name| SectionSummary {
                    name: name.clone(),
                    text: PLACEHOLDER_TEXT.to_string(),
                })
                .collect(),
            highlights: Vec::new(),
            raw: String::new(),
        }
    }

    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.text.as_str())
    }
}

/// Narrow contract to the text-generation service: one non-streaming
/// request, one text reply.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

pub struct Summarizer {
    client: Arc<dyn GenerationClient>,
    model: String,
}

impl Summarizer {
    pub fn new(client: Arc<dyn GenerationClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Summarize a transcript into the structured protocol.
    ///
    /// Never fails. An empty transcript short-circuits to the fallback
    /// without touching the generation service.
    pub async fn summarize(
        &self,
        transcript: &str,
        profile: &SettingsProfile,
    ) -> SummaryResult {
        let sections = profile.effective_sections();
        let text = transcript.trim();
        if text.is_empty() {
            debug!("Empty transcript, skipping generation call");
            return SummaryResult::fallback(&sections);
        }

        let prompt_sections = sections::with_highlights(&sections);
        let prompt = prompt::build_prompt(text, &prompt_sections, profile);

        let reply = match self.client.generate(&self.model, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Generation call failed, using placeholder protocol: {e:#}");
                return SummaryResult::fallback(&sections);
            }
        };

        let reply = reply.trim();
        if reply.is_empty() {
            warn!("Generation service returned an empty reply");
            return SummaryResult::fallback(&sections);
        }

        parser::validate_reply(reply, &prompt_sections);
        let mut result = parser::parse_reply(reply, &sections, &prompt_sections);
        result.raw = reply.to_string();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeGeneration {
        reply: Result<String, String>,
        calls: AtomicUsize,
    }

    impl FakeGeneration {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationClient for FakeGeneration {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(message) => anyhow::bail!("{message}"),
            }
        }
    }

    fn profile_with(sections: &[&str]) -> SettingsProfile {
        SettingsProfile {
            sections: sections.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_transcript_skips_generation() {
        let client = FakeGeneration::replying("unreachable");
        let summarizer = Summarizer::new(client.clone(), "llama3");
        let profile = profile_with(&["Entscheidungen"]);

        let result = summarizer.summarize("   \n ", &profile).await;

        assert_eq!(result, SummaryResult::fallback(&profile.effective_sections()));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_fallback() {
        let client = FakeGeneration::failing("connection refused");
        let summarizer = Summarizer::new(client.clone(), "llama3");
        let profile = profile_with(&["Entscheidungen", "Aufgaben"]);

        let result = summarizer.summarize("Wir haben gesprochen.", &profile).await;

        assert_eq!(client.calls(), 1);
        assert_eq!(result.section("Entscheidungen"), Some(PLACEHOLDER_TEXT));
        assert_eq!(result.section("Aufgaben"), Some(PLACEHOLDER_TEXT));
        assert!(result.highlights.is_empty());
        assert_eq!(result.raw, "");
    }

    #[tokio::test]
    async fn test_blank_reply_degrades_to_fallback() {
        let client = FakeGeneration::replying("  \n  ");
        let summarizer = Summarizer::new(client, "llama3");
        let profile = profile_with(&["Entscheidungen"]);

        let result = summarizer.summarize("Wir haben gesprochen.", &profile).await;
        assert_eq!(result, SummaryResult::fallback(&profile.effective_sections()));
    }

    #[tokio::test]
    async fn test_every_configured_section_is_present_and_non_empty() {
        let client = FakeGeneration::replying("Entscheidungen\nBudget genehmigt.");
        let summarizer = Summarizer::new(client, "llama3");
        let profile = profile_with(&["Agenda-Ueberblick", "Entscheidungen", "Risiken"]);

        let result = summarizer.summarize("Wir haben gesprochen.", &profile).await;

        let names: Vec<&str> = result.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Agenda-Ueberblick", "Entscheidungen", "Risiken"]);
        assert!(result.sections.iter().all(|s| !s.text.is_empty()));
        assert_eq!(result.section("Entscheidungen"), Some("Budget genehmigt."));
    }

    #[tokio::test]
    async fn test_parsed_reply_keeps_raw_text() {
        let reply = "1. Agenda-Überblick: Budget wurde besprochen.\n2. Entscheidungen: Keine.";
        let client = FakeGeneration::replying(reply);
        let summarizer = Summarizer::new(client, "llama3");
        let profile = profile_with(&["Agenda-Ueberblick", "Entscheidungen"]);

        let result = summarizer
            .summarize("Wir haben das Budget besprochen. Keine weiteren Punkte.", &profile)
            .await;

        assert_eq!(
            result.section("Agenda-Ueberblick"),
            Some("Budget wurde besprochen.")
        );
        assert_eq!(result.section("Entscheidungen"), Some("Keine."));
        assert!(result.highlights.is_empty());
        assert_eq!(result.raw, reply);
    }
}
