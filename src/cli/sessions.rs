use anyhow::{anyhow, Result};

use crate::db::{self, SessionRepository};
use crate::summary::SummaryResult;

use super::args::SessionsCliArgs;

pub fn handle_sessions_command(args: SessionsCliArgs) -> Result<()> {
    let conn = db::init_db()?;

    if let Some(id) = args.id {
        let record = SessionRepository::get(&conn, &id)?
            .ok_or_else(|| anyhow!("Session with ID {} not found", id))?;

        println!("ID: {}", record.id);
        println!("Status: {}", record.status);
        println!("Created: {}", record.created_at);
        if let Some(title) = &record.title {
            println!("Title: {}", title);
        }
        if let Some(transcript) = &record.transcript_text {
            println!("\nTranscript:\n{}", transcript);
        }
        if let Some(summary_json) = &record.summary_json {
            if let Ok(summary) = serde_json::from_str::<SummaryResult>(summary_json) {
                println!("\nSummary:");
                for section in &summary.sections {
                    println!("  {}: {}", section.name, section.text);
                }
                for highlight in &summary.highlights {
                    println!("  * {}", highlight);
                }
            }
        }
        return Ok(());
    }

    let records = SessionRepository::list(&conn)?;
    if records.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }

    println!("Found {} session(s):\n", records.len().min(args.limit));

    for record in records.iter().take(args.limit) {
        println!("ID: {}", record.id);
        println!("Date: {}", record.created_at);
        println!("Status: {}", record.status);
        if let Some(title) = &record.title {
            println!("Title: {}", title);
        }
        println!("---");
    }

    println!("\nTo show a full session, use: protokoll sessions --id <ID>");

    Ok(())
}
