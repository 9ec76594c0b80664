//! Settings profile persistence.
//!
//! A single `app_settings` row (id = "default") holds the profile as JSON.
//! The first read materializes the defaults so the row always exists
//! afterwards.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::settings::SettingsProfile;

const SETTINGS_ID: &str = "default";

pub struct SettingsRepository;

impl SettingsRepository {
    /// Load the profile, creating the default row when none exists yet.
    pub fn load_or_default(conn: &Connection) -> Result<SettingsProfile> {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM app_settings WHERE id = ?1",
                params![SETTINGS_ID],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query settings")?;

        match data {
            Some(json) => {
                serde_json::from_str(&json).context("Failed to parse stored settings profile")
            }
            None => {
                let profile = SettingsProfile::default();
                Self::save(conn, &profile)?;
                Ok(profile)
            }
        }
    }

    /// Replace the profile wholesale.
    pub fn save(conn: &Connection, profile: &SettingsProfile) -> Result<()> {
        let json = serde_json::to_string(profile).context("Failed to serialize settings")?;
        conn.execute(
            "INSERT INTO app_settings (id, data) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            params![SETTINGS_ID, json],
        )
        .context("Failed to save settings")?;
        Ok(())
    }
}
