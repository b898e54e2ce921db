use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

const DEFAULT_DB_PATH: &str = "data/snippets.sqlite";
const DEFAULT_USER_AGENT: &str = concat!("snippet_scraper/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CLIPBOARD_HOLD_SECS: u64 = 30;

/// Runtime settings, overridable with `SNIPPETS_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// How long `build` keeps serving the clipboard on Linux.
    pub clipboard_hold_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix("SNIPPETS"))
    }

    fn from_env(env: Environment) -> Result<Self> {
        Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("clipboard_hold_secs", DEFAULT_CLIPBOARD_HOLD_SECS)?
            .add_source(env)
            .build()
            .and_then(Config::try_deserialize)
            .context("Failed to load settings")
    }
}

// ── Tests ──
