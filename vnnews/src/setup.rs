use anyhow::{bail, Context, Result};
use common::Config;
use sqlx::SqlitePool;
use tracing::info;

use crate::storage;

/// Minimum accepted key length. Real Gemini keys are far longer; this only
/// catches obvious paste accidents.
pub const MIN_API_KEY_LEN: usize = 10;

/// Rejects keys that cannot possibly be valid.
pub fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.chars().count() < MIN_API_KEY_LEN {
        bail!(
            "invalid Gemini API key: expected at least {} characters",
            MIN_API_KEY_LEN
        );
    }
    Ok(())
}

/// Resolves the Gemini API key at startup. Order: inline config value, then
/// the named environment variable, then the key persisted in the config
/// table by an earlier run. A key from config or environment is validated
/// and persisted so later runs can start without it.
pub async fn resolve_api_key(config: &Config, pool: &SqlitePool) -> Result<String> {
    let gemini = config.gemini.clone().unwrap_or_default();

    if let Some(api_key) = gemini.api_key {
        validate_api_key(&api_key)?;
        storage::set_gemini_api_key(pool, &api_key).await?;
        info!("using Gemini API key from configuration");
        return Ok(api_key);
    }

    if let Some(env_name) = gemini.api_key_env {
        if let Ok(api_key) = std::env::var(&env_name) {
            validate_api_key(&api_key)
                .with_context(|| format!("environment variable {} holds an invalid key", env_name))?;
            storage::set_gemini_api_key(pool, &api_key).await?;
            info!(env = %env_name, "using Gemini API key from environment");
            return Ok(api_key);
        }
    }

    if let Some(api_key) = storage::get_gemini_api_key(pool).await? {
        info!("using Gemini API key stored in database");
        return Ok(api_key);
    }

    bail!("Chưa cấu hình Gemini API Key")
}
