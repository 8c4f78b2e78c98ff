use common::init_db_pool;
use vnnews::setup;
use vnnews::storage;

/// Stores a Gemini API key in the config table, so the server can start
/// without the key in config or environment.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let api_key = match args.next() {
        Some(key) => key,
        None => anyhow::bail!("Usage: set_api_key <api-key> [db-path]"),
    };
    let db_path = args.next().unwrap_or_else(|| "data/vnnews.db".to_string());

    setup::validate_api_key(&api_key)?;

    let pool = init_db_pool(&db_path).await?;
    storage::ensure_schema(&pool).await?;
    storage::set_gemini_api_key(&pool, &api_key).await?;

    println!("Gemini API key stored in {}", db_path);
    Ok(())
}
