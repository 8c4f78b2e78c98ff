// Library interface for the vnnews modules.
// This allows integration tests and the utility binaries to import them.

pub mod entry;
pub mod ingestion;
pub mod llm;
pub mod processing;
pub mod scraping;
pub mod sensor;
pub mod server;
pub mod setup;
pub mod storage;
