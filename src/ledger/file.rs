//! Claim ledger stored as one JSON file per chain.

use super::api::{ChainLedger, LedgerStoreApi, Result};
use crate::types::Network;
use async_trait::async_trait;
use std::{io::ErrorKind, path::PathBuf};
use tracing::debug;

/// [`LedgerStoreApi`] implementation backed by JSON files.
///
/// Each file maps recipient addresses to the token kinds they claimed.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    directory: PathBuf,
}

impl FileLedgerStore {
    /// Creates a store keeping its files in `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    /// Path of the ledger file of `chain`.
    pub fn path(&self, chain: Network) -> PathBuf {
        self.directory.join(chain.ledger_file_name())
    }
}

#[async_trait]
impl LedgerStoreApi for FileLedgerStore {
    async fn load(&self, chain: Network) -> Result<ChainLedger> {
        let path = self.path(chain);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(%chain, path = %path.display(), "No ledger file, starting empty");
                return Ok(ChainLedger::new());
            }
            Err(err) => return Err(err.into()),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(ChainLedger::new());
        }

        Ok(serde_json::from_slice(&data)?)
    }

    async fn save(&self, chain: Network, ledger: &ChainLedger) -> Result<()> {
        let path = self.path(chain);
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(ledger)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(())
    }
}
