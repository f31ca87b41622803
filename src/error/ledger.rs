/// Errors returned by the claim ledger storage.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Reading or writing the backing file failed.
    #[error("ledger i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The ledger could not be (de)serialized.
    #[error("malformed ledger: {0}")]
    Serde(#[from] serde_json::Error),
}
