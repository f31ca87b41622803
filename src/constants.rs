//! Faucet constants.

use alloy::primitives::{U256, uint};
use std::time::Duration;

/// Default port to serve the RPC on.
pub const DEFAULT_PORT: u16 = 3000;

/// Default port to serve the metrics on.
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Default maximum number of concurrent RPC connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 1000;

/// Origin allowed to call the faucet from a browser by default.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://app.overlay.market";

/// Base fee assumed when the latest block does not report one (1 gwei).
pub const DEFAULT_BASE_FEE_FLOOR: u128 = 1_000_000_000;

/// Increment added on top of the base fee for the priority fee (2 gwei).
pub const DEFAULT_PRIORITY_FEE_INCREMENT: u128 = 2_000_000_000;

/// Minimum reference balance required to claim (0.002 of the native unit).
pub const DEFAULT_MIN_ELIGIBLE_BALANCE: U256 = uint!(2000000000000000_U256);

/// Snapshot timestamp of the historical balance check (13th May 2025, 16:00 UTC).
pub const DEFAULT_SNAPSHOT_TIMESTAMP: u64 = 1_747_144_800;

/// Timeout applied to every RPC request and to every dispatched transfer.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Reason reported for claims that were already fulfilled.
pub const ALREADY_CLAIMED_REASON: &str = "already claimed";

/// Reason reported for claims that failed on a nonce conflict or timeout.
pub const RETRY_SHORTLY_REASON: &str = "too many requests, please try again in a few seconds";

/// Response of the `health` method.
pub const HEALTH_RESPONSE: &str = "Service is up!";
