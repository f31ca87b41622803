//! # Faucet
//!
//! Library for the implementation of a testnet token faucet.
//!
//! The faucet gates recipients on their balance on reference networks, records claims in a
//! per-chain ledger and sends native and ERC-20 tokens from a single funding wallet.

pub mod cli;
pub mod config;
pub mod constants;
pub mod eligibility;
pub mod error;
pub mod faucet;
pub mod ledger;
pub mod metrics;
pub mod nonce;
pub mod provider;
pub mod rpc;
pub mod serde;
pub mod signers;
pub mod spawn;
pub mod transactions;
pub mod transport;
pub mod types;
