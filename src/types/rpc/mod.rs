//! RPC request and response types.

mod faucet;
pub use faucet::*;
