//! RPC modules.

mod faucet;

pub use faucet::*;
