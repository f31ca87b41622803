//! Faucet types.

mod claim;
pub use claim::*;

mod erc20;
pub use erc20::*;

mod network;
pub use network::*;

pub mod rpc;

mod token;
pub use token::*;
