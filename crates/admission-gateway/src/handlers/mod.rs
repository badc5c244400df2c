//! Terminal route handlers.

pub mod contract;
pub mod data;
pub mod delegate;

pub use contract::{ContractHandler, ContractOp, ContractState};
pub use data::{constant_time_compare, fetch_binary, keccak_hex};
pub use delegate::Delegate;
