//! Core types and constants shared by the avaxp crates.
//!
//! This crate provides the foundational pieces every transaction builder
//! needs: 32-byte and 20-byte identifiers with their cb58 text forms, node
//! ids, bech32 chain addresses, EVM hex addresses, and per-network constants.

pub mod address;
pub mod cb58;
pub mod ids;
pub mod network;

pub use address::{format_address, parse_address, AddressError, EvmAddress};
pub use ids::{Id, IdError, NodeId, ShortId};
pub use network::{NetworkError, NetworkParams};
