//! Two-party state channel protocol engine.
//!
//! Two participants sharing a multisig keep an off-chain record of their
//! balances and installed apps, updated by the protocols in [protocol]. Every
//! update is co-signed as a [commitment] that either party can later take on
//! chain. The [machine::ProtocolRunner] executes the protocols against the
//! participant's [store], keys and [wire] transport.

pub mod abiencode {
    mod error;
    mod hashing;
    mod packed;
    mod token;

    pub mod types;

    pub use error::{Error, Result};
    pub use hashing::{encode_call, keccak256, packed_hash, selector, to_hash, Keccak256Writer};
    pub use packed::{encode_packed, Packed};
    pub use token::{encode, to_writer, Token, Writer};

    #[cfg(test)]
    mod tests;
}

pub mod apps;
pub mod chain;
pub mod commitment;
pub mod error;
pub mod keys;
pub mod machine;
pub mod model;
pub mod network;
pub mod protocol;
pub mod sig;
pub mod store;
pub mod wire;

pub use abiencode::types::{Address, Hash, ProcessId, Signature, U256};
pub use error::{Error, Result};
pub use machine::ProtocolRunner;
