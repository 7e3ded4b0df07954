//! Handles the creation and verification of (Ethereum) Signatures.
//!
//! Commitments are signed as raw digests: the digests already start with the
//! `0x19` byte the contracts expect, so no `Ethereum Signed Message` prefix is
//! added here.

use crate::abiencode::types::{Address, Hash, Signature};
use thiserror::Error;

mod k256;
#[cfg(feature = "secp256k1")]
mod secp256k1;

#[cfg(not(feature = "secp256k1"))]
pub use self::k256::Signer;
#[cfg(feature = "secp256k1")]
pub use self::secp256k1::Signer;


#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid recovery id {0}, expected 27 or 28")]
    InvalidRecoveryId(u8),
    #[error("invalid secret key")]
    InvalidSecretKey,
    #[error("signing backend error: {0}")]
    Backend(String),
}

/// Recover the address that produced `sig` over `hash`.
pub fn recover_signer(hash: Hash, sig: Signature) -> Result<Address, Error> {
    #[cfg(not(feature = "secp256k1"))]
    return self::k256::recover_signer(hash, sig);
    #[cfg(feature = "secp256k1")]
    return self::secp256k1::recover_signer(hash, sig);
}

/// Strip the EVM offset of 27 from v.
fn recovery_id(sig: &Signature) -> Result<u8, Error> {
    match sig.0[64] {
        v @ (27 | 28) => Ok(v - 27),
        v => Err(Error::InvalidRecoveryId(v)),
    }
}
