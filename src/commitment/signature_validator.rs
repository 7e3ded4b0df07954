use log::warn;

use crate::{
    abiencode::types::{Address, Signature},
    sig::recover_signer,
    Error, Result,
};

use super::Commitment;

/// Check that `signature` over `commitment` was made by `expected_signer`.
///
/// Both inputs come straight from counterparty messages, a missing one is an
/// error just like a wrong signer.
pub fn assert_is_valid_signature(
    expected_signer: Address,
    commitment: Option<&Commitment>,
    signature: Option<&Signature>,
) -> Result<()> {
    let (commitment, signature) = match (commitment, signature) {
        (Some(c), Some(s)) => (c, s),
        _ => return Err(Error::MissingSignatureInput),
    };

    let hash = commitment.hash_to_sign();
    let recovered = recover_signer(hash, *signature)?;

    if recovered != expected_signer {
        warn!(
            "Rejecting signature on {}: signed by {}, expected {}",
            hash, recovered, expected_signer
        );
        return Err(Error::InvalidSignature {
            expected: expected_signer,
            recovered,
            hash,
        });
    }
    Ok(())
}
