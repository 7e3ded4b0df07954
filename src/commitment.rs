//! Commitments: the transactions both participants sign so either of them can
//! enforce the latest agreed state on chain.

mod multisig;
mod set_state;
mod signature_validator;


use serde::{Deserialize, Serialize};

use crate::{
    abiencode::types::{hex_bytes, Address, Hash, Signature, U256},
    sig::recover_signer,
    Result,
};

pub use multisig::{
    conditional_transaction_commitment, setup_commitment, withdraw_commitment, MultisigOperation,
    MultisigTransaction,
};
pub use set_state::SetStateCommitment;
pub use signature_validator::assert_is_valid_signature;

/// A fully signed transaction, ready to be submitted by either party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub to: Address,
    pub value: U256,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Commitment {
    Setup(MultisigTransaction),
    ConditionalTransaction(MultisigTransaction),
    SetState(SetStateCommitment),
    Withdraw(MultisigTransaction),
}

impl Commitment {
    pub fn hash_to_sign(&self) -> Hash {
        match self {
            Commitment::Setup(tx)
            | Commitment::ConditionalTransaction(tx)
            | Commitment::Withdraw(tx) => tx.hash_to_sign(),
            Commitment::SetState(c) => c.hash_to_sign(),
        }
    }

    pub fn signed_transaction(&self, signatures: &[Signature]) -> Result<SignedTransaction> {
        match self {
            Commitment::Setup(tx)
            | Commitment::ConditionalTransaction(tx)
            | Commitment::Withdraw(tx) => tx.signed_transaction(signatures),
            Commitment::SetState(c) => c.signed_transaction(signatures),
        }
    }
}

/// Order signatures by the address that made them, ascending. The contracts
/// require this to cheaply reject duplicate signers.
pub fn sort_signatures_by_signer(hash: Hash, signatures: &[Signature]) -> Result<Vec<Signature>> {
    let mut with_signer = signatures
        .iter()
        .map(|sig| Ok((recover_signer(hash, *sig)?, *sig)))
        .collect::<Result<Vec<_>>>()?;
    with_signer.sort_by_key(|(signer, _)| *signer);
    Ok(with_signer.into_iter().map(|(_, sig)| sig).collect())
}
