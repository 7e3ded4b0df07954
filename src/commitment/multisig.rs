//! Transactions executed by the channel's multisig.

use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        encode_call, keccak256, packed_hash,
        types::{hex_bytes, Address, Hash, Signature, U256},
        Packed, Token,
    },
    network::{NetworkContext, COMMITMENT_PREFIX, ETH_TOKEN_ADDRESS},
    Result,
};

use super::{sort_signatures_by_signer, SignedTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultisigOperation {
    Call = 0,
    DelegateCall = 1,
}

/// A call the multisig makes once it holds both owners' signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigTransaction {
    pub multisig_address: Address,
    /// Sorted owners, i.e. the key index 0 addresses of both participants.
    pub multisig_owners: [Address; 2],
    pub to: Address,
    pub value: U256,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub operation: MultisigOperation,
}

impl MultisigTransaction {
    /// `keccak256(abi.encodePacked(bytes1(0x19), owners, to, value, keccak256(data), uint8(operation)))`
    pub fn hash_to_sign(&self) -> Hash {
        packed_hash(&[
            Packed::Bytes(&[COMMITMENT_PREFIX]),
            Packed::AddressArray(&self.multisig_owners),
            Packed::Address(self.to),
            Packed::Uint256(self.value),
            Packed::Bytes(&keccak256(&self.data).0),
            Packed::Uint8(self.operation as u8),
        ])
    }

    /// `execTransaction` on the multisig, carrying the signatures in owner
    /// order.
    pub fn signed_transaction(&self, signatures: &[Signature]) -> Result<SignedTransaction> {
        let sorted = sort_signatures_by_signer(self.hash_to_sign(), signatures)?;
        let data = encode_call(
            "execTransaction(address,uint256,bytes,uint8,bytes[])",
            &[
                Token::Address(self.to),
                Token::Uint(self.value),
                Token::Bytes(self.data.clone()),
                Token::uint(self.operation as u8),
                Token::Array(sorted.iter().map(|s| Token::Bytes(s.0.to_vec())).collect()),
            ],
        )?;

        Ok(SignedTransaction {
            to: self.multisig_address,
            value: U256::zero(),
            data,
        })
    }
}

/// Delegatecall that makes the free balance (and through it every installed
/// app) enforceable.
pub fn setup_commitment(
    network: &NetworkContext,
    multisig_address: Address,
    multisig_owners: [Address; 2],
    free_balance_identity_hash: Hash,
) -> Result<MultisigTransaction> {
    Ok(MultisigTransaction {
        multisig_address,
        multisig_owners,
        to: network.conditional_transaction_delegate_target,
        value: U256::zero(),
        data: encode_call(
            "executeEffectOfFreeBalance(address,bytes32,address)",
            &[
                Token::Address(network.challenge_registry),
                Token::hash(free_balance_identity_hash),
                Token::Address(network.multi_asset_multi_party_coin_transfer_interpreter),
            ],
        )?,
        operation: MultisigOperation::DelegateCall,
    })
}

/// Delegatecall paying out an app's outcome through its interpreter.
pub fn conditional_transaction_commitment(
    network: &NetworkContext,
    multisig_address: Address,
    multisig_owners: [Address; 2],
    app_identity_hash: Hash,
    free_balance_identity_hash: Hash,
    interpreter: Address,
    encoded_interpreter_params: Vec<u8>,
) -> Result<MultisigTransaction> {
    Ok(MultisigTransaction {
        multisig_address,
        multisig_owners,
        to: network.conditional_transaction_delegate_target,
        value: U256::zero(),
        data: encode_call(
            "executeEffectOfInterpretedAppOutcome(address,bytes32,bytes32,address,bytes)",
            &[
                Token::Address(network.challenge_registry),
                Token::hash(free_balance_identity_hash),
                Token::hash(app_identity_hash),
                Token::Address(interpreter),
                Token::Bytes(encoded_interpreter_params),
            ],
        )?,
        operation: MultisigOperation::DelegateCall,
    })
}

/// Direct payout from the multisig: a plain value transfer for ETH, an ERC20
/// `transfer` otherwise.
pub fn withdraw_commitment(
    multisig_address: Address,
    multisig_owners: [Address; 2],
    recipient: Address,
    token: Address,
    amount: U256,
) -> Result<MultisigTransaction> {
    let (to, value, data) = if token == ETH_TOKEN_ADDRESS {
        (recipient, amount, Vec::new())
    } else {
        (
            token,
            U256::zero(),
            encode_call(
                "transfer(address,uint256)",
                &[Token::Address(recipient), Token::Uint(amount)],
            )?,
        )
    };

    Ok(MultisigTransaction {
        multisig_address,
        multisig_owners,
        to,
        value,
        data,
        operation: MultisigOperation::Call,
    })
}
