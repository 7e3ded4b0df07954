use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        encode_call, packed_hash,
        types::{Address, Hash, Signature, U256},
        Packed, Token,
    },
    model::{AppIdentity, AppInstance},
    network::{NetworkContext, COMMITMENT_PREFIX},
    Result,
};

use super::{sort_signatures_by_signer, SignedTransaction};

/// Agreement on an app state at a version, enforceable at the challenge
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStateCommitment {
    pub challenge_registry: Address,
    pub app_identity: AppIdentity,
    pub app_identity_hash: Hash,
    pub app_state_hash: Hash,
    pub version_number: u64,
    pub timeout: u64,
}

impl SetStateCommitment {
    pub fn from_app_instance(network: &NetworkContext, app: &AppInstance) -> Result<Self> {
        Ok(Self {
            challenge_registry: network.challenge_registry,
            app_identity: app.identity().clone(),
            app_identity_hash: app.identity_hash(),
            app_state_hash: app.hash_of_latest_state()?,
            version_number: app.version_number(),
            timeout: app.timeout(),
        })
    }

    /// `keccak256(abi.encodePacked(bytes1(0x19), identityHash, versionNumber, timeout, appStateHash))`
    pub fn hash_to_sign(&self) -> Hash {
        packed_hash(&[
            Packed::Bytes(&[COMMITMENT_PREFIX]),
            Packed::Bytes(&self.app_identity_hash.0),
            Packed::Uint256(U256::from(self.version_number)),
            Packed::Uint256(U256::from(self.timeout)),
            Packed::Bytes(&self.app_state_hash.0),
        ])
    }

    /// `ChallengeRegistry.setState` with the signatures concatenated in signer
    /// order.
    pub fn signed_transaction(&self, signatures: &[Signature]) -> Result<SignedTransaction> {
        let sorted = sort_signatures_by_signer(self.hash_to_sign(), signatures)?;
        let packed_signatures: Vec<u8> = sorted.iter().flat_map(|s| s.0).collect();

        let data = encode_call(
            "setState((uint256,address[],address,uint256),(bytes32,uint256,uint256,bytes))",
            &[
                self.app_identity.to_token(),
                Token::Tuple(vec![
                    Token::hash(self.app_state_hash),
                    Token::uint(self.version_number),
                    Token::uint(self.timeout),
                    Token::Bytes(packed_signatures),
                ]),
            ],
        )?;

        Ok(SignedTransaction {
            to: self.challenge_registry,
            value: U256::zero(),
            data,
        })
    }
}
