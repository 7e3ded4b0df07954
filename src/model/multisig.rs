//! Counterfactual multisig address derivation.

use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        encode_call, keccak256, packed_hash,
        types::{Address, U256},
        Packed, Token,
    },
    keys::{xkeys_to_sorted_kth_addresses, Xpub},
    network::NetworkContext,
    Result,
};

/// Contracts a channel's multisig proxy is created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalAddresses {
    pub proxy_factory: Address,
    pub multisig_mastercopy: Address,
}

impl From<&NetworkContext> for CriticalAddresses {
    fn from(network: &NetworkContext) -> Self {
        Self {
            proxy_factory: network.proxy_factory,
            multisig_mastercopy: network.minimum_viable_multisig,
        }
    }
}

/// Address the proxy factory deploys the multisig of `owners` to via CREATE2.
///
/// The salt commits to the owners' `setup(address[])` call, nonce 0.
pub fn get_create2_multisig_address(owners: &[Xpub; 2], network: &NetworkContext) -> Result<Address> {
    let sorted = xkeys_to_sorted_kth_addresses(owners, 0)?;
    let setup = encode_call(
        "setup(address[])",
        &[Token::Array(sorted.iter().copied().map(Token::Address).collect())],
    )?;

    let salt = packed_hash(&[
        Packed::Bytes(&keccak256(&setup).0),
        Packed::Uint256(U256::zero()),
    ]);
    let init_code_hash = packed_hash(&[
        Packed::Bytes(&network.proxy_creation_code),
        Packed::Uint256(network.minimum_viable_multisig.into()),
    ]);

    let hash = packed_hash(&[
        Packed::Bytes(&[0xff]),
        Packed::Address(network.proxy_factory),
        Packed::Bytes(&salt.0),
        Packed::Bytes(&init_code_hash.0),
    ]);

    let mut addr = Address::default();
    addr.0.copy_from_slice(&hash.0[12..]);
    Ok(addr)
}
