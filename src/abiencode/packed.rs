//! Non-standard packed encoding (`abi.encodePacked`), as used by the
//! commitment digests.
//!
//! Only the handful of types the contracts pack are supported. Elements of
//! packed arrays are still padded to 32 bytes, single values are not.

use super::types::{Address, U256};

#[derive(Debug, Clone, Copy)]
pub enum Packed<'a> {
    /// `bytes`, `bytes1` .. `bytes32`: copied verbatim.
    Bytes(&'a [u8]),
    Uint8(u8),
    Uint256(U256),
    Address(Address),
    /// `address[]`: every element padded to a full slot.
    AddressArray(&'a [Address]),
}

pub fn encode_packed(values: &[Packed<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        match value {
            Packed::Bytes(bytes) => out.extend_from_slice(bytes),
            Packed::Uint8(v) => out.push(*v),
            Packed::Uint256(v) => out.extend_from_slice(&v.to_be_bytes()),
            Packed::Address(a) => out.extend_from_slice(&a.0),
            Packed::AddressArray(addrs) => {
                for a in addrs.iter() {
                    out.extend_from_slice(&a.to_word());
                }
            }
        }
    }
    out
}
