use super::{
    packed::{encode_packed, Packed},
    to_writer,
    token::{encode, Token},
    types::Hash,
    Error, Writer,
};

use sha3::{
    digest::{core_api::CoreWrapper, Output},
    Digest, Keccak256, Keccak256Core,
};

pub struct Keccak256Writer {
    hasher: CoreWrapper<Keccak256Core>,
}

impl Default for Keccak256Writer {
    fn default() -> Self {
        Self {
            hasher: Keccak256::new(),
        }
    }
}

impl Writer for Keccak256Writer {
    fn write(&mut self, slot: &[u8]) {
        self.hasher.update(slot);
    }
}

impl Keccak256Writer {
    pub fn finalize(self) -> Output<Keccak256> {
        self.hasher.finalize()
    }
}

/// `keccak256(abi.encode(tokens...))`
pub fn to_hash(tokens: &[Token]) -> Result<Hash, Error> {
    let mut writer = Keccak256Writer::default();
    to_writer(tokens, &mut writer)?;
    Ok(Hash(writer.finalize().into()))
}

/// `keccak256(abi.encodePacked(values...))`
pub fn packed_hash(values: &[Packed<'_>]) -> Hash {
    keccak256(&encode_packed(values))
}

pub fn keccak256(bytes: &[u8]) -> Hash {
    Hash(Keccak256::digest(bytes).into())
}

/// First four bytes of the hash of a canonical function signature such as
/// `transfer(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.0[..4]);
    out
}

/// Calldata for a call to `signature` with the given arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Result<Vec<u8>, Error> {
    let mut data = selector(signature).to_vec();
    data.extend(encode(args)?);
    Ok(data)
}
