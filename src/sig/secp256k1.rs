//! Signer using libsecp256k1 through the secp256k1 crate.

use crate::abiencode::types::{Address, Hash, Signature};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};

use super::{recovery_id, Error};

impl From<&PublicKey> for Address {
    fn from(pk: &PublicKey) -> Self {
        Address::from_uncompressed_public_key(&pk.serialize_uncompressed())
    }
}

pub struct Signer {
    secp: Secp256k1<All>,
    sk: SecretKey,
    addr: Address,
}

impl core::fmt::Debug for Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signer").field("addr", &self.addr).finish()
    }
}

impl Signer {
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(rng);
        Self {
            secp,
            sk,
            addr: (&pk).into(),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Result<Self, Error> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(secret).map_err(|_| Error::InvalidSecretKey)?;
        let addr = (&PublicKey::from_secret_key(&secp, &sk)).into();
        Ok(Self { secp, sk, addr })
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    /// Sign a 32 byte digest, producing `r || s || v` with `v` in `{27, 28}`.
    pub fn sign_digest(&self, hash: Hash) -> Result<Signature, Error> {
        let msg = Message::from_slice(&hash.0).map_err(|e| Error::Backend(e.to_string()))?;

        // We have to use sign_ecdsa_recoverable because the contract must be
        // able to recover the address. This gives us the additional information
        // needed for v.
        let sig = self.secp.sign_ecdsa_recoverable(&msg, &self.sk);
        let (v, rs) = sig.serialize_compact();

        // EIP-2 makes signatures with a non-canonical s invalid. The library
        // already produces canonical signatures, fail early if that changes.
        debug_assert!(rs[32] & 0x80 == 0);

        Ok(Signature::new(&rs, 27 + v.to_i32() as u8))
    }
}

pub fn recover_signer(hash: Hash, eth_sig: Signature) -> Result<Address, Error> {
    let secp = Secp256k1::verification_only();
    let map_err = |e: secp256k1::Error| Error::Backend(e.to_string());

    let recid = RecoveryId::from_i32(recovery_id(&eth_sig)?.into()).map_err(map_err)?;
    let sig = RecoverableSignature::from_compact(&eth_sig.0[..64], recid).map_err(map_err)?;
    let msg = Message::from_slice(&hash.0).map_err(map_err)?;

    let pk = secp.recover_ecdsa(&msg, &sig).map_err(map_err)?;
    Ok((&pk).into())
}
