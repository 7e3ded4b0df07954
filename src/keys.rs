//! Hierarchical key handling.
//!
//! Every participant is identified by an extended public key. The key at child
//! index `k` (non-hardened, BIP32 public derivation) signs for the app with
//! sequence number `k`; index 0 belongs to the free balance and the multisig
//! owners.

use core::{fmt, str::FromStr};

use hmac::{Hmac, Mac};
use k256::{
    elliptic_curve::{group::Group, sec1::ToEncodedPoint, PrimeField},
    FieldBytes, ProjectivePoint, PublicKey, Scalar, SecretKey,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha512;
use thiserror::Error;

use crate::{
    abiencode::types::{Address, Hash, Signature},
    sig,
};

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("hardened index {0} can't be derived from a public key")]
    HardenedIndex(u32),
    #[error("derived key is not valid, try the next index")]
    InvalidChildKey,
    #[error("invalid extended key encoding")]
    InvalidEncoding,
}

/// Split HMAC-SHA512 output into the key tweak and the new chain code.
fn hmac_split(chain_code: &[u8; 32], data: &[u8]) -> ([u8; 32], [u8; 32]) {
    let mut mac =
        HmacSha512::new_from_slice(chain_code).expect("HMAC can take a key of any size");
    mac.update(data);
    let out = mac.finalize().into_bytes();

    let mut il = [0u8; 32];
    let mut ir = [0u8; 32];
    il.copy_from_slice(&out[..32]);
    ir.copy_from_slice(&out[32..]);
    (il, ir)
}

fn tweak_scalar(il: &[u8; 32]) -> Result<Scalar, Error> {
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(il)))
        .ok_or(Error::InvalidChildKey)
}

fn child_data(compressed: &[u8], index: u32) -> Result<Vec<u8>, Error> {
    if index >= HARDENED_OFFSET {
        return Err(Error::HardenedIndex(index));
    }
    let mut data = Vec::with_capacity(37);
    data.extend_from_slice(compressed);
    data.extend_from_slice(&index.to_be_bytes());
    Ok(data)
}

/// Extended public key: compressed SEC1 point plus chain code.
///
/// Displayed and serialized as `0x` hex of `key || chain_code`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Xpub {
    key: [u8; 33],
    chain_code: [u8; 32],
}

impl Xpub {
    pub fn new(key: [u8; 33], chain_code: [u8; 32]) -> Result<Self, Error> {
        PublicKey::from_sec1_bytes(&key).map_err(|_| Error::InvalidEncoding)?;
        Ok(Self { key, chain_code })
    }

    fn public_key(&self) -> Result<PublicKey, Error> {
        PublicKey::from_sec1_bytes(&self.key).map_err(|_| Error::InvalidEncoding)
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn derive_child(&self, index: u32) -> Result<Xpub, Error> {
        let (il, ir) = hmac_split(&self.chain_code, &child_data(&self.key, index)?);
        let tweak = tweak_scalar(&il)?;

        let point = ProjectivePoint::generator() * tweak + self.public_key()?.to_projective();
        let child =
            PublicKey::from_affine(point.to_affine()).map_err(|_| Error::InvalidChildKey)?;

        let mut key = [0u8; 33];
        key.copy_from_slice(child.to_encoded_point(true).as_bytes());
        Ok(Xpub {
            key,
            chain_code: ir,
        })
    }

    /// Ethereum address of this key itself (no derivation).
    pub fn address(&self) -> Result<Address, Error> {
        let pk = self.public_key()?;
        Ok(Address::from_uncompressed_public_key(
            pk.to_encoded_point(false).as_bytes(),
        ))
    }
}

impl fmt::Display for Xpub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}{}", hex::encode(self.key), hex::encode(self.chain_code))
    }
}

impl fmt::Debug for Xpub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The full 65 bytes are unreadable in logs, the key prefix is enough
        // to tell participants apart.
        write!(f, "Xpub(0x{}..)", hex::encode(&self.key[..8]))
    }
}

impl FromStr for Xpub {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 65];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut bytes)
            .map_err(|_| Error::InvalidEncoding)?;

        let mut key = [0u8; 33];
        let mut chain_code = [0u8; 32];
        key.copy_from_slice(&bytes[..33]);
        chain_code.copy_from_slice(&bytes[33..]);
        Xpub::new(key, chain_code)
    }
}

impl Serialize for Xpub {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Xpub {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Extended private key.
#[derive(Clone)]
pub struct Xprv {
    secret: SecretKey,
    chain_code: [u8; 32],
}

impl Xprv {
    /// BIP32 master key generation.
    pub fn from_seed(seed: &[u8]) -> Result<Self, Error> {
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .expect("HMAC can take a key of any size");
        mac.update(seed);
        let out = mac.finalize().into_bytes();

        let secret = SecretKey::from_be_bytes(&out[..32]).map_err(|_| Error::InvalidChildKey)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&out[32..]);
        Ok(Self { secret, chain_code })
    }

    pub fn random<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        loop {
            let seed: [u8; 32] = rng.gen();
            // Invalid master keys have a negligible chance, just draw again.
            if let Ok(xprv) = Xprv::from_seed(&seed) {
                return xprv;
            }
        }
    }

    pub fn neuter(&self) -> Xpub {
        let mut key = [0u8; 33];
        key.copy_from_slice(self.secret.public_key().to_encoded_point(true).as_bytes());
        Xpub {
            key,
            chain_code: self.chain_code,
        }
    }

    pub fn derive_child(&self, index: u32) -> Result<Xprv, Error> {
        let parent = self.neuter();
        let (il, ir) = hmac_split(&self.chain_code, &child_data(&parent.key, index)?);
        let tweak = tweak_scalar(&il)?;

        let sum: Scalar = *self.secret.to_nonzero_scalar() + tweak;
        let secret = SecretKey::from_be_bytes(&sum.to_repr()).map_err(|_| Error::InvalidChildKey)?;
        Ok(Xprv {
            secret,
            chain_code: ir,
        })
    }

    fn secret_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.secret.to_be_bytes());
        out
    }

    /// Signer for the key at child index `k`.
    pub fn kth_signer(&self, k: u32) -> Result<sig::Signer, crate::Error> {
        let child = self.derive_child(k)?;
        Ok(sig::Signer::from_secret_bytes(&child.secret_bytes())?)
    }
}

impl fmt::Debug for Xprv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Xprv").field("xpub", &self.neuter()).finish()
    }
}

/// Address of the `k`th child of `xpub`.
pub fn xkey_kth_address(xpub: &Xpub, k: u32) -> Result<Address, Error> {
    xpub.derive_child(k)?.address()
}

pub fn sort_addresses(mut addrs: Vec<Address>) -> Vec<Address> {
    addrs.sort();
    addrs
}

/// `k`th child addresses of both participants in ascending byte order, which is
/// the order the contracts expect owners and participants in.
pub fn xkeys_to_sorted_kth_addresses(xpubs: &[Xpub; 2], k: u32) -> Result<[Address; 2], Error> {
    let a = xkey_kth_address(&xpubs[0], k)?;
    let b = xkey_kth_address(&xpubs[1], k)?;
    Ok(if a <= b { [a, b] } else { [b, a] })
}

/// Key source the protocol engine signs commitments with.
pub trait IndexedSigner: Send + Sync {
    fn public_identifier(&self) -> Xpub;

    /// Sign `hash` with the key at child index `key_index`.
    fn sign_digest(&self, hash: Hash, key_index: u32) -> Result<Signature, crate::Error>;
}

impl IndexedSigner for Xprv {
    fn public_identifier(&self) -> Xpub {
        self.neuter()
    }

    fn sign_digest(&self, hash: Hash, key_index: u32) -> Result<Signature, crate::Error> {
        Ok(self.kth_signer(key_index)?.sign_digest(hash)?)
    }
}
