//! Dynamically typed abi values and the standard (`abi.encode`) encoding.
//!
//! App states and actions are opaque to the protocol engine, they only have to
//! be hashed and handed to app logic. A small value tree is enough for that and
//! keeps the encoding rules in one place:
//!
//! - Static values occupy one or more 32 byte slots in the head.
//! - Dynamic values (`bytes`, `string`, `T[]` and any tuple or fixed array
//!   containing one) put an offset into the head and their content into the
//!   tail. Offsets are relative to the start of the enclosing sequence.

use serde::{Deserialize, Serialize};

use super::{
    types::{hex_bytes, Address, Hash, U256},
    Error, Result,
};

/// Sink for encoded output, fed one 32 byte slot at a time.
pub trait Writer {
    fn write(&mut self, slot: &[u8]);
}

impl Writer for Vec<u8> {
    fn write(&mut self, slot: &[u8]) {
        self.extend_from_slice(slot);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Token {
    /// `uint<M>`, always occupies a full slot.
    Uint(U256),
    Address(Address),
    Bool(bool),
    /// `bytes<N>`, left aligned.
    FixedBytes(#[serde(with = "hex_bytes")] Vec<u8>),
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    String(String),
    /// `T[]`
    Array(Vec<Token>),
    /// `T[N]`
    FixedArray(Vec<Token>),
    Tuple(Vec<Token>),
}

impl Token {
    pub fn uint<T: Into<U256>>(value: T) -> Self {
        Token::Uint(value.into())
    }

    pub fn hash(hash: Hash) -> Self {
        Token::FixedBytes(hash.0.to_vec())
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::String(_) | Token::Array(_) => true,
            Token::FixedArray(items) | Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    /// Number of bytes the value occupies in the head of its enclosing
    /// sequence.
    fn head_len(&self) -> usize {
        match self {
            _ if self.is_dynamic() => 32,
            Token::FixedArray(items) | Token::Tuple(items) => {
                items.iter().map(Token::head_len).sum()
            }
            _ => 32,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Token::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<Hash> {
        match self {
            Token::FixedBytes(b) if b.len() == 32 => {
                let mut hash = Hash::default();
                hash.0.copy_from_slice(b);
                Some(hash)
            }
            _ => None,
        }
    }

    /// Elements of any sequence like value (arrays and tuples).
    pub fn as_items(&self) -> Option<&[Token]> {
        match self {
            Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

fn push_word(out: &mut Vec<u8>, word: [u8; 32]) {
    out.extend_from_slice(&word);
}

fn push_len(out: &mut Vec<u8>, len: usize) {
    push_word(out, U256::from(len).to_be_bytes());
}

fn push_padded(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    let rem = bytes.len() % 32;
    if rem != 0 {
        out.resize(out.len() + 32 - rem, 0);
    }
}

fn encode_sequence(tokens: &[Token], out: &mut Vec<u8>) -> Result<()> {
    let head_len: usize = tokens.iter().map(Token::head_len).sum();
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            push_len(out, head_len + tail.len());
            encode_token(token, &mut tail)?;
        } else {
            encode_token(token, out)?;
        }
    }

    out.extend_from_slice(&tail);
    Ok(())
}

fn encode_token(token: &Token, out: &mut Vec<u8>) -> Result<()> {
    match token {
        Token::Uint(v) => push_word(out, v.to_be_bytes()),
        Token::Address(a) => push_word(out, a.to_word()),
        Token::Bool(b) => push_word(out, U256::from(*b as u8).to_be_bytes()),
        Token::FixedBytes(bytes) => {
            if bytes.is_empty() || bytes.len() > 32 {
                return Err(Error::InvalidFixedBytesLength(bytes.len()));
            }
            push_padded(out, bytes);
        }
        Token::Bytes(bytes) => {
            push_len(out, bytes.len());
            push_padded(out, bytes);
        }
        Token::String(s) => {
            push_len(out, s.len());
            push_padded(out, s.as_bytes());
        }
        Token::Array(items) => {
            push_len(out, items.len());
            encode_sequence(items, out)?;
        }
        Token::FixedArray(items) | Token::Tuple(items) => encode_sequence(items, out)?,
    }
    Ok(())
}

/// `abi.encode(tokens...)`
pub fn encode(tokens: &[Token]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_sequence(tokens, &mut out)?;
    Ok(out)
}

/// Encode `tokens` and hand the result to `writer` one slot at a time.
pub fn to_writer<W: Writer>(tokens: &[Token], writer: &mut W) -> Result<()> {
    for slot in encode(tokens)?.chunks(32) {
        writer.write(slot);
    }
    Ok(())
}
