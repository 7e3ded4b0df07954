//! Transport of protocol messages.
//!
//! [MessagingService] is what the runner talks to. The provided
//! implementation, [ProtoBufEncodingLayer], encodes messages into
//! length-prefixed protobuf frames and hands them to a [BytesBus].

mod encoding;
mod loopback;

use core::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::{keys::Xpub, protocol::ProtocolMessage, Result};

pub use encoding::{decode, encode, CustomDataMsg, ProtoBufEncodingLayer, ProtocolEnvelope};
pub use loopback::{serve, Inbox, LoopbackBus, LoopbackNetwork};

#[derive(Debug, Error)]
pub enum Error {
    #[error("frame of {0} bytes does not fit the u16 length prefix")]
    TooLarge(usize),
    #[error("frame is truncated")]
    Truncated,
    #[error("invalid {0} field")]
    InvalidField(&'static str),
    #[error(transparent)]
    Encode(#[from] prost::EncodeError),
    #[error(transparent)]
    Decode(#[from] prost::DecodeError),
    #[error("params: {0}")]
    Json(#[from] serde_json::Error),
}

/// Byte level transport between participants.
#[async_trait]
pub trait BytesBus: Debug + Send + Sync {
    async fn send_to_participant(&self, recipient: &Xpub, frame: Vec<u8>) -> Result<()>;
}

/// Message level transport the runner sends through.
#[async_trait]
pub trait MessagingService: Send + Sync {
    async fn send(&self, recipient: &Xpub, msg: ProtocolMessage) -> Result<()>;
}
