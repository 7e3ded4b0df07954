use async_trait::async_trait;
use prost::{bytes::BufMut, Message};

use super::{BytesBus, Error, MessagingService};
use crate::{
    abiencode::types::{ProcessId, Signature},
    keys::Xpub,
    protocol::{CustomData, Protocol, ProtocolMessage},
};

#[derive(Clone, PartialEq, Message)]
pub struct ProtocolEnvelope {
    #[prost(uint32, tag = "1")]
    pub protocol: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub process_id: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub seq: u32,
    #[prost(string, tag = "4")]
    pub to_xpub: String,
    #[prost(string, tag = "5")]
    pub from_xpub: String,
    /// JSON encoded [ProtocolParams](crate::protocol::ProtocolParams).
    #[prost(bytes = "vec", tag = "6")]
    pub params: Vec<u8>,
    #[prost(message, optional, tag = "7")]
    pub custom_data: Option<CustomDataMsg>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CustomDataMsg {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub signatures: Vec<Vec<u8>>,
}

impl TryFrom<&ProtocolMessage> for ProtocolEnvelope {
    type Error = Error;

    fn try_from(msg: &ProtocolMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            protocol: msg.protocol.into(),
            process_id: msg.process_id.0.to_vec(),
            seq: msg.seq,
            to_xpub: msg.to_xpub.to_string(),
            from_xpub: msg.from_xpub.to_string(),
            params: serde_json::to_vec(&msg.params)?,
            custom_data: Some(CustomDataMsg {
                signatures: msg
                    .custom_data
                    .signatures
                    .iter()
                    .map(|s| s.0.to_vec())
                    .collect(),
            }),
        })
    }
}

impl TryFrom<ProtocolEnvelope> for ProtocolMessage {
    type Error = Error;

    fn try_from(env: ProtocolEnvelope) -> Result<Self, Self::Error> {
        let protocol =
            Protocol::try_from(env.protocol).map_err(|_| Error::InvalidField("protocol"))?;
        let process_id = ProcessId(
            env.process_id
                .as_slice()
                .try_into()
                .map_err(|_| Error::InvalidField("process id"))?,
        );
        let to_xpub: Xpub = env.to_xpub.parse().map_err(|_| Error::InvalidField("to xpub"))?;
        let from_xpub: Xpub = env
            .from_xpub
            .parse()
            .map_err(|_| Error::InvalidField("from xpub"))?;

        let signatures = env
            .custom_data
            .unwrap_or_default()
            .signatures
            .iter()
            .map(|s| {
                s.as_slice()
                    .try_into()
                    .map(Signature)
                    .map_err(|_| Error::InvalidField("signature"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let params: crate::protocol::ProtocolParams = serde_json::from_slice(&env.params)?;
        if params.protocol() != protocol {
            return Err(Error::InvalidField("params"));
        }

        Ok(Self {
            protocol,
            process_id,
            seq: env.seq,
            to_xpub,
            from_xpub,
            params,
            custom_data: CustomData { signatures },
        })
    }
}

/// Encode a message into a frame: a big endian u16 length followed by the
/// protobuf envelope.
pub fn encode(msg: &ProtocolMessage) -> Result<Vec<u8>, Error> {
    let envelope = ProtocolEnvelope::try_from(msg)?;
    // Fixed two byte length, not the LEB128 varint `encode_length_delimited`
    // would write.
    let len = envelope.encoded_len();
    if len >= (1 << 16) {
        return Err(Error::TooLarge(len));
    }

    let mut buf = Vec::with_capacity(2 + len);
    buf.put_slice(&(len as u16).to_be_bytes());
    envelope.encode(&mut buf)?;
    Ok(buf)
}

pub fn decode(frame: &[u8]) -> Result<ProtocolMessage, Error> {
    if frame.len() < 2 {
        return Err(Error::Truncated);
    }
    let len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let body = frame.get(2..2 + len).ok_or(Error::Truncated)?;
    ProtocolEnvelope::decode(body)?.try_into()
}

#[derive(Debug)]
pub struct ProtoBufEncodingLayer<B: BytesBus> {
    pub bus: B,
}

impl<B: BytesBus> ProtoBufEncodingLayer<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl<B: BytesBus> MessagingService for ProtoBufEncodingLayer<B> {
    async fn send(&self, recipient: &Xpub, msg: ProtocolMessage) -> crate::Result<()> {
        let frame = encode(&msg)?;
        self.bus.send_to_participant(recipient, frame).await
    }
}
