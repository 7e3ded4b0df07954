use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::{sync::mpsc, task::JoinHandle};

use super::{decode, BytesBus, ProtoBufEncodingLayer};
use crate::{keys::Xpub, machine::ProtocolRunner, Error, Result};

/// Frames addressed to one participant.
pub type Inbox = mpsc::UnboundedReceiver<Vec<u8>>;

/// In-process network: every connected participant gets an [Inbox].
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    peers: Arc<Mutex<HashMap<Xpub, mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `participant`, replacing an earlier connection.
    pub fn connect(&self, participant: Xpub) -> (ProtoBufEncodingLayer<LoopbackBus>, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(participant, tx);
        let bus = LoopbackBus {
            network: self.clone(),
        };
        (ProtoBufEncodingLayer::new(bus), rx)
    }

    pub fn disconnect(&self, participant: &Xpub) {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(participant);
    }
}

#[derive(Debug, Clone)]
pub struct LoopbackBus {
    network: LoopbackNetwork,
}

#[async_trait]
impl BytesBus for LoopbackBus {
    async fn send_to_participant(&self, recipient: &Xpub, frame: Vec<u8>) -> Result<()> {
        let tx = self
            .network
            .peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(recipient)
            .cloned()
            .ok_or_else(|| Error::Messaging(format!("{} is not connected", recipient)))?;
        tx.send(frame)
            .map_err(|_| Error::Messaging(format!("{} went away", recipient)))
    }
}

/// Feed every frame arriving in `inbox` to `runner`, each on its own task so a
/// run waiting for a reply never blocks the inbox.
pub fn serve(runner: Arc<ProtocolRunner>, mut inbox: Inbox) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = inbox.recv().await {
            let msg = match decode(&frame) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Dropping undecodable frame: {}", e);
                    continue;
                }
            };
            let runner = runner.clone();
            tokio::spawn(async move {
                let (protocol, process_id) = (msg.protocol, msg.process_id);
                match runner.handle_received_message(msg).await {
                    Ok(Some(_)) => debug!("Responded to {} run {}", protocol, process_id),
                    Ok(None) => {}
                    Err(e) => warn!("{} run {} failed: {}", protocol, process_id, e),
                }
            });
        }
    })
}
