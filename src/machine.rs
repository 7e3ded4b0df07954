//! Opcode vocabulary and the runner that executes it.
//!
//! A protocol run is a [RoleMachine]: the runner feeds it an [OpcodeResult],
//! the machine answers with the next [Opcode] to execute or with the final
//! channel map. Suspension only happens between those two calls.

mod registry;
mod runner;

use std::sync::Arc;

use crate::{
    abiencode::types::{Address, Hash, Signature},
    apps::AppRegistry,
    commitment::{Commitment, SignedTransaction},
    keys::Xpub,
    model::{StateChannel, StateChannelsMap},
    network::NetworkContext,
    protocol::{Protocol, ProtocolMessage, Role},
    Error, Result,
};

pub use registry::{FlowRegistry, FlowRegistryBuilder};
pub use runner::{ProtocolRunner, ProtocolRunnerBuilder};

/// Where a finalized commitment is filed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitmentSlot {
    /// Latest set state commitment of the app with this identity hash.
    SetState(Hash),
    /// Conditional transaction of the app (or the free balance) with this
    /// identity hash.
    ConditionalTransaction(Hash),
    /// Withdrawal from the multisig at this address.
    Withdrawal(Address),
}

/// Side effects a flow can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// Sign `commitment.hash_to_sign()` with the local key at `key_index`.
    OpSign {
        commitment: Commitment,
        key_index: u32,
    },
    IoSend(ProtocolMessage),
    /// Send, then wait for the counterparty's reply to the same process.
    IoSendAndWait(ProtocolMessage),
    PersistStateChannel(Vec<StateChannel>),
    WriteCommitment {
        protocol: Protocol,
        slot: CommitmentSlot,
        transaction: SignedTransaction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpcodeResult {
    /// First input of every run.
    Start,
    Signature(Signature),
    Reply(ProtocolMessage),
    /// The opcode has no result.
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Yield(Opcode),
    /// The run completed, carrying the caller's channel map with every
    /// persisted channel applied.
    Finished(StateChannelsMap),
}

/// One role of one protocol run.
pub trait RoleMachine: Send {
    fn resume(&mut self, input: OpcodeResult) -> Result<Step>;
}

/// Everything a flow may look at when it starts.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub network: Arc<NetworkContext>,
    pub apps: Arc<AppRegistry>,
    pub channels: StateChannelsMap,
    /// The opening message: built locally for the initiator, received for the
    /// responder.
    pub message: ProtocolMessage,
    pub me: Xpub,
}

impl FlowContext {
    pub fn channel(&self, multisig: &Address) -> Result<&StateChannel> {
        self.channels
            .get(multisig)
            .ok_or(Error::ChannelNotFound(*multisig))
    }
}

pub trait ProtocolFlow: core::fmt::Debug + Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Validate the context and return the machine for `role`. Validation
    /// errors surface here, before any opcode was executed.
    fn start(&self, role: Role, ctx: FlowContext) -> Result<Box<dyn RoleMachine>>;
}
