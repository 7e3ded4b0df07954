//! Crate wide error type.
//!
//! Protocol failures abort the run that hit them: nothing is persisted and the
//! caller's view of its channels stays as it was.

use thiserror::Error;

use crate::{
    abiencode::{
        self,
        types::{Address, Hash, ProcessId, U256},
    },
    keys::{self, Xpub},
    protocol::Protocol,
    sig, wire,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("insufficient funds in channel {multisig} for {address}: {available} of token {token} available, {requested} requested")]
    InsufficientFunds {
        multisig: Address,
        address: Address,
        token: Address,
        available: U256,
        requested: U256,
    },
    #[error("missing required input: {0}")]
    NullOrMissingInput(&'static str),
    #[error("no state channel for multisig {0}")]
    ChannelNotFound(Address),
    #[error("channel with multisig {0} already exists")]
    ChannelAlreadyExists(Address),
    #[error("{xpub} is not a participant of channel {multisig}")]
    NotAParticipant { multisig: Address, xpub: Xpub },
    #[error("multisig {got} is not the one derived from its owners, {expected}")]
    MultisigMismatch { expected: Address, got: Address },
    #[error("no installed app with identity hash {0}")]
    AppNotFound(Hash),
    #[error("no proposal with identity hash {0}")]
    ProposalNotFound(Hash),
    #[error("channel {0} has no proposals")]
    NoProposals(Address),
    #[error("app with identity hash {0} is already installed")]
    AppAlreadyInstalled(Hash),
    #[error("signature on {hash} was made by {recovered}, expected {expected}")]
    InvalidSignature {
        expected: Address,
        recovered: Address,
        hash: Hash,
    },
    #[error("commitment or signature missing for signature check")]
    MissingSignatureInput,
    #[error("timed out waiting for a {protocol} reply (process {process_id})")]
    Timeout {
        protocol: Protocol,
        process_id: ProcessId,
    },
    #[error("duplicate registration of {0}")]
    DuplicateRegistration(String),
    #[error("expected 2 participants, got {0}")]
    InvalidParticipantCount(usize),
    #[error("no app logic registered for app definition {0}")]
    UnknownAppDefinition(Address),
    #[error("block number {provided} is more than {tolerance} blocks behind {latest}")]
    StaleBlockNumber {
        provided: u64,
        latest: u64,
        tolerance: u64,
    },
    #[error("expected version {expected}, got {got}")]
    InvalidVersionNumber { expected: u64, got: u64 },
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("app logic: {0}")]
    App(String),
    #[error("store: {0}")]
    Store(String),
    #[error("messaging: {0}")]
    Messaging(String),
    #[error("chain: {0}")]
    Chain(String),
    #[error("abi encoding: {0}")]
    Encoding(#[from] abiencode::Error),
    #[error("signing: {0}")]
    Signing(#[from] sig::Error),
    #[error("keys: {0}")]
    Keys(#[from] keys::Error),
    #[error("wire: {0}")]
    Wire(#[from] wire::Error),
    #[error("json: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
