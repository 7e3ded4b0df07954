use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        types::{Address, Hash, ProcessId, Signature, U256},
        Token,
    },
    keys::Xpub,
    model::OutcomeType,
};

use super::Protocol;

/// Message exchanged between the two runners of one protocol run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMessage {
    pub protocol: Protocol,
    pub process_id: ProcessId,
    /// Step index, or [UNASSIGNED_SEQ_NO](super::UNASSIGNED_SEQ_NO) on the
    /// final message of a run.
    pub seq: u32,
    pub to_xpub: Xpub,
    pub from_xpub: Xpub,
    pub params: ProtocolParams,
    #[serde(default)]
    pub custom_data: CustomData,
}

impl ProtocolMessage {
    /// Opening message of a run, addressed to the responder.
    pub fn initiate(process_id: ProcessId, params: ProtocolParams) -> Self {
        Self {
            protocol: params.protocol(),
            process_id,
            seq: 0,
            to_xpub: params.responder_xpub(),
            from_xpub: params.initiator_xpub(),
            params,
            custom_data: CustomData::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomData {
    /// One signature per commitment of the run, in the order the flow builds
    /// them.
    pub signatures: Vec<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupParams {
    pub initiator_xpub: Xpub,
    pub responder_xpub: Xpub,
    pub multisig_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeParams {
    pub initiator_xpub: Xpub,
    pub responder_xpub: Xpub,
    pub multisig_address: Address,
    pub app_definition: Address,
    pub initial_state: Option<Token>,
    pub initiator_deposit: U256,
    /// Defaults to ETH.
    pub initiator_deposit_token_address: Option<Address>,
    pub responder_deposit: U256,
    /// Defaults to ETH.
    pub responder_deposit_token_address: Option<Address>,
    pub default_timeout: u64,
    pub timeout: u64,
    pub outcome_type: OutcomeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallParams {
    pub initiator_xpub: Xpub,
    pub responder_xpub: Xpub,
    pub multisig_address: Address,
    /// Identity hash of the proposal to install.
    pub proposal_id: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeActionParams {
    pub initiator_xpub: Xpub,
    pub responder_xpub: Xpub,
    pub multisig_address: Address,
    pub app_identity_hash: Hash,
    pub action: Token,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallParams {
    pub initiator_xpub: Xpub,
    pub responder_xpub: Xpub,
    pub multisig_address: Address,
    pub app_identity_hash: Hash,
    /// Only used by apps whose outcome depends on the chain. Filled in by the
    /// initiating runner when left empty.
    #[serde(default)]
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawParams {
    pub initiator_xpub: Xpub,
    pub responder_xpub: Xpub,
    pub multisig_address: Address,
    pub recipient: Address,
    pub amount: U256,
    pub token_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtocolParams {
    Setup(SetupParams),
    Propose(ProposeParams),
    Install(InstallParams),
    TakeAction(TakeActionParams),
    Uninstall(UninstallParams),
    Withdraw(WithdrawParams),
}

macro_rules! common_field {
    ($self:ident, $field:ident) => {
        match $self {
            ProtocolParams::Setup(p) => p.$field,
            ProtocolParams::Propose(p) => p.$field,
            ProtocolParams::Install(p) => p.$field,
            ProtocolParams::TakeAction(p) => p.$field,
            ProtocolParams::Uninstall(p) => p.$field,
            ProtocolParams::Withdraw(p) => p.$field,
        }
    };
}

impl ProtocolParams {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProtocolParams::Setup(_) => Protocol::Setup,
            ProtocolParams::Propose(_) => Protocol::Propose,
            ProtocolParams::Install(_) => Protocol::Install,
            ProtocolParams::TakeAction(_) => Protocol::TakeAction,
            ProtocolParams::Uninstall(_) => Protocol::Uninstall,
            ProtocolParams::Withdraw(_) => Protocol::Withdraw,
        }
    }

    pub fn multisig_address(&self) -> Address {
        common_field!(self, multisig_address)
    }

    pub fn initiator_xpub(&self) -> Xpub {
        common_field!(self, initiator_xpub)
    }

    pub fn responder_xpub(&self) -> Xpub {
        common_field!(self, responder_xpub)
    }
}
