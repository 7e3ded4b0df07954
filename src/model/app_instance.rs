use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        to_hash,
        types::{Address, Hash, U256},
        Token,
    },
    keys::Xpub,
    Result,
};

use super::outcome::InterpreterParams;

/// On-chain identity of an app. Its hash keys the app everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentity {
    pub channel_nonce: u64,
    /// Sorted ascending.
    pub participants: [Address; 2],
    pub app_definition: Address,
    pub default_timeout: u64,
}

impl AppIdentity {
    /// `keccak256(abi.encode(uint256 channelNonce, address[] participants))`
    pub fn identity_hash(&self) -> Result<Hash> {
        Ok(to_hash(&[
            Token::uint(self.channel_nonce),
            Token::Array(self.participants.iter().copied().map(Token::Address).collect()),
        ])?)
    }

    /// `(uint256 channelNonce, address[] participants, address appDefinition, uint256 defaultTimeout)`
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::uint(self.channel_nonce),
            Token::Array(self.participants.iter().copied().map(Token::Address).collect()),
            Token::Address(self.app_definition),
            Token::uint(self.default_timeout),
        ])
    }
}

/// Deposits both sides locked into an app at install time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDeposits {
    pub initiator_identifier: Xpub,
    pub responder_identifier: Xpub,
    pub initiator_deposit: U256,
    pub initiator_deposit_token_address: Address,
    pub responder_deposit: U256,
    pub responder_deposit_token_address: Address,
}

/// An installed app (or the free balance, which is an app as well).
///
/// Updates never mutate in place: [AppInstance::set_state] returns the next
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstance {
    identity: AppIdentity,
    identity_hash: Hash,
    app_seq_no: u32,
    latest_state: Token,
    latest_action: Option<Token>,
    latest_version_number: u64,
    latest_timeout: u64,
    interpreter_params: Option<InterpreterParams>,
    deposits: Option<AppDeposits>,
}

impl AppInstance {
    pub fn new(
        identity: AppIdentity,
        app_seq_no: u32,
        initial_state: Token,
        timeout: u64,
        interpreter_params: Option<InterpreterParams>,
        deposits: Option<AppDeposits>,
    ) -> Result<Self> {
        let identity_hash = identity.identity_hash()?;
        Ok(Self {
            identity,
            identity_hash,
            app_seq_no,
            latest_state: initial_state,
            latest_action: None,
            latest_version_number: 0,
            latest_timeout: timeout,
            interpreter_params,
            deposits,
        })
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn identity_hash(&self) -> Hash {
        self.identity_hash
    }

    pub fn app_definition(&self) -> Address {
        self.identity.app_definition
    }

    pub fn participants(&self) -> &[Address; 2] {
        &self.identity.participants
    }

    pub fn app_seq_no(&self) -> u32 {
        self.app_seq_no
    }

    pub fn latest_state(&self) -> &Token {
        &self.latest_state
    }

    pub fn latest_action(&self) -> Option<&Token> {
        self.latest_action.as_ref()
    }

    pub fn version_number(&self) -> u64 {
        self.latest_version_number
    }

    pub fn timeout(&self) -> u64 {
        self.latest_timeout
    }

    pub fn interpreter_params(&self) -> Option<&InterpreterParams> {
        self.interpreter_params.as_ref()
    }

    pub fn deposits(&self) -> Option<&AppDeposits> {
        self.deposits.as_ref()
    }

    /// `keccak256(abi.encode(latestState))`
    pub fn hash_of_latest_state(&self) -> Result<Hash> {
        Ok(to_hash(&[self.latest_state.clone()])?)
    }

    /// Next version of this app holding `new_state`.
    pub fn set_state(&self, new_state: Token, timeout: u64) -> Self {
        Self {
            latest_state: new_state,
            latest_action: None,
            latest_version_number: self.latest_version_number + 1,
            latest_timeout: timeout,
            ..self.clone()
        }
    }

    /// Like [AppInstance::set_state], remembering the action that produced
    /// the state.
    pub fn set_state_with_action(&self, new_state: Token, action: Token) -> Self {
        Self {
            latest_action: Some(action),
            ..self.set_state(new_state, self.latest_timeout)
        }
    }
}
