use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        types::{Address, Hash, U256},
        Token,
    },
    keys::{xkeys_to_sorted_kth_addresses, Xpub},
    Result,
};

use super::{
    app_instance::{AppDeposits, AppIdentity, AppInstance},
    outcome::InterpreterParams,
};

/// An app both parties agreed to consider installing.
///
/// The identity hash is the one the installed app will have, so it doubles as
/// the proposal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceProposal {
    pub identity_hash: Hash,
    pub app_definition: Address,
    pub app_seq_no: u32,
    pub initial_state: Token,
    pub default_timeout: u64,
    pub timeout: u64,
    pub initiator_identifier: Xpub,
    pub responder_identifier: Xpub,
    pub initiator_deposit: U256,
    pub initiator_deposit_token_address: Address,
    pub responder_deposit: U256,
    pub responder_deposit_token_address: Address,
    pub interpreter_params: InterpreterParams,
}

impl AppInstanceProposal {
    pub fn app_identity(&self) -> Result<AppIdentity> {
        Ok(AppIdentity {
            channel_nonce: self.app_seq_no.into(),
            participants: xkeys_to_sorted_kth_addresses(
                &[self.initiator_identifier, self.responder_identifier],
                self.app_seq_no,
            )?,
            app_definition: self.app_definition,
            default_timeout: self.default_timeout,
        })
    }

    pub fn to_app_instance(&self) -> Result<AppInstance> {
        AppInstance::new(
            self.app_identity()?,
            self.app_seq_no,
            self.initial_state.clone(),
            self.timeout,
            Some(self.interpreter_params.clone()),
            Some(AppDeposits {
                initiator_identifier: self.initiator_identifier,
                responder_identifier: self.responder_identifier,
                initiator_deposit: self.initiator_deposit,
                initiator_deposit_token_address: self.initiator_deposit_token_address,
                responder_deposit: self.responder_deposit,
                responder_deposit_token_address: self.responder_deposit_token_address,
            }),
        )
    }
}
