//! The six two-party protocols.
//!
//! Every flow is described as a [RoleMachine](crate::machine::RoleMachine)
//! that only yields opcodes. It never touches the store, the network or the
//! keys itself, the [ProtocolRunner](crate::machine::ProtocolRunner) does that
//! on its behalf.

mod exchange;
mod install;
mod message;
mod propose;
mod setup;
mod take_action;
mod uninstall;
mod withdraw;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    apps::AppLogic,
    model::{AppInstance, TokenIndexedCoinTransferMap},
    Error, Result,
};

pub use install::InstallFlow;
pub use message::{
    CustomData, InstallParams, ProposeParams, ProtocolMessage, ProtocolParams, SetupParams,
    TakeActionParams, UninstallParams, WithdrawParams,
};
pub use propose::ProposeFlow;
pub use setup::SetupFlow;
pub use take_action::TakeActionFlow;
pub use uninstall::UninstallFlow;
pub use withdraw::WithdrawFlow;

/// `seq` of the last message of an exchange. Nobody waits for a reply to it.
pub const UNASSIGNED_SEQ_NO: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Protocol {
    Setup,
    Propose,
    Install,
    TakeAction,
    Uninstall,
    Withdraw,
}

impl Protocol {
    pub const ALL: [Protocol; 6] = [
        Protocol::Setup,
        Protocol::Propose,
        Protocol::Install,
        Protocol::TakeAction,
        Protocol::Uninstall,
        Protocol::Withdraw,
    ];
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Setup => "setup",
            Protocol::Propose => "propose",
            Protocol::Install => "install",
            Protocol::TakeAction => "takeAction",
            Protocol::Uninstall => "uninstall",
            Protocol::Withdraw => "withdraw",
        };
        f.write_str(name)
    }
}

impl From<Protocol> for u32 {
    fn from(p: Protocol) -> Self {
        p as u32
    }
}

impl TryFrom<u32> for Protocol {
    type Error = u32;

    fn try_from(value: u32) -> core::result::Result<Self, Self::Error> {
        Protocol::ALL
            .into_iter()
            .find(|p| *p as u32 == value)
            .ok_or(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// Free balance credits resulting from the latest state of `app`.
///
/// Apps whose outcome depends on the chain get `block_number`, which must be
/// present for them.
pub fn compute_token_indexed_free_balance_increments(
    app: &AppInstance,
    logic: &dyn AppLogic,
    block_number: Option<u64>,
) -> Result<TokenIndexedCoinTransferMap> {
    let params = app
        .interpreter_params()
        .ok_or(Error::NullOrMissingInput("interpreter params"))?;

    let block_number = if logic.requires_block_number() {
        Some(block_number.ok_or(Error::NullOrMissingInput("block number"))?)
    } else {
        None
    };

    let outcome = logic.compute_outcome(app.latest_state(), block_number)?;
    params.interpret(&outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_ids_roundtrip() {
        for p in Protocol::ALL {
            assert_eq!(Protocol::try_from(u32::from(p)), Ok(p));
        }
        assert_eq!(Protocol::try_from(6), Err(6));
    }

    #[test]
    fn protocol_json_names() {
        assert_eq!(
            serde_json::to_string(&Protocol::TakeAction).unwrap(),
            "\"takeAction\""
        );
    }
}
