//! Channel and app data model.

mod app_instance;
mod free_balance;
mod multisig;
mod outcome;
mod proposal;
mod state_channel;

pub use app_instance::{AppDeposits, AppIdentity, AppInstance};
pub use free_balance::{FreeBalance, Shortfall};
pub use multisig::{get_create2_multisig_address, CriticalAddresses};
pub use outcome::{
    AppOutcome, CoinTransfer, InterpreterParams, OutcomeType, TokenIndexedCoinTransferMap,
    TwoPartyFixedOutcome,
};
pub use proposal::AppInstanceProposal;
pub use state_channel::{StateChannel, StateChannelsMap};
