use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        types::{Address, Hash, U256},
        Token,
    },
    keys::{xkey_kth_address, xkeys_to_sorted_kth_addresses, Xpub},
    network::{FREE_BALANCE_DEFAULT_TIMEOUT, FREE_BALANCE_INITIAL_STATE_TIMEOUT, ETH_TOKEN_ADDRESS},
    Error, Result,
};

use super::{
    app_instance::{AppIdentity, AppInstance},
    free_balance::FreeBalance,
    multisig::CriticalAddresses,
    outcome::TokenIndexedCoinTransferMap,
    proposal::AppInstanceProposal,
};

/// Channels of one participant, keyed by multisig address.
pub type StateChannelsMap = BTreeMap<Address, StateChannel>;

/// Everything both participants agree on about one channel.
///
/// A value type: every operation returns the next channel and leaves `self`
/// untouched, so a protocol run that fails midway has nothing to undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChannel {
    multisig_address: Address,
    addresses: CriticalAddresses,
    user_identifiers: [Xpub; 2],
    free_balance: AppInstance,
    app_instances: BTreeMap<Hash, AppInstance>,
    proposed_app_instances: BTreeMap<Hash, AppInstanceProposal>,
    monotonic_num_proposed_apps: u32,
}

impl StateChannel {
    /// New channel holding nothing but a zero ETH free balance. The free
    /// balance takes app sequence number 0.
    pub fn setup_channel(
        free_balance_app: Address,
        addresses: CriticalAddresses,
        multisig_address: Address,
        identifiers: &[Xpub],
    ) -> Result<Self> {
        let user_identifiers: [Xpub; 2] = identifiers
            .try_into()
            .map_err(|_| Error::InvalidParticipantCount(identifiers.len()))?;

        let owners = xkeys_to_sorted_kth_addresses(&user_identifiers, 0)?;
        let state = FreeBalance::create_with_funded_token_amounts(
            &owners,
            U256::zero(),
            &[ETH_TOKEN_ADDRESS],
        );

        let free_balance = AppInstance::new(
            AppIdentity {
                channel_nonce: 0,
                participants: owners,
                app_definition: free_balance_app,
                default_timeout: FREE_BALANCE_DEFAULT_TIMEOUT,
            },
            0,
            state.to_app_state(),
            FREE_BALANCE_INITIAL_STATE_TIMEOUT,
            None,
            None,
        )?;

        Ok(Self {
            multisig_address,
            addresses,
            user_identifiers,
            free_balance,
            app_instances: BTreeMap::new(),
            proposed_app_instances: BTreeMap::new(),
            monotonic_num_proposed_apps: 1,
        })
    }

    pub fn multisig_address(&self) -> Address {
        self.multisig_address
    }

    pub fn addresses(&self) -> &CriticalAddresses {
        &self.addresses
    }

    pub fn user_identifiers(&self) -> &[Xpub; 2] {
        &self.user_identifiers
    }

    /// Key index 0 addresses of both participants, sorted.
    pub fn multisig_owners(&self) -> [Address; 2] {
        *self.free_balance.participants()
    }

    /// Free balance address (key index 0) of a participant.
    pub fn free_balance_address_of(&self, identifier: &Xpub) -> Result<Address> {
        Ok(xkey_kth_address(identifier, 0)?)
    }

    pub fn free_balance(&self) -> &AppInstance {
        &self.free_balance
    }

    pub fn get_free_balance_class(&self) -> Result<FreeBalance> {
        FreeBalance::from_app_state(self.free_balance.latest_state())
    }

    pub fn num_proposed_apps(&self) -> u32 {
        self.monotonic_num_proposed_apps
    }

    pub fn num_active_apps(&self) -> usize {
        self.app_instances.len()
    }

    pub fn app_instances(&self) -> &BTreeMap<Hash, AppInstance> {
        &self.app_instances
    }

    pub fn proposed_app_instances(&self) -> &BTreeMap<Hash, AppInstanceProposal> {
        &self.proposed_app_instances
    }

    pub fn get_app_instance(&self, identity_hash: &Hash) -> Result<&AppInstance> {
        self.app_instances
            .get(identity_hash)
            .ok_or(Error::AppNotFound(*identity_hash))
    }

    pub fn get_apps_by_app_definition(&self, app_definition: &Address) -> Vec<&AppInstance> {
        self.app_instances
            .values()
            .filter(|app| app.app_definition() == *app_definition)
            .collect()
    }

    pub fn get_proposal(&self, identity_hash: &Hash) -> Result<&AppInstanceProposal> {
        self.proposed_app_instances
            .get(identity_hash)
            .ok_or(Error::ProposalNotFound(*identity_hash))
    }

    pub fn most_recently_proposed_app_instance(&self) -> Result<&AppInstanceProposal> {
        self.proposed_app_instances
            .values()
            .max_by_key(|p| p.app_seq_no)
            .ok_or(Error::NoProposals(self.multisig_address))
    }

    /// Record a proposal and advance the sequence counter.
    pub fn add_proposal(&self, proposal: AppInstanceProposal) -> Result<Self> {
        if self.app_instances.contains_key(&proposal.identity_hash) {
            return Err(Error::AppAlreadyInstalled(proposal.identity_hash));
        }
        let mut next = self.clone();
        next.monotonic_num_proposed_apps += 1;
        next.proposed_app_instances
            .insert(proposal.identity_hash, proposal);
        Ok(next)
    }

    pub fn remove_proposal(&self, identity_hash: &Hash) -> Result<Self> {
        let mut next = self.clone();
        next.proposed_app_instances
            .remove(identity_hash)
            .ok_or(Error::ProposalNotFound(*identity_hash))?;
        Ok(next)
    }

    pub fn set_free_balance(&self, free_balance: &FreeBalance) -> Self {
        let mut next = self.clone();
        next.free_balance = self.free_balance.set_state(free_balance.to_app_state(), 0);
        next
    }

    /// Credit the free balance, for example after an on-chain deposit.
    pub fn increment_free_balance(&self, increments: &TokenIndexedCoinTransferMap) -> Result<Self> {
        let fb = self.get_free_balance_class()?.increment(increments)?;
        Ok(self.set_free_balance(&fb))
    }

    /// Move `app` from proposed to installed, locking `decrements` from the
    /// free balance.
    pub fn install_app(
        &self,
        app: AppInstance,
        decrements: &TokenIndexedCoinTransferMap,
    ) -> Result<Self> {
        let hash = app.identity_hash();
        if self.app_instances.contains_key(&hash) {
            return Err(Error::AppAlreadyInstalled(hash));
        }

        let fb = self
            .get_free_balance_class()?
            .decrement(decrements)
            .map_err(|shortfall| shortfall.into_error(self.multisig_address))?
            .add_active_app(hash);

        let mut next = self.set_free_balance(&fb);
        next.proposed_app_instances.remove(&hash);
        next.app_instances.insert(hash, app);

        debug!("Installed app {} in channel {}", hash, self.multisig_address);
        Ok(next)
    }

    /// Remove an installed app, paying `increments` back into the free
    /// balance.
    pub fn uninstall_app(
        &self,
        identity_hash: &Hash,
        increments: &TokenIndexedCoinTransferMap,
    ) -> Result<Self> {
        self.get_app_instance(identity_hash)?;

        let fb = self
            .get_free_balance_class()?
            .increment(increments)?
            .remove_active_app(identity_hash);

        let mut next = self.set_free_balance(&fb);
        next.app_instances.remove(identity_hash);

        debug!(
            "Uninstalled app {} from channel {}",
            identity_hash, self.multisig_address
        );
        Ok(next)
    }

    /// Replace an installed app with its next version.
    pub fn set_state(&self, app: AppInstance) -> Result<Self> {
        let current = self.get_app_instance(&app.identity_hash())?;
        if app.version_number() != current.version_number() + 1 {
            return Err(Error::InvalidVersionNumber {
                expected: current.version_number() + 1,
                got: app.version_number(),
            });
        }
        let mut next = self.clone();
        next.app_instances.insert(app.identity_hash(), app);
        Ok(next)
    }

    /// Amount of `token` currently locked in installed apps.
    pub fn locked_in_apps(&self, token: &Address) -> U256 {
        self.app_instances
            .values()
            .filter_map(AppInstance::deposits)
            .fold(U256::zero(), |acc, d| {
                let mut acc = acc;
                if d.initiator_deposit_token_address == *token {
                    acc = acc.saturating_add(d.initiator_deposit);
                }
                if d.responder_deposit_token_address == *token {
                    acc = acc.saturating_add(d.responder_deposit);
                }
                acc
            })
    }

    pub fn latest_free_balance_state(&self) -> &Token {
        self.free_balance.latest_state()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
