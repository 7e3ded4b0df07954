//! Persistence contract and an in-memory implementation of it.

use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use log::trace;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    abiencode::types::{Address, Hash},
    commitment::SignedTransaction,
    model::{StateChannel, StateChannelsMap},
    Error, Result,
};

/// Durable storage of channels and finalized commitments.
///
/// Every save must be atomic: either all of it lands or nothing does.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_state_channel(&self, multisig: &Address) -> Result<Option<StateChannel>>;

    async fn save_state_channel(&self, channel: &StateChannel) -> Result<()> {
        self.save_state_channels(core::slice::from_ref(channel))
            .await
    }

    async fn save_state_channels(&self, channels: &[StateChannel]) -> Result<()>;

    async fn get_all_channels(&self) -> Result<Vec<StateChannel>>;

    async fn get_state_channels_map(&self) -> Result<StateChannelsMap> {
        Ok(self
            .get_all_channels()
            .await?
            .into_iter()
            .map(|c| (c.multisig_address(), c))
            .collect())
    }

    async fn get_set_state_commitment(&self, app: &Hash) -> Result<Option<SignedTransaction>>;
    async fn save_set_state_commitment(&self, app: &Hash, tx: &SignedTransaction) -> Result<()>;

    async fn get_conditional_transaction_commitment(
        &self,
        app: &Hash,
    ) -> Result<Option<SignedTransaction>>;
    async fn save_conditional_transaction_commitment(
        &self,
        app: &Hash,
        tx: &SignedTransaction,
    ) -> Result<()>;

    async fn get_withdrawal_commitment(
        &self,
        multisig: &Address,
    ) -> Result<Option<SignedTransaction>>;
    async fn save_withdrawal_commitment(
        &self,
        multisig: &Address,
        tx: &SignedTransaction,
    ) -> Result<()>;
}

const CHANNEL_PREFIX: &str = "channel/";

/// JSON blobs in a key value map, the way a database backed store would lay
/// them out.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .map(|json| serde_json::from_str(json).map_err(Error::from))
            .transpose()
    }

    fn put_all(&self, values: Vec<(String, String)>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, json) in values {
            trace!("Writing {}", key);
            entries.insert(key, json);
        }
    }

    fn put<T: Serialize>(&self, key: String, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.put_all(vec![(key, json)]);
        Ok(())
    }
}

fn channel_key(multisig: &Address) -> String {
    format!("{}{}", CHANNEL_PREFIX, multisig)
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_state_channel(&self, multisig: &Address) -> Result<Option<StateChannel>> {
        self.get(&channel_key(multisig))
    }

    async fn save_state_channels(&self, channels: &[StateChannel]) -> Result<()> {
        // Serialize everything first so a failure leaves the map untouched.
        let values = channels
            .iter()
            .map(|c| Ok((channel_key(&c.multisig_address()), c.to_json()?)))
            .collect::<Result<Vec<_>>>()?;
        self.put_all(values);
        Ok(())
    }

    async fn get_all_channels(&self) -> Result<Vec<StateChannel>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .range(CHANNEL_PREFIX.to_string()..)
            .take_while(|(key, _)| key.starts_with(CHANNEL_PREFIX))
            .map(|(_, json)| StateChannel::from_json(json))
            .collect()
    }

    async fn get_set_state_commitment(&self, app: &Hash) -> Result<Option<SignedTransaction>> {
        self.get(&format!("setstate/{}", app))
    }

    async fn save_set_state_commitment(&self, app: &Hash, tx: &SignedTransaction) -> Result<()> {
        self.put(format!("setstate/{}", app), tx)
    }

    async fn get_conditional_transaction_commitment(
        &self,
        app: &Hash,
    ) -> Result<Option<SignedTransaction>> {
        self.get(&format!("conditional/{}", app))
    }

    async fn save_conditional_transaction_commitment(
        &self,
        app: &Hash,
        tx: &SignedTransaction,
    ) -> Result<()> {
        self.put(format!("conditional/{}", app), tx)
    }

    async fn get_withdrawal_commitment(
        &self,
        multisig: &Address,
    ) -> Result<Option<SignedTransaction>> {
        self.get(&format!("withdrawal/{}", multisig))
    }

    async fn save_withdrawal_commitment(
        &self,
        multisig: &Address,
        tx: &SignedTransaction,
    ) -> Result<()> {
        self.put(format!("withdrawal/{}", multisig), tx)
    }
}
