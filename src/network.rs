//! Deployment addresses and engine configuration.

use core::time::Duration;

use rand::{distributions::Standard, prelude::Distribution};
use serde::{Deserialize, Serialize};

use crate::abiencode::types::{hex_bytes, Address};

/// `bytes1(0x19)` domain prefix of every commitment digest.
pub const COMMITMENT_PREFIX: u8 = 0x19;

/// Dispute timeout (in blocks) of the free balance app.
pub const FREE_BALANCE_DEFAULT_TIMEOUT: u64 = 172_800;
pub const FREE_BALANCE_INITIAL_STATE_TIMEOUT: u64 = 172_800;

/// Token address used for plain ETH balances.
pub const ETH_TOKEN_ADDRESS: Address = Address([0; 20]);

/// Addresses of the deployed contracts plus the proxy creation code needed for
/// multisig address derivation.
///
/// Field names follow the deployment files (`ChallengeRegistry`, ...) so those
/// can be loaded directly with [NetworkContext::from_json_str].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkContext {
    pub challenge_registry: Address,
    pub conditional_transaction_delegate_target: Address,
    pub identity_app: Address,
    pub minimum_viable_multisig: Address,
    pub proxy_factory: Address,
    pub multi_asset_multi_party_coin_transfer_interpreter: Address,
    pub single_asset_two_party_coin_transfer_interpreter: Address,
    pub two_party_fixed_outcome_interpreter: Address,
    #[serde(rename = "proxyCreationCode", with = "hex_bytes")]
    pub proxy_creation_code: Vec<u8>,
}

impl NetworkContext {
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl Distribution<NetworkContext> for Standard {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> NetworkContext {
        NetworkContext {
            challenge_registry: rng.gen(),
            conditional_transaction_delegate_target: rng.gen(),
            identity_app: rng.gen(),
            minimum_viable_multisig: rng.gen(),
            proxy_factory: rng.gen(),
            multi_asset_multi_party_coin_transfer_interpreter: rng.gen(),
            single_asset_two_party_coin_transfer_interpreter: rng.gen(),
            two_party_fixed_outcome_interpreter: rng.gen(),
            proxy_creation_code: rng.gen::<[u8; 32]>().to_vec(),
        }
    }
}

/// Tunables of the protocol runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// How long an initiator waits for the counterparty's reply.
    #[serde(rename = "ioTimeoutMs", with = "duration_ms")]
    pub io_timeout: Duration,
    /// How many blocks a caller supplied block number may lag behind the
    /// chain head before uninstalling a block dependent app is refused.
    pub max_block_staleness: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(90),
            max_block_staleness: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

mod duration_ms {
    use core::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
