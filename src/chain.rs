//! Read-only view of the chain.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use log::debug;

use crate::{Error, Result};

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn block_number(&self) -> Result<u64>;
}

/// A chain that sits at whatever block it was last told. Useful wherever no
/// node is around.
#[derive(Debug, Default)]
pub struct StaticChain {
    block: AtomicU64,
}

impl StaticChain {
    pub fn new(block: u64) -> Self {
        Self {
            block: AtomicU64::new(block),
        }
    }

    pub fn set(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for StaticChain {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.block.load(Ordering::SeqCst))
    }
}

/// Decides which block number an outcome is computed at.
///
/// A caller supplied number is accepted as long as it is at most
/// `max_staleness` blocks behind the chain head. Without one, the head is
/// used.
#[derive(Clone)]
pub struct BlockNumberOracle {
    reader: Arc<dyn ChainReader>,
    max_staleness: u64,
}

impl core::fmt::Debug for BlockNumberOracle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockNumberOracle")
            .field("max_staleness", &self.max_staleness)
            .finish_non_exhaustive()
    }
}

impl BlockNumberOracle {
    pub fn new(reader: Arc<dyn ChainReader>, max_staleness: u64) -> Self {
        Self {
            reader,
            max_staleness,
        }
    }

    pub async fn resolve(&self, provided: Option<u64>) -> Result<u64> {
        let latest = self.reader.block_number().await?;
        match provided {
            Some(block) if latest.saturating_sub(block) > self.max_staleness => {
                Err(Error::StaleBlockNumber {
                    provided: block,
                    latest,
                    tolerance: self.max_staleness,
                })
            }
            Some(block) => Ok(block),
            None => {
                debug!("Using chain head {} as block number", latest);
                Ok(latest)
            }
        }
    }
}
