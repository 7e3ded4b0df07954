//! Typed view of the free balance app state.
//!
//! On chain the state is
//! `(address[] tokenAddresses, (address to, uint256 amount)[][] balances, bytes32[] activeApps)`,
//! here it is kept per token with the active apps as a set.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    abiencode::{
        types::{Address, Hash, U256},
        Error as AbiError, Token,
    },
    Error, Result,
};

use super::outcome::{CoinTransfer, TokenIndexedCoinTransferMap};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FreeBalance {
    balances: BTreeMap<Address, Vec<CoinTransfer>>,
    active_apps: BTreeSet<Hash>,
}

/// Requested more than a participant holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub token: Address,
    pub address: Address,
    pub available: U256,
    pub requested: U256,
}

impl Shortfall {
    pub fn into_error(self, multisig: Address) -> Error {
        Error::InsufficientFunds {
            multisig,
            address: self.address,
            token: self.token,
            available: self.available,
            requested: self.requested,
        }
    }
}

fn shape(what: &'static str) -> Error {
    AbiError::UnexpectedShape(what).into()
}

impl FreeBalance {
    /// Every address holds `amount` of every token.
    pub fn create_with_funded_token_amounts(
        addresses: &[Address],
        amount: U256,
        tokens: &[Address],
    ) -> Self {
        let balances = tokens
            .iter()
            .map(|token| {
                let transfers = addresses
                    .iter()
                    .map(|to| CoinTransfer { to: *to, amount })
                    .collect();
                (*token, transfers)
            })
            .collect();
        Self {
            balances,
            active_apps: BTreeSet::new(),
        }
    }

    pub fn from_app_state(state: &Token) -> Result<Self> {
        let [tokens, balances, active_apps] = match state.as_items() {
            Some([a, b, c]) => [a, b, c],
            _ => return Err(shape("free balance state")),
        };

        let tokens = tokens.as_items().ok_or(shape("free balance tokens"))?;
        let balances = balances.as_items().ok_or(shape("free balance balances"))?;
        if tokens.len() != balances.len() {
            return Err(shape("free balance token and balance count differ"));
        }

        let mut out = FreeBalance::default();
        for (token, transfers) in tokens.iter().zip(balances) {
            let token = token.as_address().ok_or(shape("free balance token"))?;
            let transfers = transfers
                .as_items()
                .ok_or(shape("free balance transfers"))?
                .iter()
                .map(CoinTransfer::from_token)
                .collect::<Result<Vec<_>>>()?;
            out.balances.insert(token, transfers);
        }

        for app in active_apps.as_items().ok_or(shape("free balance apps"))? {
            out.active_apps
                .insert(app.as_hash().ok_or(shape("free balance app hash"))?);
        }
        Ok(out)
    }

    pub fn to_app_state(&self) -> Token {
        Token::Tuple(vec![
            Token::Array(self.balances.keys().copied().map(Token::Address).collect()),
            Token::Array(
                self.balances
                    .values()
                    .map(|transfers| {
                        Token::Array(transfers.iter().map(CoinTransfer::to_token).collect())
                    })
                    .collect(),
            ),
            Token::Array(self.active_apps.iter().copied().map(Token::hash).collect()),
        ])
    }

    pub fn get_balance(&self, token: &Address, address: &Address) -> U256 {
        self.balances
            .get(token)
            .and_then(|transfers| transfers.iter().find(|t| t.to == *address))
            .map(|t| t.amount)
            .unwrap_or_default()
    }

    pub fn balances(&self) -> &BTreeMap<Address, Vec<CoinTransfer>> {
        &self.balances
    }

    /// Sum of all balances in `token`.
    pub fn total(&self, token: &Address) -> U256 {
        self.balances
            .get(token)
            .map(|transfers| {
                transfers
                    .iter()
                    .fold(U256::zero(), |acc, t| acc.saturating_add(t.amount))
            })
            .unwrap_or_default()
    }

    pub fn active_apps(&self) -> &BTreeSet<Hash> {
        &self.active_apps
    }

    pub fn has_active_app(&self, app: &Hash) -> bool {
        self.active_apps.contains(app)
    }

    pub fn add_active_app(&self, app: Hash) -> Self {
        let mut next = self.clone();
        next.active_apps.insert(app);
        next
    }

    pub fn remove_active_app(&self, app: &Hash) -> Self {
        let mut next = self.clone();
        next.active_apps.remove(app);
        next
    }

    pub fn increment(&self, increments: &TokenIndexedCoinTransferMap) -> Result<Self> {
        let mut next = self.clone();
        for (token, by_address) in increments {
            let transfers = next.balances.entry(*token).or_default();
            for (address, amount) in by_address {
                match transfers.iter_mut().find(|t| t.to == *address) {
                    Some(t) => {
                        t.amount = t
                            .amount
                            .checked_add(*amount)
                            .ok_or_else(|| Error::App("free balance overflow".into()))?
                    }
                    None => transfers.push(CoinTransfer {
                        to: *address,
                        amount: *amount,
                    }),
                }
            }
        }
        Ok(next)
    }

    /// Fails with the first shortfall if any balance would go negative.
    pub fn decrement(
        &self,
        decrements: &TokenIndexedCoinTransferMap,
    ) -> core::result::Result<Self, Shortfall> {
        let mut next = self.clone();
        for (token, by_address) in decrements {
            for (address, requested) in by_address {
                let available = self.get_balance(token, address);
                if available < *requested {
                    return Err(Shortfall {
                        token: *token,
                        address: *address,
                        available,
                        requested: *requested,
                    });
                }
                if requested.is_zero() {
                    continue;
                }
                if let Some(t) = next
                    .balances
                    .get_mut(token)
                    .and_then(|transfers| transfers.iter_mut().find(|t| t.to == *address))
                {
                    t.amount = available - *requested;
                }
            }
        }
        Ok(next)
    }
}
