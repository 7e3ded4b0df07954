//! Outcome types, their interpreter parameters and the conversion of app
//! outcomes into free balance increments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        encode,
        types::{Address, U256},
        Token,
    },
    network::NetworkContext,
    Error, Result,
};

/// `token => (recipient => amount)`
pub type TokenIndexedCoinTransferMap = BTreeMap<Address, BTreeMap<Address, U256>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeType {
    TwoPartyFixedOutcome,
    SingleAssetTwoPartyCoinTransfer,
    MultiAssetMultiPartyCoinTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinTransfer {
    pub to: Address,
    pub amount: U256,
}

impl CoinTransfer {
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![Token::Address(self.to), Token::Uint(self.amount)])
    }

    pub fn from_token(token: &Token) -> Result<Self> {
        match token.as_items() {
            Some([to, amount]) => Ok(CoinTransfer {
                to: to.as_address().ok_or(shape("coin transfer recipient"))?,
                amount: amount.as_uint().ok_or(shape("coin transfer amount"))?,
            }),
            _ => Err(shape("coin transfer")),
        }
    }
}

fn shape(what: &'static str) -> Error {
    crate::abiencode::Error::UnexpectedShape(what).into()
}

/// Outcome of a `TwoPartyFixedOutcome` app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoPartyFixedOutcome {
    SendToAddrOne,
    SendToAddrTwo,
    SplitAndSendToBothAddrs,
}

/// Outcome computed by app logic, one variant per [OutcomeType].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppOutcome {
    TwoPartyFixed(TwoPartyFixedOutcome),
    SingleAssetTwoPartyCoinTransfer([CoinTransfer; 2]),
    /// One list of transfers per token, in the order of the interpreter's
    /// token addresses.
    MultiAssetMultiPartyCoinTransfer(Vec<Vec<CoinTransfer>>),
}

/// Parameters the on-chain interpreter needs to turn an outcome into
/// transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcomeType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterpreterParams {
    #[serde(rename_all = "camelCase")]
    TwoPartyFixedOutcome {
        player_addrs: [Address; 2],
        amount: U256,
        token_address: Address,
    },
    #[serde(rename_all = "camelCase")]
    SingleAssetTwoPartyCoinTransfer { limit: U256, token_address: Address },
    #[serde(rename_all = "camelCase")]
    MultiAssetMultiPartyCoinTransfer {
        limit: Vec<U256>,
        token_addresses: Vec<Address>,
    },
}

impl InterpreterParams {
    /// Derive the interpreter parameters for an app funded with the given
    /// deposits. `players` are the free balance addresses of initiator and
    /// responder.
    pub fn for_deposits(
        outcome_type: OutcomeType,
        players: [Address; 2],
        deposits: [(Address, U256); 2],
    ) -> Result<Self> {
        let [(initiator_token, initiator_deposit), (responder_token, responder_deposit)] =
            deposits;
        let total = initiator_deposit
            .checked_add(responder_deposit)
            .ok_or_else(|| Error::App("deposits overflow".into()))?;
        match outcome_type {
            OutcomeType::TwoPartyFixedOutcome | OutcomeType::SingleAssetTwoPartyCoinTransfer
                if initiator_token != responder_token =>
            {
                Err(Error::App(format!(
                    "{:?} apps must be funded in a single token",
                    outcome_type
                )))
            }
            OutcomeType::TwoPartyFixedOutcome => Ok(InterpreterParams::TwoPartyFixedOutcome {
                player_addrs: players,
                amount: total,
                token_address: initiator_token,
            }),
            OutcomeType::SingleAssetTwoPartyCoinTransfer => {
                Ok(InterpreterParams::SingleAssetTwoPartyCoinTransfer {
                    limit: total,
                    token_address: initiator_token,
                })
            }
            OutcomeType::MultiAssetMultiPartyCoinTransfer => {
                if initiator_token == responder_token {
                    Ok(InterpreterParams::MultiAssetMultiPartyCoinTransfer {
                        limit: vec![total],
                        token_addresses: vec![initiator_token],
                    })
                } else {
                    Ok(InterpreterParams::MultiAssetMultiPartyCoinTransfer {
                        limit: vec![initiator_deposit, responder_deposit],
                        token_addresses: vec![initiator_token, responder_token],
                    })
                }
            }
        }
    }

    pub fn outcome_type(&self) -> OutcomeType {
        match self {
            InterpreterParams::TwoPartyFixedOutcome { .. } => OutcomeType::TwoPartyFixedOutcome,
            InterpreterParams::SingleAssetTwoPartyCoinTransfer { .. } => {
                OutcomeType::SingleAssetTwoPartyCoinTransfer
            }
            InterpreterParams::MultiAssetMultiPartyCoinTransfer { .. } => {
                OutcomeType::MultiAssetMultiPartyCoinTransfer
            }
        }
    }

    pub fn interpreter_address(&self, network: &NetworkContext) -> Address {
        match self.outcome_type() {
            OutcomeType::TwoPartyFixedOutcome => network.two_party_fixed_outcome_interpreter,
            OutcomeType::SingleAssetTwoPartyCoinTransfer => {
                network.single_asset_two_party_coin_transfer_interpreter
            }
            OutcomeType::MultiAssetMultiPartyCoinTransfer => {
                network.multi_asset_multi_party_coin_transfer_interpreter
            }
        }
    }

    /// `abi.encode` of the interpreter's params struct.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let tuple = match self {
            InterpreterParams::TwoPartyFixedOutcome {
                player_addrs,
                amount,
                token_address,
            } => Token::Tuple(vec![
                Token::FixedArray(player_addrs.iter().copied().map(Token::Address).collect()),
                Token::Uint(*amount),
                Token::Address(*token_address),
            ]),
            InterpreterParams::SingleAssetTwoPartyCoinTransfer {
                limit,
                token_address,
            } => Token::Tuple(vec![Token::Uint(*limit), Token::Address(*token_address)]),
            InterpreterParams::MultiAssetMultiPartyCoinTransfer {
                limit,
                token_addresses,
            } => Token::Tuple(vec![
                Token::Array(limit.iter().copied().map(Token::Uint).collect()),
                Token::Array(token_addresses.iter().copied().map(Token::Address).collect()),
            ]),
        };
        Ok(encode(&[tuple])?)
    }

    /// Free balance increments an outcome results in. Outcomes that exceed the
    /// limits the app was funded with are rejected.
    pub fn interpret(&self, outcome: &AppOutcome) -> Result<TokenIndexedCoinTransferMap> {
        let mut increments = TokenIndexedCoinTransferMap::new();
        let mut credit = |token: Address, to: Address, amount: U256| {
            if !amount.is_zero() {
                *increments.entry(token).or_default().entry(to).or_default() += amount;
            }
        };

        match (self, outcome) {
            (
                InterpreterParams::TwoPartyFixedOutcome {
                    player_addrs,
                    amount,
                    token_address,
                },
                AppOutcome::TwoPartyFixed(fixed),
            ) => match fixed {
                TwoPartyFixedOutcome::SendToAddrOne => {
                    credit(*token_address, player_addrs[0], *amount)
                }
                TwoPartyFixedOutcome::SendToAddrTwo => {
                    credit(*token_address, player_addrs[1], *amount)
                }
                TwoPartyFixedOutcome::SplitAndSendToBothAddrs => {
                    let half = *amount / 2;
                    credit(*token_address, player_addrs[0], half);
                    credit(*token_address, player_addrs[1], *amount - half);
                }
            },
            (
                InterpreterParams::SingleAssetTwoPartyCoinTransfer {
                    limit,
                    token_address,
                },
                AppOutcome::SingleAssetTwoPartyCoinTransfer(transfers),
            ) => {
                check_limit(transfers, *limit)?;
                for t in transfers {
                    credit(*token_address, t.to, t.amount);
                }
            }
            (
                InterpreterParams::MultiAssetMultiPartyCoinTransfer {
                    limit,
                    token_addresses,
                },
                AppOutcome::MultiAssetMultiPartyCoinTransfer(per_token),
            ) => {
                if per_token.len() != token_addresses.len() {
                    return Err(Error::App(format!(
                        "outcome has transfers for {} tokens, app is funded in {}",
                        per_token.len(),
                        token_addresses.len()
                    )));
                }
                for ((transfers, token), limit) in
                    per_token.iter().zip(token_addresses).zip(limit)
                {
                    check_limit(transfers, *limit)?;
                    for t in transfers {
                        credit(*token, t.to, t.amount);
                    }
                }
            }
            (params, outcome) => {
                return Err(Error::App(format!(
                    "outcome {:?} does not match outcome type {:?}",
                    outcome,
                    params.outcome_type()
                )))
            }
        }

        Ok(increments)
    }
}

fn check_limit(transfers: &[CoinTransfer], limit: U256) -> Result<()> {
    let total = transfers
        .iter()
        .try_fold(U256::zero(), |acc, t| acc.checked_add(t.amount))
        .ok_or_else(|| Error::App("outcome total overflows".into()))?;
    if total > limit {
        return Err(Error::App(format!(
            "outcome distributes {} but the app only holds {}",
            total, limit
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> [Address; 2] {
        [Address([1; 20]), Address([2; 20])]
    }

    #[test]
    fn split_gives_remainder_to_second_player() {
        let params = InterpreterParams::TwoPartyFixedOutcome {
            player_addrs: players(),
            amount: 7u64.into(),
            token_address: Address::default(),
        };

        let increments = params
            .interpret(&AppOutcome::TwoPartyFixed(
                TwoPartyFixedOutcome::SplitAndSendToBothAddrs,
            ))
            .unwrap();

        let eth = &increments[&Address::default()];
        assert_eq!(eth[&players()[0]], 3u64.into());
        assert_eq!(eth[&players()[1]], 4u64.into());
    }

    #[test]
    fn coin_transfer_above_limit_is_rejected() {
        let params = InterpreterParams::SingleAssetTwoPartyCoinTransfer {
            limit: 10u64.into(),
            token_address: Address::default(),
        };
        let outcome = AppOutcome::SingleAssetTwoPartyCoinTransfer([
            CoinTransfer {
                to: players()[0],
                amount: 6u64.into(),
            },
            CoinTransfer {
                to: players()[1],
                amount: 5u64.into(),
            },
        ]);

        assert!(matches!(params.interpret(&outcome), Err(Error::App(_))));
    }

    #[test]
    fn mismatched_outcome_type_is_rejected() {
        let params = InterpreterParams::SingleAssetTwoPartyCoinTransfer {
            limit: 10u64.into(),
            token_address: Address::default(),
        };
        let outcome = AppOutcome::TwoPartyFixed(TwoPartyFixedOutcome::SendToAddrOne);
        assert!(params.interpret(&outcome).is_err());
    }

    #[test]
    fn mixed_token_deposits_need_multi_asset_outcome() {
        let deposits = [
            (Address::default(), 1u64.into()),
            (Address([9; 20]), 2u64.into()),
        ];
        assert!(InterpreterParams::for_deposits(
            OutcomeType::SingleAssetTwoPartyCoinTransfer,
            players(),
            deposits
        )
        .is_err());

        let params = InterpreterParams::for_deposits(
            OutcomeType::MultiAssetMultiPartyCoinTransfer,
            players(),
            deposits,
        )
        .unwrap();
        assert_eq!(
            params,
            InterpreterParams::MultiAssetMultiPartyCoinTransfer {
                limit: vec![1u64.into(), 2u64.into()],
                token_addresses: vec![Address::default(), Address([9; 20])],
            }
        );
    }

    #[test]
    fn single_asset_params_encoding() {
        let params = InterpreterParams::SingleAssetTwoPartyCoinTransfer {
            limit: 0x10u64.into(),
            token_address: Address([0xaa; 20]),
        };
        let encoded = params.encode().unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 0x10);
        assert_eq!(&encoded[44..64], &[0xaa; 20]);
    }
}
