use crate::{
    abiencode::{types::U256, Error as AbiError, Token},
    model::{AppOutcome, CoinTransfer},
    Error, Result,
};

use super::AppLogic;

/// Two party payment app.
///
/// State: `((address to, uint256 amount)[2] coinTransfers)`, action:
/// `(uint256 amount)` moving `amount` from the first to the second
/// participant. Its outcome is a single asset coin transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTransferApp;

impl SimpleTransferApp {
    pub fn state(transfers: [CoinTransfer; 2]) -> Token {
        Token::Tuple(vec![Token::FixedArray(
            transfers.iter().map(CoinTransfer::to_token).collect(),
        )])
    }

    pub fn action(amount: U256) -> Token {
        Token::Tuple(vec![Token::Uint(amount)])
    }

    pub fn transfers(state: &Token) -> Result<[CoinTransfer; 2]> {
        match state.as_items() {
            Some([transfers]) => match transfers.as_items() {
                Some([a, b]) => Ok([CoinTransfer::from_token(a)?, CoinTransfer::from_token(b)?]),
                _ => Err(AbiError::UnexpectedShape("coin transfer pair").into()),
            },
            _ => Err(AbiError::UnexpectedShape("simple transfer state").into()),
        }
    }
}

impl AppLogic for SimpleTransferApp {
    fn apply_action(&self, state: &Token, action: &Token) -> Result<Token> {
        let [mut from, mut to] = Self::transfers(state)?;
        let amount = match action.as_items() {
            Some([amount]) => amount
                .as_uint()
                .ok_or(AbiError::UnexpectedShape("transfer amount"))?,
            _ => return Err(AbiError::UnexpectedShape("simple transfer action").into()),
        };

        from.amount = from.amount.checked_sub(amount).ok_or_else(|| {
            Error::App(format!("cannot transfer {}, only {} left", amount, from.amount))
        })?;
        to.amount = to
            .amount
            .checked_add(amount)
            .ok_or_else(|| Error::App("transfer overflows".into()))?;

        Ok(Self::state([from, to]))
    }

    fn compute_outcome(&self, state: &Token, _block_number: Option<u64>) -> Result<AppOutcome> {
        Ok(AppOutcome::SingleAssetTwoPartyCoinTransfer(Self::transfers(
            state,
        )?))
    }
}
