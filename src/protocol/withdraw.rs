use crate::{
    commitment::{withdraw_commitment, Commitment, SetStateCommitment},
    machine::{CommitmentSlot, FlowContext, ProtocolFlow, RoleMachine},
    model::TokenIndexedCoinTransferMap,
    Result,
};

use super::{
    exchange::{unexpected_params, CommitmentExchange, ExchangePlan, PlannedCommitment},
    Protocol, ProtocolParams, Role,
};

/// Pays part of the initiator's free balance out of the multisig.
#[derive(Debug, Clone, Copy, Default)]
pub struct WithdrawFlow;

fn plan(ctx: &FlowContext) -> Result<ExchangePlan> {
    let params = match &ctx.message.params {
        ProtocolParams::Withdraw(p) => p,
        other => return Err(unexpected_params(Protocol::Withdraw, other)),
    };
    let channel = ctx.channel(&params.multisig_address)?;

    let mut decrements = TokenIndexedCoinTransferMap::new();
    decrements.entry(params.token_address).or_default().insert(
        channel.free_balance_address_of(&params.initiator_xpub)?,
        params.amount,
    );
    let free_balance = channel
        .get_free_balance_class()?
        .decrement(&decrements)
        .map_err(|shortfall| shortfall.into_error(channel.multisig_address()))?;
    let updated = channel.set_free_balance(&free_balance);

    let withdrawal = Commitment::Withdraw(withdraw_commitment(
        updated.multisig_address(),
        updated.multisig_owners(),
        params.recipient,
        params.token_address,
        params.amount,
    )?);
    let free_balance_update = Commitment::SetState(SetStateCommitment::from_app_instance(
        &ctx.network,
        updated.free_balance(),
    )?);
    let free_balance_hash = updated.free_balance().identity_hash();

    Ok(ExchangePlan {
        commitments: vec![
            PlannedCommitment::new(
                withdrawal,
                0,
                CommitmentSlot::Withdrawal(updated.multisig_address()),
            ),
            PlannedCommitment::new(
                free_balance_update,
                0,
                CommitmentSlot::SetState(free_balance_hash),
            ),
        ],
        updated,
    })
}

impl ProtocolFlow for WithdrawFlow {
    fn protocol(&self) -> Protocol {
        Protocol::Withdraw
    }

    fn start(&self, role: Role, ctx: FlowContext) -> Result<Box<dyn RoleMachine>> {
        let plan = plan(&ctx)?;
        Ok(Box::new(CommitmentExchange::new(role, ctx, plan)))
    }
}
