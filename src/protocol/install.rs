use crate::{
    commitment::{conditional_transaction_commitment, Commitment, SetStateCommitment},
    machine::{CommitmentSlot, FlowContext, ProtocolFlow, RoleMachine},
    model::TokenIndexedCoinTransferMap,
    Error, Result,
};

use super::{
    exchange::{unexpected_params, CommitmentExchange, ExchangePlan, PlannedCommitment},
    Protocol, ProtocolParams, Role,
};

/// Turns a proposal into an installed app, moving both deposits out of the
/// free balance.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallFlow;

fn plan(ctx: &FlowContext) -> Result<ExchangePlan> {
    let params = match &ctx.message.params {
        ProtocolParams::Install(p) => p,
        other => return Err(unexpected_params(Protocol::Install, other)),
    };
    let channel = ctx.channel(&params.multisig_address)?;
    let proposal = channel.get_proposal(&params.proposal_id)?;
    let app = proposal.to_app_instance()?;

    let mut decrements = TokenIndexedCoinTransferMap::new();
    for (identifier, token, amount) in [
        (
            &proposal.initiator_identifier,
            proposal.initiator_deposit_token_address,
            proposal.initiator_deposit,
        ),
        (
            &proposal.responder_identifier,
            proposal.responder_deposit_token_address,
            proposal.responder_deposit,
        ),
    ] {
        let address = channel.free_balance_address_of(identifier)?;
        let entry = decrements
            .entry(token)
            .or_default()
            .entry(address)
            .or_default();
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| Error::App("deposit overflow".into()))?;
    }

    let updated = channel.install_app(app.clone(), &decrements)?;
    let free_balance = updated.free_balance();

    let conditional = Commitment::ConditionalTransaction(conditional_transaction_commitment(
        &ctx.network,
        updated.multisig_address(),
        updated.multisig_owners(),
        app.identity_hash(),
        free_balance.identity_hash(),
        proposal.interpreter_params.interpreter_address(&ctx.network),
        proposal.interpreter_params.encode()?,
    )?);
    let free_balance_update =
        Commitment::SetState(SetStateCommitment::from_app_instance(&ctx.network, free_balance)?);

    let commitments = vec![
        PlannedCommitment::new(
            conditional,
            0,
            CommitmentSlot::ConditionalTransaction(app.identity_hash()),
        ),
        PlannedCommitment::new(
            free_balance_update,
            0,
            CommitmentSlot::SetState(free_balance.identity_hash()),
        ),
    ];

    Ok(ExchangePlan {
        updated,
        commitments,
    })
}

impl ProtocolFlow for InstallFlow {
    fn protocol(&self) -> Protocol {
        Protocol::Install
    }

    fn start(&self, role: Role, ctx: FlowContext) -> Result<Box<dyn RoleMachine>> {
        let plan = plan(&ctx)?;
        Ok(Box::new(CommitmentExchange::new(role, ctx, plan)))
    }
}
