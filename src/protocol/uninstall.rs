use crate::{
    commitment::{Commitment, SetStateCommitment},
    machine::{CommitmentSlot, FlowContext, ProtocolFlow, RoleMachine},
    Result,
};

use super::{
    compute_token_indexed_free_balance_increments,
    exchange::{unexpected_params, CommitmentExchange, ExchangePlan, PlannedCommitment},
    Protocol, ProtocolParams, Role,
};

/// Removes an app and pays its outcome back into the free balance.
///
/// The free balance update is signed at the removed app's key, not at index
/// 0, and filed under the app's identity hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallFlow;

fn plan(ctx: &FlowContext) -> Result<ExchangePlan> {
    let params = match &ctx.message.params {
        ProtocolParams::Uninstall(p) => p,
        other => return Err(unexpected_params(Protocol::Uninstall, other)),
    };
    let channel = ctx.channel(&params.multisig_address)?;
    let app = channel.get_app_instance(&params.app_identity_hash)?;
    let logic = ctx.apps.get(&app.app_definition())?;

    let increments =
        compute_token_indexed_free_balance_increments(app, logic.as_ref(), params.block_number)?;
    let updated = channel.uninstall_app(&params.app_identity_hash, &increments)?;

    let commitment = Commitment::SetState(SetStateCommitment::from_app_instance(
        &ctx.network,
        updated.free_balance(),
    )?);
    let key_index = app.app_seq_no();

    Ok(ExchangePlan {
        updated,
        commitments: vec![PlannedCommitment::new(
            commitment,
            key_index,
            CommitmentSlot::SetState(params.app_identity_hash),
        )],
    })
}

impl ProtocolFlow for UninstallFlow {
    fn protocol(&self) -> Protocol {
        Protocol::Uninstall
    }

    fn start(&self, role: Role, ctx: FlowContext) -> Result<Box<dyn RoleMachine>> {
        let plan = plan(&ctx)?;
        Ok(Box::new(CommitmentExchange::new(role, ctx, plan)))
    }
}
