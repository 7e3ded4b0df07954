use crate::{
    commitment::{Commitment, SetStateCommitment},
    machine::{CommitmentSlot, FlowContext, ProtocolFlow, RoleMachine},
    Result,
};

use super::{
    exchange::{unexpected_params, CommitmentExchange, ExchangePlan, PlannedCommitment},
    Protocol, ProtocolParams, Role,
};

/// Advances an installed app by one action. Both sides run the app logic and
/// co-sign the resulting state at the app's own key.
#[derive(Debug, Clone, Copy, Default)]
pub struct TakeActionFlow;

fn plan(ctx: &FlowContext) -> Result<ExchangePlan> {
    let params = match &ctx.message.params {
        ProtocolParams::TakeAction(p) => p,
        other => return Err(unexpected_params(Protocol::TakeAction, other)),
    };
    let channel = ctx.channel(&params.multisig_address)?;
    let app = channel.get_app_instance(&params.app_identity_hash)?;
    let logic = ctx.apps.get(&app.app_definition())?;

    let new_state = logic.apply_action(app.latest_state(), &params.action)?;
    let next = app.set_state_with_action(new_state, params.action.clone());
    let commitment =
        Commitment::SetState(SetStateCommitment::from_app_instance(&ctx.network, &next)?);
    let key_index = next.app_seq_no();

    Ok(ExchangePlan {
        updated: channel.set_state(next)?,
        commitments: vec![PlannedCommitment::new(
            commitment,
            key_index,
            CommitmentSlot::SetState(params.app_identity_hash),
        )],
    })
}

impl ProtocolFlow for TakeActionFlow {
    fn protocol(&self) -> Protocol {
        Protocol::TakeAction
    }

    fn start(&self, role: Role, ctx: FlowContext) -> Result<Box<dyn RoleMachine>> {
        let plan = plan(&ctx)?;
        Ok(Box::new(CommitmentExchange::new(role, ctx, plan)))
    }
}
