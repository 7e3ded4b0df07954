use crate::{
    commitment::{setup_commitment, Commitment},
    machine::{CommitmentSlot, FlowContext, ProtocolFlow, RoleMachine},
    model::{get_create2_multisig_address, CriticalAddresses, StateChannel},
    Error, Result,
};

use super::{
    exchange::{unexpected_params, CommitmentExchange, ExchangePlan, PlannedCommitment},
    Protocol, ProtocolParams, Role,
};

/// Opens a channel: both sides build the same empty channel and co-sign the
/// setup commitment that makes its free balance enforceable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupFlow;

fn plan(ctx: &FlowContext) -> Result<ExchangePlan> {
    let params = match &ctx.message.params {
        ProtocolParams::Setup(p) => p,
        other => return Err(unexpected_params(Protocol::Setup, other)),
    };
    if ctx.channels.contains_key(&params.multisig_address) {
        return Err(Error::ChannelAlreadyExists(params.multisig_address));
    }
    let expected = get_create2_multisig_address(
        &[params.initiator_xpub, params.responder_xpub],
        &ctx.network,
    )?;
    if expected != params.multisig_address {
        return Err(Error::MultisigMismatch {
            expected,
            got: params.multisig_address,
        });
    }

    let channel = StateChannel::setup_channel(
        ctx.network.identity_app,
        CriticalAddresses::from(ctx.network.as_ref()),
        params.multisig_address,
        &[params.initiator_xpub, params.responder_xpub],
    )?;
    let free_balance = channel.free_balance().identity_hash();

    let commitment = Commitment::Setup(setup_commitment(
        &ctx.network,
        channel.multisig_address(),
        channel.multisig_owners(),
        free_balance,
    )?);

    Ok(ExchangePlan {
        updated: channel,
        commitments: vec![PlannedCommitment::new(
            commitment,
            0,
            CommitmentSlot::ConditionalTransaction(free_balance),
        )],
    })
}

impl ProtocolFlow for SetupFlow {
    fn protocol(&self) -> Protocol {
        Protocol::Setup
    }

    fn start(&self, role: Role, ctx: FlowContext) -> Result<Box<dyn RoleMachine>> {
        let plan = plan(&ctx)?;
        Ok(Box::new(CommitmentExchange::new(role, ctx, plan)))
    }
}
