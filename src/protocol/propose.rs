use log::debug;

use crate::{
    abiencode::types::Hash,
    machine::{FlowContext, ProtocolFlow, RoleMachine},
    model::{AppInstanceProposal, InterpreterParams},
    network::ETH_TOKEN_ADDRESS,
    Error, Result,
};

use super::{
    exchange::{unexpected_params, CommitmentExchange, ExchangePlan},
    Protocol, ProtocolParams, Role,
};

/// Records a proposal on both sides. Nothing is signed here, the commitments
/// for the app are exchanged when it gets installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposeFlow;

fn plan(ctx: &FlowContext) -> Result<ExchangePlan> {
    let params = match &ctx.message.params {
        ProtocolParams::Propose(p) => p,
        other => return Err(unexpected_params(Protocol::Propose, other)),
    };
    let channel = ctx.channel(&params.multisig_address)?;
    let initial_state = params
        .initial_state
        .clone()
        .ok_or(Error::NullOrMissingInput("initial state"))?;
    ctx.apps.get(&params.app_definition)?;

    let initiator_token = params
        .initiator_deposit_token_address
        .unwrap_or(ETH_TOKEN_ADDRESS);
    let responder_token = params
        .responder_deposit_token_address
        .unwrap_or(ETH_TOKEN_ADDRESS);

    let players = [
        channel.free_balance_address_of(&params.initiator_xpub)?,
        channel.free_balance_address_of(&params.responder_xpub)?,
    ];

    // Both deposits must be covered before anything is sent.
    let free_balance = channel.get_free_balance_class()?;
    for (address, token, requested) in [
        (players[0], initiator_token, params.initiator_deposit),
        (players[1], responder_token, params.responder_deposit),
    ] {
        let available = free_balance.get_balance(&token, &address);
        if available < requested {
            return Err(Error::InsufficientFunds {
                multisig: channel.multisig_address(),
                address,
                token,
                available,
                requested,
            });
        }
    }

    let interpreter_params = InterpreterParams::for_deposits(
        params.outcome_type,
        players,
        [
            (initiator_token, params.initiator_deposit),
            (responder_token, params.responder_deposit),
        ],
    )?;

    let mut proposal = AppInstanceProposal {
        identity_hash: Hash::default(),
        app_definition: params.app_definition,
        app_seq_no: channel.num_proposed_apps(),
        initial_state,
        default_timeout: params.default_timeout,
        timeout: params.timeout,
        initiator_identifier: params.initiator_xpub,
        responder_identifier: params.responder_xpub,
        initiator_deposit: params.initiator_deposit,
        initiator_deposit_token_address: initiator_token,
        responder_deposit: params.responder_deposit,
        responder_deposit_token_address: responder_token,
        interpreter_params,
    };
    proposal.identity_hash = proposal.app_identity()?.identity_hash()?;
    debug!(
        "Proposal {} gets app sequence number {}",
        proposal.identity_hash, proposal.app_seq_no
    );

    Ok(ExchangePlan {
        updated: channel.add_proposal(proposal)?,
        commitments: Vec::new(),
    })
}

impl ProtocolFlow for ProposeFlow {
    fn protocol(&self) -> Protocol {
        Protocol::Propose
    }

    fn start(&self, role: Role, ctx: FlowContext) -> Result<Box<dyn RoleMachine>> {
        let plan = plan(&ctx)?;
        Ok(Box::new(CommitmentExchange::new(role, ctx, plan)))
    }
}
