//! Signature exchange shared by all flows.
//!
//! Initiator: sign every commitment, send the signatures and wait, verify the
//! reply, write the finalized commitments, persist.
//! Responder: verify the received signatures, sign, write, persist, reply.

use log::debug;

use crate::{
    abiencode::types::Signature,
    commitment::{assert_is_valid_signature, Commitment},
    keys::{xkey_kth_address, Xpub},
    machine::{CommitmentSlot, FlowContext, Opcode, OpcodeResult, RoleMachine, Step},
    model::{StateChannel, StateChannelsMap},
    Error, Result,
};

use super::{Protocol, ProtocolMessage, ProtocolParams, Role, UNASSIGNED_SEQ_NO};

#[derive(Debug, Clone)]
pub(crate) struct PlannedCommitment {
    pub commitment: Commitment,
    /// Key both parties sign with. The counterparty's signature is checked
    /// against its address at the same index.
    pub key_index: u32,
    /// Where the doubly signed transaction goes, if anywhere.
    pub slot: Option<CommitmentSlot>,
}

impl PlannedCommitment {
    pub fn new(commitment: Commitment, key_index: u32, slot: CommitmentSlot) -> Self {
        Self {
            commitment,
            key_index,
            slot: Some(slot),
        }
    }
}

/// Outcome of a flow's validation: the channel after the run and what has to
/// be signed for it.
#[derive(Debug, Clone)]
pub(crate) struct ExchangePlan {
    pub updated: StateChannel,
    pub commitments: Vec<PlannedCommitment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Start,
    Signature,
    Reply,
    Done,
}

#[derive(Debug)]
pub(crate) struct CommitmentExchange {
    role: Role,
    protocol: Protocol,
    message: ProtocolMessage,
    counterparty: Xpub,
    channels: StateChannelsMap,
    plan: ExchangePlan,
    own: Vec<Signature>,
    theirs: Option<Vec<Signature>>,
    written: usize,
    persisted: bool,
    replied: bool,
    awaiting: Awaiting,
}

/// The other party of a run, seen from `role`.
pub(crate) fn counterparty(role: Role, params: &ProtocolParams) -> Xpub {
    match role {
        Role::Initiator => params.responder_xpub(),
        Role::Responder => params.initiator_xpub(),
    }
}

pub(crate) fn unexpected_params(expected: Protocol, params: &ProtocolParams) -> Error {
    Error::UnexpectedMessage(format!(
        "{} flow started with {} params",
        expected,
        params.protocol()
    ))
}

impl CommitmentExchange {
    pub fn new(role: Role, ctx: FlowContext, plan: ExchangePlan) -> Self {
        let counterparty = counterparty(role, &ctx.message.params);
        let theirs = match role {
            Role::Initiator => None,
            Role::Responder => Some(ctx.message.custom_data.signatures.clone()),
        };
        Self {
            role,
            protocol: ctx.message.protocol,
            message: ctx.message,
            counterparty,
            channels: ctx.channels,
            plan,
            own: Vec::new(),
            theirs,
            written: 0,
            persisted: false,
            replied: false,
            awaiting: Awaiting::Start,
        }
    }

    fn verify(&self, signatures: &[Signature]) -> Result<()> {
        if signatures.len() != self.plan.commitments.len() {
            return Err(Error::UnexpectedMessage(format!(
                "{} expects {} signatures, got {}",
                self.protocol,
                self.plan.commitments.len(),
                signatures.len()
            )));
        }
        for (planned, sig) in self.plan.commitments.iter().zip(signatures) {
            let expected = xkey_kth_address(&self.counterparty, planned.key_index)?;
            assert_is_valid_signature(expected, Some(&planned.commitment), Some(sig))?;
        }
        Ok(())
    }

    fn message_to_counterparty(&self, seq: u32) -> ProtocolMessage {
        let mut msg = self.message.clone();
        msg.seq = seq;
        msg.to_xpub = self.counterparty;
        msg.from_xpub = match self.role {
            Role::Initiator => self.message.from_xpub,
            Role::Responder => self.message.to_xpub,
        };
        msg.custom_data.signatures = self.own.clone();
        msg
    }

    fn next(&mut self) -> Result<Step> {
        if let Some(planned) = self.plan.commitments.get(self.own.len()) {
            self.awaiting = Awaiting::Signature;
            return Ok(Step::Yield(Opcode::OpSign {
                commitment: planned.commitment.clone(),
                key_index: planned.key_index,
            }));
        }

        if self.theirs.is_none() {
            self.awaiting = Awaiting::Reply;
            return Ok(Step::Yield(Opcode::IoSendAndWait(
                self.message_to_counterparty(1),
            )));
        }

        while let Some(planned) = self.plan.commitments.get(self.written) {
            let i = self.written;
            self.written += 1;
            if let Some(slot) = planned.slot {
                let theirs = self
                    .theirs
                    .as_ref()
                    .and_then(|sigs| sigs.get(i))
                    .ok_or(Error::MissingSignatureInput)?;
                self.awaiting = Awaiting::Done;
                return Ok(Step::Yield(Opcode::WriteCommitment {
                    protocol: self.protocol,
                    slot,
                    transaction: planned
                        .commitment
                        .signed_transaction(&[self.own[i], *theirs])?,
                }));
            }
        }

        if !self.persisted {
            self.persisted = true;
            self.awaiting = Awaiting::Done;
            return Ok(Step::Yield(Opcode::PersistStateChannel(vec![self
                .plan
                .updated
                .clone()])));
        }

        if self.role == Role::Responder && !self.replied {
            self.replied = true;
            self.awaiting = Awaiting::Done;
            return Ok(Step::Yield(Opcode::IoSend(
                self.message_to_counterparty(UNASSIGNED_SEQ_NO),
            )));
        }

        let mut channels = core::mem::take(&mut self.channels);
        channels.insert(self.plan.updated.multisig_address(), self.plan.updated.clone());
        Ok(Step::Finished(channels))
    }
}

impl RoleMachine for CommitmentExchange {
    fn resume(&mut self, input: OpcodeResult) -> Result<Step> {
        match (self.awaiting, input) {
            (Awaiting::Start, OpcodeResult::Start) => {
                match self.role {
                    Role::Initiator => debug!("{}: initiation started", self.protocol),
                    Role::Responder => {
                        debug!("{}: response started", self.protocol);
                        if let Some(theirs) = &self.theirs {
                            self.verify(theirs)?;
                            debug!("{}: verified initiator's signatures", self.protocol);
                        }
                    }
                }
            }
            (Awaiting::Signature, OpcodeResult::Signature(sig)) => self.own.push(sig),
            (Awaiting::Reply, OpcodeResult::Reply(reply)) => {
                if reply.process_id != self.message.process_id {
                    return Err(Error::UnexpectedMessage(format!(
                        "reply for process {} in process {}",
                        reply.process_id, self.message.process_id
                    )));
                }
                debug!("{}: received responder's signatures", self.protocol);
                self.verify(&reply.custom_data.signatures)?;
                debug!("{}: verified responder's signatures", self.protocol);
                self.theirs = Some(reply.custom_data.signatures);
            }
            (Awaiting::Done, OpcodeResult::Done) => {}
            (awaiting, input) => {
                return Err(Error::UnexpectedMessage(format!(
                    "{} was waiting for {:?}, got {:?}",
                    self.protocol, awaiting, input
                )))
            }
        }
        self.next()
    }
}
