use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use log::{debug, info, warn};
use tokio::sync::{oneshot, Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    abiencode::types::{Address, ProcessId},
    apps::AppRegistry,
    chain::{BlockNumberOracle, ChainReader},
    keys::{IndexedSigner, Xpub},
    model::StateChannelsMap,
    network::{EngineConfig, NetworkContext},
    protocol::{Protocol, ProtocolMessage, ProtocolParams, Role, UNASSIGNED_SEQ_NO},
    store::Store,
    wire::MessagingService,
    Error, Result,
};

use super::{CommitmentSlot, FlowContext, FlowRegistry, Opcode, OpcodeResult, Step};

/// Executes protocol runs for one participant.
///
/// Runs touching the same multisig are serialized; each one works on the
/// channel as found in the store once it holds the channel's lock.
pub struct ProtocolRunner {
    network: Arc<NetworkContext>,
    config: EngineConfig,
    signer: Arc<dyn IndexedSigner>,
    store: Arc<dyn Store>,
    messaging: Arc<dyn MessagingService>,
    oracle: Option<BlockNumberOracle>,
    apps: Arc<AppRegistry>,
    flows: FlowRegistry,
    pending: Mutex<HashMap<ProcessId, oneshot::Sender<ProtocolMessage>>>,
    locks: Mutex<HashMap<Address, Arc<AsyncMutex<()>>>>,
}

impl core::fmt::Debug for ProtocolRunner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProtocolRunner")
            .field("public_identifier", &self.public_identifier())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProtocolRunner {
    pub fn builder(network: NetworkContext) -> ProtocolRunnerBuilder {
        ProtocolRunnerBuilder {
            network,
            config: EngineConfig::default(),
            signer: None,
            store: None,
            messaging: None,
            chain: None,
            apps: AppRegistry::default(),
            flows: FlowRegistry::default(),
        }
    }

    pub fn public_identifier(&self) -> Xpub {
        self.signer.public_identifier()
    }

    pub fn network(&self) -> &NetworkContext {
        &self.network
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Run the initiating side of `protocol`.
    ///
    /// The entry for the run's multisig in `channels` is replaced by the
    /// stored one before the flow sees it. On success the returned map holds
    /// every channel the run persisted. On failure nothing was persisted.
    pub async fn initiate_protocol(
        &self,
        protocol: Protocol,
        mut channels: StateChannelsMap,
        params: ProtocolParams,
    ) -> Result<StateChannelsMap> {
        if params.protocol() != protocol {
            return Err(Error::UnexpectedMessage(format!(
                "{} initiated with {} params",
                protocol,
                params.protocol()
            )));
        }
        if params.initiator_xpub() != self.public_identifier() {
            return Err(Error::UnexpectedMessage(format!(
                "{} initiated on behalf of {}",
                protocol,
                params.initiator_xpub()
            )));
        }

        let multisig = params.multisig_address();
        let _guard = self.lock_channel(multisig).await;
        if let Some(fresh) = self.store.get_state_channel(&multisig).await? {
            channels.insert(multisig, fresh);
        }

        let params = self.resolve_block_number(&channels, params).await?;
        let message = ProtocolMessage::initiate(rand::random(), params);
        self.run(Role::Initiator, channels, message).await
    }

    /// Entry point for every message from a counterparty.
    ///
    /// Replies are handed to the run waiting for them and yield `None`. Any
    /// other message starts the responding side of its protocol, returning
    /// the resulting channels.
    pub async fn handle_received_message(
        &self,
        msg: ProtocolMessage,
    ) -> Result<Option<StateChannelsMap>> {
        if let Some(waiter) = self.take_pending(&msg.process_id) {
            if waiter.send(msg).is_err() {
                debug!("Run stopped waiting before its reply arrived");
            }
            return Ok(None);
        }
        if msg.seq == UNASSIGNED_SEQ_NO {
            warn!(
                "Dropping reply to {} run {} nobody waits for",
                msg.protocol, msg.process_id
            );
            return Ok(None);
        }
        if msg.to_xpub != self.public_identifier() {
            return Err(Error::UnexpectedMessage(format!(
                "message for {} delivered to {}",
                msg.to_xpub,
                self.public_identifier()
            )));
        }

        let multisig = msg.params.multisig_address();
        let _guard = self.lock_channel(multisig).await;
        let channels = self.store.get_state_channels_map().await?;

        let mut msg = msg;
        msg.params = self.resolve_block_number(&channels, msg.params).await?;
        self.run(Role::Responder, channels, msg).await.map(Some)
    }

    async fn run(
        &self,
        role: Role,
        channels: StateChannelsMap,
        message: ProtocolMessage,
    ) -> Result<StateChannelsMap> {
        let protocol = message.protocol;
        let process_id = message.process_id;
        let started = Instant::now();

        let ctx = FlowContext {
            network: self.network.clone(),
            apps: self.apps.clone(),
            channels,
            message,
            me: self.public_identifier(),
        };

        let result = self.drive(role, ctx).await;
        match &result {
            Ok(_) => info!(
                "{} {:?} run {} completed in {:?}",
                protocol,
                role,
                process_id,
                started.elapsed()
            ),
            Err(e) => warn!("{} {:?} run {} aborted: {}", protocol, role, process_id, e),
        }
        result
    }

    async fn drive(&self, role: Role, ctx: FlowContext) -> Result<StateChannelsMap> {
        check_participants(role, &ctx)?;
        let protocol = ctx.message.protocol;
        let mut machine = self.flows.get(protocol)?.start(role, ctx)?;
        let mut input = OpcodeResult::Start;
        loop {
            match machine.resume(input)? {
                Step::Yield(op) => input = self.execute(protocol, op).await?,
                Step::Finished(channels) => return Ok(channels),
            }
        }
    }

    async fn execute(&self, protocol: Protocol, op: Opcode) -> Result<OpcodeResult> {
        match op {
            Opcode::OpSign {
                commitment,
                key_index,
            } => Ok(OpcodeResult::Signature(
                self.signer
                    .sign_digest(commitment.hash_to_sign(), key_index)?,
            )),
            Opcode::IoSend(msg) => {
                let recipient = msg.to_xpub;
                self.messaging.send(&recipient, msg).await?;
                Ok(OpcodeResult::Done)
            }
            Opcode::IoSendAndWait(msg) => self.send_and_wait(protocol, msg).await,
            Opcode::PersistStateChannel(channels) => {
                self.store.save_state_channels(&channels).await?;
                Ok(OpcodeResult::Done)
            }
            Opcode::WriteCommitment {
                protocol,
                slot,
                transaction,
            } => {
                debug!("{}: writing {:?} commitment", protocol, slot);
                match slot {
                    CommitmentSlot::SetState(app) => {
                        self.store.save_set_state_commitment(&app, &transaction).await?
                    }
                    CommitmentSlot::ConditionalTransaction(app) => {
                        self.store
                            .save_conditional_transaction_commitment(&app, &transaction)
                            .await?
                    }
                    CommitmentSlot::Withdrawal(multisig) => {
                        self.store
                            .save_withdrawal_commitment(&multisig, &transaction)
                            .await?
                    }
                }
                Ok(OpcodeResult::Done)
            }
        }
    }

    async fn send_and_wait(&self, protocol: Protocol, msg: ProtocolMessage) -> Result<OpcodeResult> {
        let process_id = msg.process_id;
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(process_id, tx);

        let started = Instant::now();
        let recipient = msg.to_xpub;
        if let Err(e) = self.messaging.send(&recipient, msg).await {
            self.take_pending(&process_id);
            return Err(e);
        }

        match tokio::time::timeout(self.config.io_timeout, rx).await {
            Ok(Ok(reply)) => {
                debug!(
                    "{}: reply to {} arrived after {:?}",
                    protocol,
                    process_id,
                    started.elapsed()
                );
                Ok(OpcodeResult::Reply(reply))
            }
            Ok(Err(_)) => Err(Error::Messaging(format!(
                "waiter for {} was dropped",
                process_id
            ))),
            Err(_) => {
                self.take_pending(&process_id);
                Err(Error::Timeout {
                    protocol,
                    process_id,
                })
            }
        }
    }

    fn take_pending(&self, process_id: &ProcessId) -> Option<oneshot::Sender<ProtocolMessage>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(process_id)
    }

    async fn lock_channel(&self, multisig: Address) -> OwnedMutexGuard<()> {
        let lock = self.channel_lock(multisig);
        lock.lock_owned().await
    }

    fn channel_lock(&self, multisig: Address) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(multisig)
            .or_default()
            .clone()
    }

    /// Fill in or validate the block number of an uninstall whose app needs
    /// one. Other params pass through untouched.
    async fn resolve_block_number(
        &self,
        channels: &StateChannelsMap,
        params: ProtocolParams,
    ) -> Result<ProtocolParams> {
        let mut uninstall = match params {
            ProtocolParams::Uninstall(p) => p,
            other => return Ok(other),
        };

        let needs_block = match channels
            .get(&uninstall.multisig_address)
            .and_then(|c| c.get_app_instance(&uninstall.app_identity_hash).ok())
        {
            Some(app) => self.apps.get(&app.app_definition())?.requires_block_number(),
            // The flow reports the missing channel or app.
            None => false,
        };

        if needs_block {
            let oracle = self
                .oracle
                .as_ref()
                .ok_or(Error::NullOrMissingInput("chain reader"))?;
            uninstall.block_number = Some(oracle.resolve(uninstall.block_number).await?);
        }
        Ok(ProtocolParams::Uninstall(uninstall))
    }
}

/// A run is only between the two owners of its channel, with this participant
/// on the side `role` names. Setup has no channel yet and only checks the
/// sides.
fn check_participants(role: Role, ctx: &FlowContext) -> Result<()> {
    let params = &ctx.message.params;
    let multisig = params.multisig_address();
    let initiator = params.initiator_xpub();
    let responder = params.responder_xpub();
    let not_a_participant = |xpub| Error::NotAParticipant { multisig, xpub };

    let me = match role {
        Role::Initiator => initiator,
        Role::Responder => responder,
    };
    if me != ctx.me {
        return Err(not_a_participant(ctx.me));
    }
    if initiator == responder {
        return Err(not_a_participant(initiator));
    }
    if role == Role::Responder && ctx.message.from_xpub != initiator {
        return Err(not_a_participant(ctx.message.from_xpub));
    }
    if params.protocol() == Protocol::Setup {
        return Ok(());
    }

    let owners = ctx.channel(&multisig)?.user_identifiers();
    match [initiator, responder].into_iter().find(|x| !owners.contains(x)) {
        Some(outsider) => Err(not_a_participant(outsider)),
        None => Ok(()),
    }
}

/// Collects the collaborators of a [ProtocolRunner].
pub struct ProtocolRunnerBuilder {
    network: NetworkContext,
    config: EngineConfig,
    signer: Option<Arc<dyn IndexedSigner>>,
    store: Option<Arc<dyn Store>>,
    messaging: Option<Arc<dyn MessagingService>>,
    chain: Option<Arc<dyn ChainReader>>,
    apps: AppRegistry,
    flows: FlowRegistry,
}

impl ProtocolRunnerBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn signer(mut self, signer: Arc<dyn IndexedSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn messaging(mut self, messaging: Arc<dyn MessagingService>) -> Self {
        self.messaging = Some(messaging);
        self
    }

    /// Only needed for apps whose outcome depends on the block number.
    pub fn chain(mut self, chain: Arc<dyn ChainReader>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn apps(mut self, apps: AppRegistry) -> Self {
        self.apps = apps;
        self
    }

    pub fn flows(mut self, flows: FlowRegistry) -> Self {
        self.flows = flows;
        self
    }

    pub fn build(self) -> Result<ProtocolRunner> {
        let oracle = self
            .chain
            .map(|chain| BlockNumberOracle::new(chain, self.config.max_block_staleness));
        Ok(ProtocolRunner {
            network: Arc::new(self.network),
            signer: self.signer.ok_or(Error::NullOrMissingInput("signer"))?,
            store: self.store.ok_or(Error::NullOrMissingInput("store"))?,
            messaging: self
                .messaging
                .ok_or(Error::NullOrMissingInput("messaging service"))?,
            oracle,
            apps: Arc::new(self.apps),
            flows: self.flows,
            config: self.config,
            pending: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        })
    }
}
