//! Two participants, Alice and Bob, each with their own runner and store,
//! talking over the loopback network. Alice always initiates.

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use cfcore::{
    abiencode::Token,
    apps::{AppLogic, AppRegistry, SimpleTransferApp},
    chain::StaticChain,
    keys::{xkey_kth_address, IndexedSigner, Xprv, Xpub},
    model::{
        get_create2_multisig_address, AppOutcome, CoinTransfer, OutcomeType, StateChannel,
        StateChannelsMap, TokenIndexedCoinTransferMap,
    },
    network::{EngineConfig, NetworkContext, ETH_TOKEN_ADDRESS},
    protocol::{
        InstallParams, ProposeParams, Protocol, ProtocolMessage, ProtocolParams, SetupParams,
        TakeActionParams, UninstallParams, WithdrawParams,
    },
    store::{MemoryStore, Store},
    wire::{serve, Inbox, LoopbackBus, LoopbackNetwork, MessagingService, ProtoBufEncodingLayer},
    Address, Error, Hash, ProtocolRunner, Result, Signature,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub const TRANSFER_APP: Address = Address([0xaa; 20]);
pub const BLOCK_GATED_APP: Address = Address([0xbb; 20]);
pub const CHAIN_HEAD: u64 = 1_000;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Simple transfer whose outcome may only be computed at a known block.
#[derive(Debug)]
pub struct BlockGatedTransfer;

impl AppLogic for BlockGatedTransfer {
    fn apply_action(&self, state: &Token, action: &Token) -> Result<Token> {
        SimpleTransferApp.apply_action(state, action)
    }

    fn compute_outcome(&self, state: &Token, block_number: Option<u64>) -> Result<AppOutcome> {
        block_number.ok_or_else(|| Error::App("block number required".into()))?;
        SimpleTransferApp.compute_outcome(state, None)
    }

    fn requires_block_number(&self) -> bool {
        true
    }
}

pub fn apps() -> AppRegistry {
    AppRegistry::builder()
        .register(TRANSFER_APP, SimpleTransferApp)
        .unwrap()
        .register(BLOCK_GATED_APP, BlockGatedTransfer)
        .unwrap()
        .build()
}

/// Signs everything with the key one index past the requested one.
#[derive(Debug)]
pub struct OffByOneSigner(pub Xprv);

impl IndexedSigner for OffByOneSigner {
    fn public_identifier(&self) -> Xpub {
        self.0.neuter()
    }

    fn sign_digest(&self, hash: Hash, key_index: u32) -> Result<Signature> {
        self.0.sign_digest(hash, key_index + 1)
    }
}

#[derive(Debug)]
pub struct CountingMessaging {
    inner: ProtoBufEncodingLayer<LoopbackBus>,
    sent: AtomicUsize,
}

#[async_trait]
impl MessagingService for CountingMessaging {
    async fn send(&self, recipient: &Xpub, msg: ProtocolMessage) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.inner.send(recipient, msg).await
    }
}

pub struct Party {
    pub xprv: Xprv,
    pub xpub: Xpub,
    pub runner: Arc<ProtocolRunner>,
    pub store: Arc<MemoryStore>,
    pub chain: Arc<StaticChain>,
    messaging: Arc<CountingMessaging>,
}

impl Party {
    fn new(
        network: &NetworkContext,
        net: &LoopbackNetwork,
        config: &EngineConfig,
        xprv: Xprv,
        signer: Arc<dyn IndexedSigner>,
    ) -> Self {
        let xpub = xprv.neuter();
        let (layer, inbox) = net.connect(xpub);
        let messaging = Arc::new(CountingMessaging {
            inner: layer,
            sent: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryStore::new());
        let chain = Arc::new(StaticChain::new(CHAIN_HEAD));
        let runner = Arc::new(
            ProtocolRunner::builder(network.clone())
                .config(config.clone())
                .signer(signer)
                .store(store.clone())
                .messaging(messaging.clone())
                .chain(chain.clone())
                .apps(apps())
                .build()
                .unwrap(),
        );
        serve(runner.clone(), inbox);

        Self {
            xprv,
            xpub,
            runner,
            store,
            chain,
            messaging,
        }
    }

    pub fn messages_sent(&self) -> usize {
        self.messaging.sent.load(Ordering::SeqCst)
    }

    /// Free balance address.
    pub fn address(&self) -> Address {
        xkey_kth_address(&self.xpub, 0).unwrap()
    }

    pub async fn channel(&self, multisig: Address) -> Option<StateChannel> {
        self.store.get_state_channel(&multisig).await.unwrap()
    }
}

pub struct Options {
    pub io_timeout: Duration,
    pub bob_signer: fn(Xprv) -> Arc<dyn IndexedSigner>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(5),
            bob_signer: honest_signer,
        }
    }
}

pub fn honest_signer(xprv: Xprv) -> Arc<dyn IndexedSigner> {
    Arc::new(xprv)
}

pub fn off_by_one_signer(xprv: Xprv) -> Arc<dyn IndexedSigner> {
    Arc::new(OffByOneSigner(xprv))
}

pub struct Pair {
    pub network: NetworkContext,
    pub net: LoopbackNetwork,
    pub alice: Party,
    pub bob: Party,
    pub multisig: Address,
}

pub fn pair(seed: u64) -> Pair {
    pair_with(seed, Options::default())
}

pub fn pair_with(seed: u64, options: Options) -> Pair {
    init_logging();
    let mut rng = StdRng::seed_from_u64(seed);
    let network: NetworkContext = rng.gen();
    let net = LoopbackNetwork::new();
    let config = EngineConfig {
        io_timeout: options.io_timeout,
        ..EngineConfig::default()
    };

    let a = Xprv::random(&mut rng);
    let b = Xprv::random(&mut rng);
    let multisig = get_create2_multisig_address(&[a.neuter(), b.neuter()], &network).unwrap();

    let alice = Party::new(&network, &net, &config, a.clone(), Arc::new(a));
    let bob = Party::new(
        &network,
        &net,
        &config,
        b.clone(),
        (options.bob_signer)(b),
    );

    Pair {
        network,
        net,
        alice,
        bob,
        multisig,
    }
}

impl Pair {
    /// A third participant on the same network, owning no channel.
    pub fn outsider(&self, seed: u64) -> Party {
        let xprv = Xprv::random(&mut StdRng::seed_from_u64(seed));
        Party::new(
            &self.network,
            &self.net,
            &EngineConfig::default(),
            xprv.clone(),
            Arc::new(xprv),
        )
    }

    pub async fn setup(&self) -> Result<StateChannelsMap> {
        let params = ProtocolParams::Setup(SetupParams {
            initiator_xpub: self.alice.xpub,
            responder_xpub: self.bob.xpub,
            multisig_address: self.multisig,
        });
        self.alice
            .runner
            .initiate_protocol(Protocol::Setup, StateChannelsMap::new(), params)
            .await
    }

    /// Credit `amount` wei to `to` in both stores, as if both had seen the
    /// deposit land on chain.
    pub async fn deposit(&self, to: &Party, amount: u64) {
        let mut increments = TokenIndexedCoinTransferMap::new();
        increments
            .entry(ETH_TOKEN_ADDRESS)
            .or_default()
            .insert(to.address(), amount.into());
        for party in [&self.alice, &self.bob] {
            let channel = party
                .channel(self.multisig)
                .await
                .unwrap()
                .increment_free_balance(&increments)
                .unwrap();
            party.store.save_state_channel(&channel).await.unwrap();
        }
    }

    pub fn propose_params(
        &self,
        app_definition: Address,
        initiator_deposit: u64,
        responder_deposit: u64,
    ) -> ProposeParams {
        ProposeParams {
            initiator_xpub: self.alice.xpub,
            responder_xpub: self.bob.xpub,
            multisig_address: self.multisig,
            app_definition,
            initial_state: Some(SimpleTransferApp::state([
                CoinTransfer {
                    to: self.alice.address(),
                    amount: initiator_deposit.into(),
                },
                CoinTransfer {
                    to: self.bob.address(),
                    amount: responder_deposit.into(),
                },
            ])),
            initiator_deposit: initiator_deposit.into(),
            initiator_deposit_token_address: None,
            responder_deposit: responder_deposit.into(),
            responder_deposit_token_address: None,
            default_timeout: 100,
            timeout: 100,
            outcome_type: OutcomeType::SingleAssetTwoPartyCoinTransfer,
        }
    }

    pub async fn propose_with(&self, params: ProposeParams) -> Result<Hash> {
        let channels = self
            .alice
            .runner
            .initiate_protocol(
                Protocol::Propose,
                StateChannelsMap::new(),
                ProtocolParams::Propose(params),
            )
            .await?;
        let channel = channels
            .get(&self.multisig)
            .ok_or(Error::ChannelNotFound(self.multisig))?;
        Ok(channel.most_recently_proposed_app_instance()?.identity_hash)
    }

    pub async fn propose(&self, initiator_deposit: u64, responder_deposit: u64) -> Result<Hash> {
        self.propose_with(self.propose_params(TRANSFER_APP, initiator_deposit, responder_deposit))
            .await
    }

    pub async fn install(&self, proposal_id: Hash) -> Result<StateChannelsMap> {
        let params = ProtocolParams::Install(InstallParams {
            initiator_xpub: self.alice.xpub,
            responder_xpub: self.bob.xpub,
            multisig_address: self.multisig,
            proposal_id,
        });
        self.alice
            .runner
            .initiate_protocol(Protocol::Install, StateChannelsMap::new(), params)
            .await
    }

    /// Set up, fund and install a transfer app with the given deposits.
    pub async fn installed_app(
        &self,
        app_definition: Address,
        initiator_deposit: u64,
        responder_deposit: u64,
    ) -> Hash {
        self.setup().await.unwrap();
        self.deposit(&self.alice, initiator_deposit).await;
        self.deposit(&self.bob, responder_deposit).await;
        let id = self
            .propose_with(self.propose_params(
                app_definition,
                initiator_deposit,
                responder_deposit,
            ))
            .await
            .unwrap();
        self.install(id).await.unwrap();
        id
    }

    pub fn take_action_params(&self, app: Hash, amount: u64) -> ProtocolParams {
        ProtocolParams::TakeAction(TakeActionParams {
            initiator_xpub: self.alice.xpub,
            responder_xpub: self.bob.xpub,
            multisig_address: self.multisig,
            app_identity_hash: app,
            action: SimpleTransferApp::action(amount.into()),
        })
    }

    pub async fn take_action(&self, app: Hash, amount: u64) -> Result<StateChannelsMap> {
        self.alice
            .runner
            .initiate_protocol(
                Protocol::TakeAction,
                StateChannelsMap::new(),
                self.take_action_params(app, amount),
            )
            .await
    }

    pub async fn uninstall(&self, app: Hash, block_number: Option<u64>) -> Result<StateChannelsMap> {
        let params = ProtocolParams::Uninstall(UninstallParams {
            initiator_xpub: self.alice.xpub,
            responder_xpub: self.bob.xpub,
            multisig_address: self.multisig,
            app_identity_hash: app,
            block_number,
        });
        self.alice
            .runner
            .initiate_protocol(Protocol::Uninstall, StateChannelsMap::new(), params)
            .await
    }

    pub async fn withdraw(&self, recipient: Address, amount: u64) -> Result<StateChannelsMap> {
        let params = ProtocolParams::Withdraw(WithdrawParams {
            initiator_xpub: self.alice.xpub,
            responder_xpub: self.bob.xpub,
            multisig_address: self.multisig,
            recipient,
            amount: amount.into(),
            token_address: ETH_TOKEN_ADDRESS,
        });
        self.alice
            .runner
            .initiate_protocol(Protocol::Withdraw, StateChannelsMap::new(), params)
            .await
    }

    /// Reroute Bob's traffic into an inbox nobody reads.
    pub fn silence_bob(&self) -> Inbox {
        self.net.connect(self.bob.xpub).1
    }

    pub async fn free_balances(&self, party: &Party) -> (u64, u64) {
        let fb = party
            .channel(self.multisig)
            .await
            .unwrap()
            .get_free_balance_class()
            .unwrap();
        (
            fb.get_balance(&ETH_TOKEN_ADDRESS, &self.alice.address()).as_u64(),
            fb.get_balance(&ETH_TOKEN_ADDRESS, &self.bob.address()).as_u64(),
        )
    }
}
