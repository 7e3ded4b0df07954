//! Walkthrough of a channel's life between Alice and Bob, both running in this
//! process and talking over the loopback network.
//!
//! Run with `RUST_LOG=debug` to see every protocol step.

use std::sync::Arc;

use cfcore::{
    apps::{AppRegistry, SimpleTransferApp},
    chain::StaticChain,
    keys::{xkey_kth_address, Xprv},
    model::{get_create2_multisig_address, CoinTransfer, OutcomeType, StateChannelsMap},
    network::{EngineConfig, NetworkContext, ETH_TOKEN_ADDRESS},
    protocol::{
        InstallParams, ProposeParams, Protocol, ProtocolParams, SetupParams, TakeActionParams,
        UninstallParams, WithdrawParams,
    },
    store::{MemoryStore, Store},
    wire::{serve, LoopbackNetwork},
    Address, ProtocolRunner, Result, U256,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const PARTICIPANTS: [&str; 2] = ["Alice", "Bob"];
const TRANSFER_APP: Address = Address([0xaa; 20]);
const DEPOSIT: u64 = 100;

fn runner(
    network: &NetworkContext,
    net: &LoopbackNetwork,
    xprv: &Xprv,
) -> Result<(Arc<ProtocolRunner>, Arc<MemoryStore>)> {
    let (messaging, inbox) = net.connect(xprv.neuter());
    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(
        ProtocolRunner::builder(network.clone())
            .config(EngineConfig::default())
            .signer(Arc::new(xprv.clone()))
            .store(store.clone())
            .messaging(Arc::new(messaging))
            .chain(Arc::new(StaticChain::new(1)))
            .apps(
                AppRegistry::builder()
                    .register(TRANSFER_APP, SimpleTransferApp)?
                    .build(),
            )
            .build()?,
    );
    serve(runner.clone(), inbox);
    Ok((runner, store))
}

async fn print_balances(store: &MemoryStore, multisig: Address, owners: [Address; 2]) -> Result<()> {
    if let Some(channel) = store.get_state_channel(&multisig).await? {
        let fb = channel.get_free_balance_class()?;
        for (name, owner) in PARTICIPANTS.iter().zip(owners) {
            println!(
                "  {:<5} free balance: {}",
                name,
                fb.get_balance(&ETH_TOKEN_ADDRESS, &owner)
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut rng = StdRng::seed_from_u64(0);
    let network: NetworkContext = rng.gen();
    let net = LoopbackNetwork::new();
    let keys = [Xprv::random(&mut rng), Xprv::random(&mut rng)];
    let xpubs = [keys[0].neuter(), keys[1].neuter()];
    let owners = [
        xkey_kth_address(&xpubs[0], 0)?,
        xkey_kth_address(&xpubs[1], 0)?,
    ];
    let multisig = get_create2_multisig_address(&xpubs, &network)?;

    let (alice, alice_store) = runner(&network, &net, &keys[0])?;
    let (_bob, bob_store) = runner(&network, &net, &keys[1])?;

    println!("Setup of channel {}", multisig);
    alice
        .initiate_protocol(
            Protocol::Setup,
            StateChannelsMap::new(),
            ProtocolParams::Setup(SetupParams {
                initiator_xpub: xpubs[0],
                responder_xpub: xpubs[1],
                multisig_address: multisig,
            }),
        )
        .await?;

    // Stand-in for both sides observing the funding transactions on chain.
    let mut increments = cfcore::model::TokenIndexedCoinTransferMap::new();
    let credits = increments.entry(ETH_TOKEN_ADDRESS).or_default();
    for owner in owners {
        credits.insert(owner, DEPOSIT.into());
    }
    for store in [&alice_store, &bob_store] {
        if let Some(channel) = store.get_state_channel(&multisig).await? {
            store
                .save_state_channel(&channel.increment_free_balance(&increments)?)
                .await?;
        }
    }
    println!("Both deposited {}", DEPOSIT);
    print_balances(&alice_store, multisig, owners).await?;

    let channels = alice
        .initiate_protocol(
            Protocol::Propose,
            StateChannelsMap::new(),
            ProtocolParams::Propose(ProposeParams {
                initiator_xpub: xpubs[0],
                responder_xpub: xpubs[1],
                multisig_address: multisig,
                app_definition: TRANSFER_APP,
                initial_state: Some(SimpleTransferApp::state([
                    CoinTransfer {
                        to: owners[0],
                        amount: 40u64.into(),
                    },
                    CoinTransfer {
                        to: owners[1],
                        amount: 10u64.into(),
                    },
                ])),
                initiator_deposit: 40u64.into(),
                initiator_deposit_token_address: None,
                responder_deposit: 10u64.into(),
                responder_deposit_token_address: None,
                default_timeout: 100,
                timeout: 100,
                outcome_type: OutcomeType::SingleAssetTwoPartyCoinTransfer,
            }),
        )
        .await?;
    let app = match channels.get(&multisig) {
        Some(channel) => channel.most_recently_proposed_app_instance()?.identity_hash,
        None => return Ok(()),
    };
    println!("Proposed transfer app {}", app);

    alice
        .initiate_protocol(
            Protocol::Install,
            StateChannelsMap::new(),
            ProtocolParams::Install(InstallParams {
                initiator_xpub: xpubs[0],
                responder_xpub: xpubs[1],
                multisig_address: multisig,
                proposal_id: app,
            }),
        )
        .await?;
    println!("Installed, 40 + 10 locked in the app");
    print_balances(&bob_store, multisig, owners).await?;

    for amount in [5u64, 15] {
        alice
            .initiate_protocol(
                Protocol::TakeAction,
                StateChannelsMap::new(),
                ProtocolParams::TakeAction(TakeActionParams {
                    initiator_xpub: xpubs[0],
                    responder_xpub: xpubs[1],
                    multisig_address: multisig,
                    app_identity_hash: app,
                    action: SimpleTransferApp::action(amount.into()),
                }),
            )
            .await?;
        println!("Alice paid Bob {} inside the app", amount);
    }

    alice
        .initiate_protocol(
            Protocol::Uninstall,
            StateChannelsMap::new(),
            ProtocolParams::Uninstall(UninstallParams {
                initiator_xpub: xpubs[0],
                responder_xpub: xpubs[1],
                multisig_address: multisig,
                app_identity_hash: app,
                block_number: None,
            }),
        )
        .await?;
    println!("Uninstalled, outcome paid back into the free balance");
    print_balances(&bob_store, multisig, owners).await?;

    let recipient: Address = rng.gen();
    alice
        .initiate_protocol(
            Protocol::Withdraw,
            StateChannelsMap::new(),
            ProtocolParams::Withdraw(WithdrawParams {
                initiator_xpub: xpubs[0],
                responder_xpub: xpubs[1],
                multisig_address: multisig,
                recipient,
                amount: U256::from(50),
                token_address: ETH_TOKEN_ADDRESS,
            }),
        )
        .await?;
    if let Some(tx) = alice_store.get_withdrawal_commitment(&multisig).await? {
        println!(
            "Alice withdrew 50 to {}, {} byte transaction to {} ready for submission",
            recipient,
            tx.data.len(),
            tx.to
        );
    }
    print_balances(&alice_store, multisig, owners).await?;

    Ok(())
}
