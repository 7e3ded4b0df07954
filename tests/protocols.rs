mod common;

use std::{sync::Arc, time::Duration};

use cfcore::{
    abiencode::selector,
    apps::SimpleTransferApp,
    model::StateChannelsMap,
    network::ETH_TOKEN_ADDRESS,
    protocol::{Protocol, ProtocolMessage, ProtocolParams, SetupParams, TakeActionParams},
    store::Store,
    Address, Error, Hash, U256,
};
use common::{off_by_one_signer, pair, pair_with, Options, BLOCK_GATED_APP, TRANSFER_APP};

#[tokio::test]
async fn setup_creates_the_same_channel_on_both_sides() {
    let pair = pair(1);
    let channels = pair.setup().await.unwrap();

    let alice = pair.alice.channel(pair.multisig).await.unwrap();
    let bob = pair.bob.channel(pair.multisig).await.unwrap();
    assert_eq!(channels.get(&pair.multisig), Some(&alice));
    assert_eq!(alice, bob);
    assert_eq!(alice.free_balance().app_seq_no(), 0);
    assert_eq!(alice.num_proposed_apps(), 1);
    assert_eq!(pair.free_balances(&pair.alice).await, (0, 0));

    let fb = alice.free_balance().identity_hash();
    let commitment = pair
        .alice
        .store
        .get_conditional_transaction_commitment(&fb)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(commitment.to, pair.multisig);
    assert_eq!(
        pair.bob
            .store
            .get_conditional_transaction_commitment(&fb)
            .await
            .unwrap(),
        Some(commitment)
    );
}

#[tokio::test]
async fn second_setup_is_rejected() {
    let pair = pair(2);
    pair.setup().await.unwrap();

    let err = pair.setup().await.unwrap_err();
    assert!(matches!(err, Error::ChannelAlreadyExists(m) if m == pair.multisig));
}

#[tokio::test]
async fn initiating_on_behalf_of_someone_else_fails() {
    let pair = pair(3);
    let err = pair
        .bob
        .runner
        .initiate_protocol(
            Protocol::TakeAction,
            StateChannelsMap::new(),
            pair.take_action_params(Hash([0; 32]), 1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedMessage(_)));
}

#[tokio::test]
async fn underfunded_proposal_fails_before_contacting_the_peer() {
    let pair = pair(4);
    pair.setup().await.unwrap();
    pair.deposit(&pair.alice, 10).await;
    let sent = pair.alice.messages_sent();

    let err = pair.propose(11, 0).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientFunds { address, available, requested, .. }
            if address == pair.alice.address()
                && available == U256::from(10)
                && requested == U256::from(11)
    ));
    assert_eq!(pair.alice.messages_sent(), sent);
    assert!(pair
        .alice
        .channel(pair.multisig)
        .await
        .unwrap()
        .proposed_app_instances()
        .is_empty());
}

#[tokio::test]
async fn proposal_for_unknown_app_is_rejected() {
    let pair = pair(5);
    pair.setup().await.unwrap();

    let unknown = Address([0xcc; 20]);
    let err = pair
        .propose_with(pair.propose_params(unknown, 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAppDefinition(a) if a == unknown));
}

#[tokio::test]
async fn install_locks_deposits() {
    let pair = pair(6);
    pair.setup().await.unwrap();
    pair.deposit(&pair.alice, 100).await;
    pair.deposit(&pair.bob, 100).await;

    let id = pair.propose(30, 20).await.unwrap();
    let proposed = pair.bob.channel(pair.multisig).await.unwrap();
    assert!(proposed.get_proposal(&id).is_ok());

    pair.install(id).await.unwrap();
    for party in [&pair.alice, &pair.bob] {
        let channel = party.channel(pair.multisig).await.unwrap();
        assert!(channel.proposed_app_instances().is_empty());
        let app = channel.get_app_instance(&id).unwrap();
        assert_eq!(app.version_number(), 0);
        assert!(channel.get_free_balance_class().unwrap().has_active_app(&id));
        assert_eq!(channel.locked_in_apps(&ETH_TOKEN_ADDRESS), U256::from(50));
        assert!(party
            .store
            .get_conditional_transaction_commitment(&id)
            .await
            .unwrap()
            .is_some());
    }
    assert_eq!(pair.free_balances(&pair.alice).await, (70, 80));
    assert_eq!(pair.free_balances(&pair.bob).await, (70, 80));
}

#[tokio::test]
async fn proposal_can_only_be_installed_once() {
    let pair = pair(7);
    let id = pair.installed_app(TRANSFER_APP, 10, 10).await;

    let err = pair.install(id).await.unwrap_err();
    assert!(matches!(err, Error::ProposalNotFound(h) if h == id));
}

#[tokio::test]
async fn take_action_advances_the_version_by_one() {
    let pair = pair(8);
    let id = pair.installed_app(TRANSFER_APP, 50, 50).await;

    pair.take_action(id, 10).await.unwrap();
    for party in [&pair.alice, &pair.bob] {
        let channel = party.channel(pair.multisig).await.unwrap();
        let app = channel.get_app_instance(&id).unwrap();
        assert_eq!(app.version_number(), 1);
        assert!(app.latest_action().is_some());
        let [from, to] = SimpleTransferApp::transfers(app.latest_state()).unwrap();
        assert_eq!(from.amount, U256::from(40));
        assert_eq!(to.amount, U256::from(60));
        assert!(party
            .store
            .get_set_state_commitment(&id)
            .await
            .unwrap()
            .is_some());
    }
}

#[tokio::test]
async fn failing_action_leaves_state_untouched() {
    let pair = pair(9);
    let id = pair.installed_app(TRANSFER_APP, 5, 5).await;
    let before = pair.alice.channel(pair.multisig).await.unwrap();

    let err = pair.take_action(id, 6).await.unwrap_err();
    assert!(matches!(err, Error::App(_)));
    assert_eq!(pair.alice.channel(pair.multisig).await.unwrap(), before);
}

#[tokio::test]
async fn uninstall_pays_out_the_final_state() {
    let pair = pair(10);
    let id = pair.installed_app(TRANSFER_APP, 50, 50).await;
    pair.deposit(&pair.alice, 50).await;
    pair.deposit(&pair.bob, 50).await;
    pair.take_action(id, 10).await.unwrap();

    pair.uninstall(id, None).await.unwrap();
    for party in [&pair.alice, &pair.bob] {
        let channel = party.channel(pair.multisig).await.unwrap();
        assert!(matches!(
            channel.get_app_instance(&id),
            Err(Error::AppNotFound(_))
        ));
        assert!(!channel.get_free_balance_class().unwrap().has_active_app(&id));
        assert_eq!(channel.locked_in_apps(&ETH_TOKEN_ADDRESS), U256::zero());
        assert_eq!(
            channel
                .get_free_balance_class()
                .unwrap()
                .total(&ETH_TOKEN_ADDRESS),
            U256::from(200)
        );
    }
    assert_eq!(pair.free_balances(&pair.alice).await, (90, 110));
    assert_eq!(pair.free_balances(&pair.bob).await, (90, 110));
}

#[tokio::test]
async fn uninstall_rejects_a_stale_block_number() {
    let pair = pair(11);
    let id = pair.installed_app(BLOCK_GATED_APP, 10, 10).await;

    let err = pair.uninstall(id, Some(800)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::StaleBlockNumber {
            provided: 800,
            latest: 1000,
            tolerance: 100
        }
    ));
    assert!(pair
        .alice
        .channel(pair.multisig)
        .await
        .unwrap()
        .get_app_instance(&id)
        .is_ok());

    pair.uninstall(id, Some(950)).await.unwrap();
    assert_eq!(pair.free_balances(&pair.bob).await, (10, 10));
}

#[tokio::test]
async fn uninstall_falls_back_to_the_chain_head() {
    let pair = pair(12);
    let id = pair.installed_app(BLOCK_GATED_APP, 10, 10).await;

    pair.uninstall(id, None).await.unwrap();
    assert_eq!(pair.free_balances(&pair.alice).await, (10, 10));
}

#[tokio::test]
async fn silent_peer_times_out_without_persisting() {
    let pair = pair_with(
        13,
        Options {
            io_timeout: Duration::from_millis(200),
            ..Options::default()
        },
    );
    let id = pair.installed_app(TRANSFER_APP, 10, 10).await;
    let before = pair.alice.channel(pair.multisig).await.unwrap();
    let _inbox = pair.silence_bob();

    let err = pair.take_action(id, 1).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { protocol: Protocol::TakeAction, .. }));
    assert_eq!(pair.alice.channel(pair.multisig).await.unwrap(), before);
}

#[tokio::test]
async fn wrong_counterparty_signature_aborts_the_initiator() {
    let pair = pair_with(
        14,
        Options {
            bob_signer: off_by_one_signer,
            ..Options::default()
        },
    );

    let err = pair.setup().await.unwrap_err();
    assert!(matches!(err, Error::InvalidSignature { .. }));
    assert_eq!(pair.alice.channel(pair.multisig).await, None);
}

#[tokio::test]
async fn concurrent_actions_on_one_channel_are_serialized() {
    let pair = pair(15);
    let id = pair.installed_app(TRANSFER_APP, 100, 0).await;

    let runs: Vec<_> = (0..5)
        .map(|_| {
            let runner = Arc::clone(&pair.alice.runner);
            let params = pair.take_action_params(id, 1);
            tokio::spawn(async move {
                runner
                    .initiate_protocol(Protocol::TakeAction, StateChannelsMap::new(), params)
                    .await
            })
        })
        .collect();
    for run in runs {
        run.await.unwrap().unwrap();
    }

    for party in [&pair.alice, &pair.bob] {
        let channel = party.channel(pair.multisig).await.unwrap();
        let app = channel.get_app_instance(&id).unwrap();
        assert_eq!(app.version_number(), 5);
        let [from, to] = SimpleTransferApp::transfers(app.latest_state()).unwrap();
        assert_eq!((from.amount, to.amount), (U256::from(95), U256::from(5)));
    }
}

#[tokio::test]
async fn withdraw_debits_the_free_balance() {
    let pair = pair(16);
    pair.setup().await.unwrap();
    pair.deposit(&pair.alice, 100).await;
    let recipient = Address([0x42; 20]);

    pair.withdraw(recipient, 30).await.unwrap();
    assert_eq!(pair.free_balances(&pair.alice).await, (70, 0));
    assert_eq!(pair.free_balances(&pair.bob).await, (70, 0));

    let tx = pair
        .bob
        .store
        .get_withdrawal_commitment(&pair.multisig)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.to, pair.multisig);
    assert_eq!(
        tx.data[..4],
        selector("execTransaction(address,uint256,bytes,uint8,bytes[])")
    );
}

#[tokio::test]
async fn withdraw_beyond_the_balance_fails() {
    let pair = pair(17);
    pair.setup().await.unwrap();
    pair.deposit(&pair.alice, 10).await;

    let err = pair.withdraw(Address([0x42; 20]), 11).await.unwrap_err();
    assert!(matches!(err, Error::InsufficientFunds { .. }));
    assert_eq!(pair.free_balances(&pair.alice).await, (10, 0));
    assert!(pair
        .alice
        .store
        .get_withdrawal_commitment(&pair.multisig)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn outsider_cannot_act_on_a_channel() {
    let pair = pair(18);
    let id = pair.installed_app(TRANSFER_APP, 50, 50).await;
    let eve = pair.outsider(99);
    let public_copy = pair.bob.channel(pair.multisig).await.unwrap();
    eve.store.save_state_channel(&public_copy).await.unwrap();

    let params = ProtocolParams::TakeAction(TakeActionParams {
        initiator_xpub: eve.xpub,
        responder_xpub: pair.bob.xpub,
        multisig_address: pair.multisig,
        app_identity_hash: id,
        action: SimpleTransferApp::action(50u64.into()),
    });

    let err = eve
        .runner
        .initiate_protocol(Protocol::TakeAction, StateChannelsMap::new(), params.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAParticipant { xpub, .. } if xpub == eve.xpub));
    assert_eq!(eve.messages_sent(), 0);

    // Straight to Bob, bypassing Eve's own checks.
    let msg = ProtocolMessage::initiate(rand::random(), params);
    let err = pair.bob.runner.handle_received_message(msg).await.unwrap_err();
    assert!(matches!(
        err,
        Error::NotAParticipant { multisig, xpub } if multisig == pair.multisig && xpub == eve.xpub
    ));

    let channel = pair.bob.channel(pair.multisig).await.unwrap();
    let app = channel.get_app_instance(&id).unwrap();
    assert_eq!(app.version_number(), 0);
    let [from, to] = SimpleTransferApp::transfers(app.latest_state()).unwrap();
    assert_eq!((from.amount, to.amount), (U256::from(50), U256::from(50)));
}

#[tokio::test]
async fn responder_rejects_a_sender_posing_as_the_initiator() {
    let pair = pair(19);
    let id = pair.installed_app(TRANSFER_APP, 50, 50).await;
    let eve = pair.outsider(98);

    let mut msg = ProtocolMessage::initiate(rand::random(), pair.take_action_params(id, 50));
    msg.from_xpub = eve.xpub;
    let err = pair.bob.runner.handle_received_message(msg).await.unwrap_err();
    assert!(matches!(err, Error::NotAParticipant { xpub, .. } if xpub == eve.xpub));

    let channel = pair.bob.channel(pair.multisig).await.unwrap();
    assert_eq!(channel.get_app_instance(&id).unwrap().version_number(), 0);
}

#[tokio::test]
async fn setup_requires_the_derived_multisig() {
    let pair = pair(20);
    let bogus = Address([0x42; 20]);
    let params = ProtocolParams::Setup(SetupParams {
        initiator_xpub: pair.alice.xpub,
        responder_xpub: pair.bob.xpub,
        multisig_address: bogus,
    });

    let err = pair
        .alice
        .runner
        .initiate_protocol(Protocol::Setup, StateChannelsMap::new(), params.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MultisigMismatch { expected, got } if expected == pair.multisig && got == bogus
    ));
    assert_eq!(pair.alice.messages_sent(), 0);

    let msg = ProtocolMessage::initiate(rand::random(), params);
    let err = pair.bob.runner.handle_received_message(msg).await.unwrap_err();
    assert!(matches!(err, Error::MultisigMismatch { .. }));
    assert_eq!(pair.bob.channel(bogus).await, None);
    assert_eq!(pair.alice.channel(bogus).await, None);
}
