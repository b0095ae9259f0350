//! End-to-end behaviour of an installed strategy, driven through the public service API.

use attacker_service::dispatcher::HookResponse;
use attacker_service::hook::HookName;
use attacker_service::strategy::{Command, Strategy};
use attacker_service::test_utils::{test_pubkey, TestContext, TestService};
use attacker_service::validator_set::Role;
use base64::{engine::general_purpose::STANDARD, Engine};
use ssz::Encode;
use std::time::{Duration, Instant};
use types::test_utils::{attestation_data, signed_attestation};
use types::{BeaconBlock, Epoch, Hash256, Slot};

fn service_with(strategy: &str) -> TestService {
    let service = TestContext::new().into_service();
    service
        .install_strategy(Strategy::from_json(strategy).unwrap())
        .unwrap();
    service
}

#[test]
fn return_at_slot_64_only() {
    let service = service_with(
        r#"{"slots": [{"slot": "64", "level": 1, "actions": {"BlockBeforeSign": "return"}}]}"#,
    );
    let pubkey = test_pubkey(1);

    let at_64 = service.dispatch(HookName::BlockBeforeSign, Slot::new(64), &pubkey, None);
    assert_eq!(at_64.cmd, Command::Return);

    let at_65 = service.dispatch(HookName::BlockBeforeSign, Slot::new(65), &pubkey, None);
    assert_eq!(at_65, HookResponse::null(String::new()));
}

#[test]
fn higher_level_wins() {
    let service = service_with(
        r#"{"slots": [
            {"slot": "10", "level": 5, "actions": {"AttestBeforeSign": "skip"}},
            {"slot": "10", "level": 9, "actions": {"AttestBeforeSign": "exit"}},
            {"slot": "10", "level": 1, "actions": {"AttestBeforeSign": "abort"}}
        ]}"#,
    );

    let response = service.dispatch(
        HookName::AttestBeforeSign,
        Slot::new(10),
        &test_pubkey(1),
        None,
    );

    assert_eq!(response.cmd, Command::Exit);
}

#[test]
fn null_action_round_trips_payloads_exactly() {
    let service = service_with(
        r#"{"slots": [{"slot": "40", "actions": {
            "AttestBeforeSign": "null",
            "AttestAfterSign": "null",
            "BlockBeforeSign": "null"
        }}]}"#,
    );
    let pubkey = test_pubkey(1);

    let data = attestation_data(40, 2, Hash256::repeat_byte(0x11));
    let attestation = signed_attestation(data.clone(), 16, 5);
    let mut block = BeaconBlock::empty();
    block.slot = Slot::new(40);
    block.body.attestations.push(attestation.clone()).unwrap();

    for (hook, encoded) in [
        (HookName::AttestBeforeSign, STANDARD.encode(data.as_ssz_bytes())),
        (HookName::AttestAfterSign, STANDARD.encode(attestation.as_ssz_bytes())),
        (HookName::BlockBeforeSign, STANDARD.encode(block.as_ssz_bytes())),
    ] {
        let response = service.dispatch(hook, Slot::new(40), &pubkey, Some(&encoded));
        assert_eq!(response, HookResponse::null(encoded), "{}", hook);
    }
}

#[test]
fn delay_with_second_blocks_the_call() {
    let service = service_with(
        r#"{"slots": [
            {"slot": "1", "actions": {"AttestBeforeSign": "delayWithSecond:0"}},
            {"slot": "2", "actions": {"AttestBeforeSign": "delayWithSecond:1"}}
        ]}"#,
    );
    let pubkey = test_pubkey(1);

    let start = Instant::now();
    service.dispatch(HookName::AttestBeforeSign, Slot::new(1), &pubkey, None);
    assert!(start.elapsed() < Duration::from_millis(500));

    let start = Instant::now();
    let response = service.dispatch(HookName::AttestBeforeSign, Slot::new(2), &pubkey, None);
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(response.cmd, Command::Null);
}

#[test]
fn role_window_100_to_200() {
    let service = service_with(
        r#"{"validator": [{"validator_index": 7, "attacker_start_slot": 100, "attacker_end_slot": 200}]}"#,
    );
    let validators = service.validators();

    assert_eq!(validators.role_of(Slot::new(99), 7), Role::Normal);
    assert_eq!(validators.role_of(Slot::new(100), 7), Role::Attacker);
    assert_eq!(validators.role_of(Slot::new(150), 7), Role::Attacker);
    assert_eq!(validators.role_of(Slot::new(200), 7), Role::Attacker);
    assert_eq!(validators.role_of(Slot::new(201), 7), Role::Normal);
    assert_eq!(validators.role_of(Slot::new(150), 8), Role::Normal);
}

#[test]
fn literal_strategy_completes_two_epochs_after_its_slot() {
    let service = service_with(r#"{"uid": "fifty", "slots": [{"slot": 50, "actions": {}}]}"#);
    let feedback = service.feedback();
    let mut events = feedback.subscribe();

    // Slot 50 is in epoch 1.
    assert!(feedback.poll(Epoch::new(2).start_slot(32)).is_empty());
    assert!(feedback.poll(Epoch::new(3).start_slot(32) - 1).is_empty());

    let ended = feedback.poll(Epoch::new(3).start_slot(32));
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].uid, "fifty");
    assert_eq!(ended[0].max_epoch, Epoch::new(1));
    assert_eq!(events.try_recv().unwrap(), ended[0]);
}

#[test]
fn computed_strategy_never_completes() {
    let service = service_with(
        r#"{"uid": "forever", "slots": [{"slot": "attackerSlot", "actions": {"BlockBeforeSign": "skip"}}]}"#,
    );
    let feedback = service.feedback();

    for epoch in 0..8u64 {
        assert!(feedback.poll(Epoch::new(epoch).start_slot(32)).is_empty());
    }
    assert!(feedback.completed("forever").is_none());
    assert_eq!(feedback.pending_count(), 1);
}

#[test]
fn pooled_attestations_are_packed_without_duplicates() {
    let service = service_with(
        r#"{"slots": [
            {"slot": "40", "actions": {"AttestAfterSign": "addAttestToPool"}},
            {"slot": "64", "actions": {"BlockBeforeSign": "packPooledAttest"}}
        ]}"#,
    );
    let data = attestation_data(40, 0, Hash256::repeat_byte(3));

    for position in [0, 1, 1, 2] {
        let attestation = signed_attestation(data.clone(), 8, position);
        service.dispatch(
            HookName::AttestAfterSign,
            Slot::new(40),
            &test_pubkey(position as u64),
            Some(&STANDARD.encode(attestation.as_ssz_bytes())),
        );
    }

    let mut block = BeaconBlock::empty();
    block.slot = Slot::new(64);
    let response = service.dispatch(
        HookName::BlockBeforeSign,
        Slot::new(64),
        &test_pubkey(9),
        Some(&STANDARD.encode(block.as_ssz_bytes())),
    );

    let bytes = STANDARD.decode(response.result).unwrap();
    let packed = <BeaconBlock as ssz::Decode>::from_ssz_bytes(&bytes).unwrap();
    assert_eq!(packed.body.attestations.len(), 1);
    assert_eq!(packed.body.attestations[0].num_set_bits(), 3);
    assert_eq!(service.validators().pool_len(), 0);
}
