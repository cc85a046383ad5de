//! Tests for the gateway state machine.
//!
//! Covers the source side (lock_and_call debits through the allowance path
//! and emits to the outbound log) and the destination side (approve is the
//! single replay gate, execute transitions a message out of Approved
//! exactly once, and a failed execution keeps the funds in gateway
//! custody).

mod helpers;

use std::collections::HashMap;

use helpers::{addr, swap_to_natives_payload, CHAIN_1, CHAIN_2, DEPOSIT, EXECUTABLE_1, RELAYER_ADDR};
use swap_gmp::chain::executable::SwapExecutable;
use swap_gmp::chain::gateway::{Gateway, GatewayError};
use swap_gmp::chain::pool::PoolFactory;
use swap_gmp::chain::token::{TokenError, TokenLedger};
use swap_gmp::types::{Address, Message, MessageId, MessageStatus, TokenTransfer};

const GATEWAY: &str = "0x01";
const USER: &str = "0x02";
const EXECUTABLE: &str = "0x03";
const OWNER: &str = "0x04";
const UST: &str = "0x05";

/// A source-side gateway with a funded user.
fn source_setup() -> (Gateway, TokenLedger) {
    let mut ledger = TokenLedger::new();
    ledger.register("UST", addr(UST)).unwrap();
    ledger.mint("UST", addr(USER), 1_000_000).unwrap();
    let gateway = Gateway::new(CHAIN_1, addr(GATEWAY), addr(RELAYER_ADDR));
    (gateway, ledger)
}

/// A destination-side gateway with an executable trusting `EXECUTABLE_1`
/// as the chain1 sibling.
fn destination_setup() -> (Gateway, TokenLedger, HashMap<Address, PoolFactory>, SwapExecutable) {
    let mut ledger = TokenLedger::new();
    ledger.register("UST", addr(UST)).unwrap();
    let gateway = Gateway::new(CHAIN_2, addr(GATEWAY), addr(RELAYER_ADDR));
    let mut executable = SwapExecutable::new(addr(EXECUTABLE), addr(OWNER));
    executable
        .add_sibling(addr(OWNER), CHAIN_1, addr(EXECUTABLE_1))
        .unwrap();
    (gateway, ledger, HashMap::new(), executable)
}

/// An inbound message from the trusted chain1 sibling. The payload is
/// intentionally malformed so execution terminates in Failed without
/// needing pools.
fn inbound_message(nonce: u64, amount: u128) -> Message {
    Message {
        id: MessageId::derive(CHAIN_1, nonce),
        source_chain: CHAIN_1.to_string(),
        destination_chain: CHAIN_2.to_string(),
        sender: addr(EXECUTABLE_1),
        destination_address: addr(EXECUTABLE),
        payload: vec![0xde, 0xad],
        token: Some(TokenTransfer { symbol: "UST".to_string(), amount }),
    }
}

// ============================================================================
// LOCK AND CALL TESTS
// ============================================================================

/// Test the happy deposit path: allowance consumed, custody credited, and
/// the message in the outbound log.
#[test]
fn test_lock_and_call_locks_and_emits() {
    let (mut gateway, mut ledger) = source_setup();
    ledger.approve("UST", addr(USER), addr(GATEWAY), DEPOSIT).unwrap();

    let id = gateway
        .lock_and_call(
            &mut ledger,
            addr(USER),
            CHAIN_2,
            addr(EXECUTABLE),
            vec![1, 2, 3],
            Some(TokenTransfer { symbol: "UST".to_string(), amount: DEPOSIT }),
        )
        .unwrap();

    assert_eq!(ledger.balance_of("UST", addr(GATEWAY)), DEPOSIT);
    assert_eq!(ledger.allowance("UST", addr(USER), addr(GATEWAY)), 0);

    let outbound = gateway.outbound_since(0);
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].id, id);
    assert_eq!(outbound[0].sender, addr(USER));
    assert_eq!(outbound[0].destination_chain, CHAIN_2);
}

/// Test that ids are content-derived and unique per message.
/// Why: the id is assigned exactly once at creation and is the global
/// replay key.
#[test]
fn test_lock_and_call_assigns_unique_derived_ids() {
    let (mut gateway, mut ledger) = source_setup();

    let id_0 = gateway
        .lock_and_call(&mut ledger, addr(USER), CHAIN_2, addr(EXECUTABLE), vec![], None)
        .unwrap();
    let id_1 = gateway
        .lock_and_call(&mut ledger, addr(USER), CHAIN_2, addr(EXECUTABLE), vec![], None)
        .unwrap();

    assert_ne!(id_0, id_1);
    assert_eq!(id_0, MessageId::derive(CHAIN_1, 0));
    assert_eq!(id_1, MessageId::derive(CHAIN_1, 1));
}

/// Test that a deposit without allowance fails and changes nothing.
#[test]
fn test_lock_and_call_requires_allowance() {
    let (mut gateway, mut ledger) = source_setup();

    let result = gateway.lock_and_call(
        &mut ledger,
        addr(USER),
        CHAIN_2,
        addr(EXECUTABLE),
        vec![],
        Some(TokenTransfer { symbol: "UST".to_string(), amount: 100 }),
    );

    assert!(matches!(
        result,
        Err(GatewayError::Token(TokenError::InsufficientAllowance { .. }))
    ));
    assert_eq!(ledger.balance_of("UST", addr(USER)), 1_000_000);
    assert_eq!(gateway.outbound_len(), 0);
}

/// Test that an approved but unfunded deposit fails with the balance error.
#[test]
fn test_lock_and_call_requires_balance() {
    let (mut gateway, mut ledger) = source_setup();
    ledger.approve("UST", addr(USER), addr(GATEWAY), 2_000_000).unwrap();

    let result = gateway.lock_and_call(
        &mut ledger,
        addr(USER),
        CHAIN_2,
        addr(EXECUTABLE),
        vec![],
        Some(TokenTransfer { symbol: "UST".to_string(), amount: 2_000_000 }),
    );

    assert!(matches!(
        result,
        Err(GatewayError::Token(TokenError::InsufficientBalance { .. }))
    ));
    assert_eq!(gateway.outbound_len(), 0);
}

// ============================================================================
// APPROVE (REPLAY GATE) TESTS
// ============================================================================

/// Test that only the configured relayer may approve.
#[test]
fn test_approve_rejects_untrusted_caller() {
    let (mut gateway, ..) = destination_setup();

    let result = gateway.approve(addr(USER), inbound_message(0, 100));

    assert!(matches!(result, Err(GatewayError::UnauthorizedRelayer(_))));
}

/// Test that a message addressed to another chain is rejected.
#[test]
fn test_approve_rejects_wrong_destination() {
    let (mut gateway, ..) = destination_setup();
    let mut message = inbound_message(0, 100);
    message.destination_chain = "chain3".to_string();

    let result = gateway.approve(addr(RELAYER_ADDR), message);

    assert!(matches!(result, Err(GatewayError::WrongDestination { .. })));
}

/// Test the replay law: a second approve of the same id is rejected and
/// leaves the stored record untouched.
#[test]
fn test_approve_twice_is_rejected() {
    let (mut gateway, ..) = destination_setup();
    let message = inbound_message(0, 100);
    let id = message.id;

    gateway.approve(addr(RELAYER_ADDR), message.clone()).unwrap();
    let second = gateway.approve(addr(RELAYER_ADDR), message);

    assert!(matches!(second, Err(GatewayError::AlreadyApproved(dup)) if dup == id));
    assert_eq!(gateway.message(id).unwrap().status, MessageStatus::Approved);
}

/// Test that approve is rejected even after the message reached a terminal
/// status.
/// Why: this is what prevents double-crediting on duplicate delivery.
#[test]
fn test_approve_rejected_after_terminal_status() {
    let (mut gateway, mut ledger, mut factories, executable) = destination_setup();
    let message = inbound_message(0, 100);
    let id = message.id;

    gateway.approve(addr(RELAYER_ADDR), message.clone()).unwrap();
    gateway.execute(&mut ledger, &mut factories, &executable, id).unwrap();

    let replay = gateway.approve(addr(RELAYER_ADDR), message);
    assert!(matches!(replay, Err(GatewayError::AlreadyApproved(_))));
}

// ============================================================================
// EXECUTE TESTS
// ============================================================================

/// Test that executing an unknown id fails.
#[test]
fn test_execute_unknown_message() {
    let (mut gateway, mut ledger, mut factories, executable) = destination_setup();

    let result = gateway.execute(
        &mut ledger,
        &mut factories,
        &executable,
        MessageId::derive(CHAIN_1, 9),
    );

    assert!(matches!(result, Err(GatewayError::UnknownMessage(_))));
}

/// Test that a failing execution ends Failed with custody back at the
/// gateway.
/// Why: a failed message must never strand or destroy the bridged amount.
#[test]
fn test_failed_execution_keeps_custody_at_gateway() {
    let (mut gateway, mut ledger, mut factories, executable) = destination_setup();
    let message = inbound_message(0, 500);
    let id = message.id;
    gateway.approve(addr(RELAYER_ADDR), message).unwrap();

    // The malformed payload fails inside the executable.
    let status = gateway.execute(&mut ledger, &mut factories, &executable, id).unwrap();

    assert_eq!(status, MessageStatus::Failed);
    assert_eq!(ledger.balance_of("UST", addr(GATEWAY)), 500);
    assert_eq!(ledger.balance_of("UST", addr(EXECUTABLE)), 0);
    assert_eq!(gateway.message(id).unwrap().status, MessageStatus::Failed);
}

/// Test the single-execution invariant: a message cannot leave Approved
/// twice.
#[test]
fn test_execute_only_once() {
    let (mut gateway, mut ledger, mut factories, executable) = destination_setup();
    let message = inbound_message(0, 100);
    let id = message.id;
    gateway.approve(addr(RELAYER_ADDR), message).unwrap();
    gateway.execute(&mut ledger, &mut factories, &executable, id).unwrap();

    let again = gateway.execute(&mut ledger, &mut factories, &executable, id);

    assert!(matches!(
        again,
        Err(GatewayError::NotExecutable { status: MessageStatus::Failed, .. })
    ));
    // Custody unchanged by the second attempt
    assert_eq!(ledger.balance_of("UST", addr(GATEWAY)), 100);
}

/// Test that every admitted message ends in a terminal, queryable status.
#[test]
fn test_admitted_messages_reach_terminal_status() {
    let (mut gateway, mut ledger, mut factories, executable) = destination_setup();

    for nonce in 0..3 {
        let message = inbound_message(nonce, 10);
        let id = message.id;
        gateway.approve(addr(RELAYER_ADDR), message).unwrap();
        let status = gateway.execute(&mut ledger, &mut factories, &executable, id).unwrap();

        assert!(status.is_terminal());
        assert!(gateway.message(id).unwrap().status.is_terminal());
    }
}

/// Test that a valid payload from the trusted sibling executes, engaging
/// the fallback transfer when no pool exists.
#[test]
fn test_execute_valid_payload_succeeds() {
    let (mut gateway, mut ledger, mut factories, executable) = destination_setup();

    let mut payload = swap_to_natives_payload(0);
    payload.exchange_factory = addr("0xfa");
    payload.token_in = addr(UST);
    payload.recipient = addr(USER);
    // Register the pair unseeded so the empty-pool fallback engages.
    let mut factory = PoolFactory::new(addr("0xfa"));
    ledger.register("WNATIVE", payload.token_out).unwrap();
    factory.create_pool(payload.token_in, payload.token_out).unwrap();
    factories.insert(addr("0xfa"), factory);

    let mut message = inbound_message(0, 250);
    message.payload = payload.encode();
    let id = message.id;

    gateway.approve(addr(RELAYER_ADDR), message).unwrap();
    let status = gateway.execute(&mut ledger, &mut factories, &executable, id).unwrap();

    assert_eq!(status, MessageStatus::Executed);
    // Fallback: the raw amount reached the recipient.
    assert_eq!(ledger.balance_of("UST", addr(USER)), 250);
    assert_eq!(ledger.balance_of("UST", addr(GATEWAY)), 0);
}
