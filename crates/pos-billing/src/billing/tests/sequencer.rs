use std::sync::Arc;

use super::common::*;
use crate::billing::receipt::{
    Receipt, ReceiptKey, ReceiptNumber, ReceiptRepository, ReceiptSequencer, SequencerError,
    VoucherType,
};
use crate::store::{InMemoryStore, RepositoryError};

fn sequencer(store: &Arc<InMemoryStore>) -> ReceiptSequencer<InMemoryStore> {
    ReceiptSequencer::new(store.clone())
}

fn sequence_of(store: &InMemoryStore, key: &ReceiptKey) -> u64 {
    store
        .receipt(key)
        .expect("receipt lookup")
        .expect("receipt exists")
        .sequence
}

#[test]
fn ensure_receipts_seeds_every_voucher_type_once() {
    let store = seeded_store();
    let receipts = sequencer(&store)
        .ensure_receipts(&company())
        .expect("receipts");
    assert_eq!(receipts.len(), VoucherType::ALL.len());
    assert!(receipts.iter().all(|receipt| receipt.sequence == 0));
    assert_eq!(store.receipts_for(&company_id()).expect("receipts").len(), 3);
}

#[test]
fn preview_does_not_consume_numbers() {
    let store = seeded_store();
    let sequencer = sequencer(&store);
    let key = receipt_key(VoucherType::Invoice);
    assert_eq!(sequencer.next_number(&key).expect("preview"), ReceiptNumber(1));
    assert_eq!(sequencer.next_number(&key).expect("preview"), ReceiptNumber(1));
    assert_eq!(key.full_number(ReceiptNumber(1)), "001-002-000000001");
}

#[tokio::test]
async fn committed_lease_advances_counter() {
    let store = seeded_store();
    let sequencer = sequencer(&store);
    let key = receipt_key(VoucherType::Invoice);

    let lease = sequencer.reserve(&key).await.expect("lease");
    assert_eq!(lease.number(), ReceiptNumber(1));
    assert_eq!(lease.full_number(), "001-002-000000001");
    let receipt = sequencer.commit(lease).expect("commit");

    assert_eq!(receipt.sequence, 1);
    assert_eq!(sequence_of(&store, &key), 1);
    assert_eq!(sequencer.next_number(&key).expect("preview"), ReceiptNumber(2));
}

#[tokio::test]
async fn dropped_lease_leaves_counter_untouched() {
    let store = seeded_store();
    let sequencer = sequencer(&store);
    let key = receipt_key(VoucherType::Invoice);

    let lease = sequencer.reserve(&key).await.expect("lease");
    drop(lease);

    assert_eq!(sequence_of(&store, &key), 0);
    let again = sequencer.reserve(&key).await.expect("lease after release");
    assert_eq!(again.number(), ReceiptNumber(1));
}

#[tokio::test]
async fn voucher_types_are_sequenced_independently() {
    let store = seeded_store();
    let sequencer = sequencer(&store);

    let invoice = sequencer
        .reserve(&receipt_key(VoucherType::Invoice))
        .await
        .expect("invoice lease");
    let ticket = sequencer
        .reserve(&receipt_key(VoucherType::SaleTicket))
        .await
        .expect("ticket lease");

    assert_eq!(invoice.number(), ReceiptNumber(1));
    assert_eq!(ticket.number(), ReceiptNumber(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_never_share_a_number() {
    let store = seeded_store();
    let sequencer = Arc::new(sequencer(&store));
    let key = receipt_key(VoucherType::Invoice);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let sequencer = sequencer.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            let lease = sequencer.reserve(&key).await.expect("lease");
            let number = lease.number().value();
            tokio::task::yield_now().await;
            sequencer.commit(lease).expect("commit");
            number
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.expect("task"));
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=16).collect::<Vec<u64>>());
    assert_eq!(sequence_of(&store, &key), 16);
}

#[tokio::test]
async fn skip_burns_the_number_and_moves_the_lease() {
    let store = seeded_store();
    let sequencer = sequencer(&store);
    let key = receipt_key(VoucherType::Invoice);

    let mut lease = sequencer.reserve(&key).await.expect("lease");
    let next = sequencer.skip(&mut lease).expect("skip");

    assert_eq!(next, ReceiptNumber(2));
    assert_eq!(lease.number(), ReceiptNumber(2));
    assert_eq!(sequence_of(&store, &key), 1);

    sequencer.commit(lease).expect("commit");
    assert_eq!(sequence_of(&store, &key), 2);
}

#[tokio::test]
async fn advance_past_only_moves_forward() {
    let store = seeded_store();
    let sequencer = sequencer(&store);
    let key = receipt_key(VoucherType::Invoice);

    let receipt = sequencer
        .advance_past(&key, ReceiptNumber(7))
        .await
        .expect("advance");
    assert_eq!(receipt.sequence, 7);

    let again = sequencer
        .advance_past(&key, ReceiptNumber(7))
        .await
        .expect("repeat");
    assert_eq!(again.sequence, 7);

    let behind = sequencer
        .advance_past(&key, ReceiptNumber(3))
        .await
        .expect("behind");
    assert_eq!(behind.sequence, 7);
    assert_eq!(sequencer.next_number(&key).expect("preview"), ReceiptNumber(8));
}

#[tokio::test]
async fn commit_fails_when_counter_moved_underneath() {
    let store = seeded_store();
    let sequencer = sequencer(&store);
    let key = receipt_key(VoucherType::Invoice);

    let lease = sequencer.reserve(&key).await.expect("lease");
    // another process wrote the counter directly
    store.swap_sequence(&key, 0, 5).expect("external write");

    let err = sequencer.commit(lease).expect_err("stale");
    assert_eq!(
        err,
        SequencerError::Repository(RepositoryError::Stale {
            expected: 0,
            found: 5
        })
    );
    assert_eq!(sequence_of(&store, &key), 5);
}

#[tokio::test]
async fn exhausted_receipt_refuses_new_numbers() {
    let store = seeded_store();
    let sequencer = sequencer(&store);
    let key = receipt_key(VoucherType::Invoice);
    store
        .swap_sequence(&key, 0, ReceiptNumber::MAX)
        .expect("fill range");

    assert!(matches!(
        sequencer.next_number(&key),
        Err(SequencerError::Exhausted(_))
    ));
    assert!(matches!(
        sequencer.reserve(&key).await,
        Err(SequencerError::Exhausted(_))
    ));
}

#[tokio::test]
async fn unknown_receipt_is_reported() {
    let store = Arc::new(InMemoryStore::new());
    let sequencer = sequencer(&store);
    let err = sequencer
        .reserve(&receipt_key(VoucherType::Invoice))
        .await
        .expect_err("no receipt");
    assert!(matches!(err, SequencerError::UnknownReceipt(_)));
}

#[tokio::test]
async fn realign_codes_moves_receipts_and_keeps_sequences() {
    let store = seeded_store();
    let sequencer = sequencer(&store);
    let key = receipt_key(VoucherType::Invoice);
    sequencer
        .advance_past(&key, ReceiptNumber(41))
        .await
        .expect("advance");

    // credit notes already configured at the target codes stay as they are
    let existing = ReceiptKey {
        establishment_code: "002".to_string(),
        issuing_point_code: "001".to_string(),
        ..receipt_key(VoucherType::CreditNote)
    };
    store
        .insert_receipt(Receipt {
            key: existing.clone(),
            sequence: 9,
        })
        .expect("existing receipt");

    let moved = sequencer
        .realign_codes(&company_id(), "002", "001")
        .await
        .expect("realign");
    assert_eq!(moved, 2);

    let moved_key = ReceiptKey {
        establishment_code: "002".to_string(),
        issuing_point_code: "001".to_string(),
        ..key.clone()
    };
    assert_eq!(sequence_of(&store, &moved_key), 41);
    assert_eq!(sequence_of(&store, &existing), 9);
    assert!(store.receipt(&key).expect("lookup").is_none());
}

#[test]
fn receipt_numbers_parse_nine_digits_only() {
    assert_eq!("000000042".parse::<ReceiptNumber>(), Ok(ReceiptNumber(42)));
    assert!("1234567890".parse::<ReceiptNumber>().is_err());
    assert!("12a".parse::<ReceiptNumber>().is_err());
    assert_eq!(ReceiptNumber(7).to_string(), "000000007");
}
