use std::sync::Arc;

use super::common::*;
use crate::billing::document::DocumentStatus;
use crate::billing::receipt::{ReceiptNumber, ReceiptRepository, VoucherType};
use crate::billing::repository::DocumentRepository;
use crate::billing::service::{BillingError, CreditNoteRequest};
use crate::catalog::CatalogRepository;
use crate::store::InMemoryStore;

fn stock(store: &InMemoryStore) -> i64 {
    store
        .product(&taxed_product().id)
        .expect("product lookup")
        .expect("product exists")
        .stock
}

fn sequence(store: &InMemoryStore, voucher_type: VoucherType) -> u64 {
    store
        .receipt(&receipt_key(voucher_type))
        .expect("receipt lookup")
        .expect("receipt exists")
        .sequence
}

fn setup() -> (Arc<InMemoryStore>, Arc<ScriptedGateway>, TestService) {
    let store = seeded_store();
    let gateway = Arc::new(ScriptedGateway::yielding());
    let service = build_service(store.clone(), gateway.clone());
    (store, gateway, service)
}

#[tokio::test]
async fn simultaneous_credit_notes_cancel_the_invoice_once() {
    let (store, _gateway, service) = setup();
    let invoice = service.create_invoice(invoice_request()).await.expect("invoice");
    assert_eq!(stock(&store), 8);

    let (first, second) = tokio::join!(
        service.create_credit_note(&invoice.id, CreditNoteRequest::default()),
        service.create_credit_note(&invoice.id, CreditNoteRequest::default()),
    );

    let (note, err) = match (first, second) {
        (Ok(note), Err(err)) | (Err(err), Ok(note)) => (note, err),
        other => panic!("expected exactly one credit note, got {other:?}"),
    };
    assert!(matches!(err, BillingError::NotAuthorized(_)));
    assert_eq!(note.header.receipt_number, Some(ReceiptNumber(1)));

    assert_eq!(
        store.credit_notes_for(&invoice.id).expect("notes").len(),
        1
    );
    assert_eq!(
        service.invoice(&invoice.id).expect("invoice").header.status,
        DocumentStatus::Canceled
    );
    assert_eq!(stock(&store), 10);
    assert_eq!(sequence(&store, VoucherType::CreditNote), 1);
}

#[tokio::test]
async fn simultaneous_emissions_of_a_draft_authorize_it_once() {
    let (store, gateway, service) = setup();
    let mut request = invoice_request();
    request.is_draft = true;
    let draft = service.create_invoice(request).await.expect("draft");

    let (first, second) = tokio::join!(
        service.emit_invoice(&draft.id),
        service.emit_invoice(&draft.id),
    );

    let (emitted, err) = match (first, second) {
        (Ok(invoice), Err(err)) | (Err(err), Ok(invoice)) => (invoice, err),
        other => panic!("expected exactly one emission, got {other:?}"),
    };
    assert!(matches!(err, BillingError::AlreadyAuthorized(_)));
    assert_eq!(emitted.header.status, DocumentStatus::Authorized);
    assert_eq!(emitted.header.receipt_number, Some(ReceiptNumber(1)));

    assert_eq!(stock(&store), 8);
    assert_eq!(sequence(&store, VoucherType::Invoice), 1);
    assert_eq!(gateway.validate_calls(), 1);
}

#[tokio::test]
async fn simultaneous_sales_take_consecutive_numbers() {
    let (store, _gateway, service) = setup();

    let (first, second) = tokio::join!(
        service.create_invoice(invoice_request()),
        service.create_invoice(invoice_request()),
    );

    let mut numbers = vec![
        first.expect("first").header.receipt_number,
        second.expect("second").header.receipt_number,
    ];
    numbers.sort();
    assert_eq!(numbers, vec![Some(ReceiptNumber(1)), Some(ReceiptNumber(2))]);
    assert_eq!(sequence(&store, VoucherType::Invoice), 2);
    assert_eq!(stock(&store), 6);
}
