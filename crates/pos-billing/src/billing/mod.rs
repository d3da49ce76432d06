//! Electronic documents: receipt sequencing, access keys, XML, SRI submission and the
//! issuance service tying them together.

pub mod access_key;
pub mod document;
pub mod lines;
pub mod pipeline;
pub mod receipt;
pub mod receipt_error;
pub mod repository;
pub mod router;
pub mod service;
pub mod signer;
pub mod sri;
pub mod totals;
pub mod xml;

pub use access_key::{AccessKey, AccessKeyError, AccessKeyParts};
pub use document::{
    Authorization, CreditNote, CreditNoteId, DocumentStatus, Invoice, InvoiceId, VoucherStage,
};
pub use lines::{LineError, LineRequest};
pub use pipeline::{AuthorizationPipeline, PipelineConfig, PipelineFailure, PipelineOutcome};
pub use receipt::{
    Receipt, ReceiptKey, ReceiptLease, ReceiptNumber, ReceiptSequencer, SequencerError, VoucherType,
};
pub use router::billing_router;
pub use service::{
    BillingError, BillingService, CreditNoteRequest, InvoiceRequest, NextReceipt,
    QuotationInvoiceRequest,
};
pub use signer::{DigestSigner, DocumentSigner, SignatureError};

#[cfg(test)]
mod tests;
