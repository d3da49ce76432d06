//! Storage seams shared by every module plus the in-memory backend.

pub mod memory;

pub use memory::InMemoryStore;

use crate::accounts::AccountsRepository;
use crate::billing::receipt::ReceiptRepository;
use crate::billing::receipt_error::ReceiptErrorRepository;
use crate::billing::repository::DocumentRepository;
use crate::catalog::CatalogRepository;
use crate::purchasing::PurchaseRepository;
use crate::quotation::QuotationRepository;
use crate::subscription::{SubscriptionRepository, UsageCounter};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    /// Compare-and-set lost against a concurrent writer.
    #[error("stale write: expected {expected}, found {found}")]
    Stale { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Everything the billing service touches, bundled so it can be generic over a single store.
pub trait BillingStore:
    CatalogRepository
    + ReceiptRepository
    + DocumentRepository
    + ReceiptErrorRepository
    + AccountsRepository
    + QuotationRepository
    + SubscriptionRepository
    + UsageCounter
{
}

impl<T> BillingStore for T where
    T: CatalogRepository
        + ReceiptRepository
        + DocumentRepository
        + ReceiptErrorRepository
        + AccountsRepository
        + QuotationRepository
        + SubscriptionRepository
        + UsageCounter
{
}

/// Store bound used by purchase recording.
pub trait PurchaseStore: CatalogRepository + PurchaseRepository + AccountsRepository {}

impl<T> PurchaseStore for T where T: CatalogRepository + PurchaseRepository + AccountsRepository {}
