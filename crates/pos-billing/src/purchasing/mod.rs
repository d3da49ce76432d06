//! Purchases from providers: stock intake and accounts payable.

pub mod domain;
pub mod service;

pub use domain::{Purchase, PurchaseDraft, PurchaseId, PurchaseLine, PurchaseLineInput};
pub use service::{PurchaseError, PurchaseService};

use crate::catalog::CompanyId;
use crate::store::RepositoryError;

pub trait PurchaseRepository: Send + Sync {
    /// Conflicts when the company already recorded the same purchase number.
    fn insert_purchase(&self, purchase: Purchase) -> Result<Purchase, RepositoryError>;
    fn purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>, RepositoryError>;
    fn purchases_for(&self, company: &CompanyId) -> Result<Vec<Purchase>, RepositoryError>;
    fn delete_purchase(&self, id: &PurchaseId) -> Result<Purchase, RepositoryError>;
}
