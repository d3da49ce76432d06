//! Accounts receivable (credit sales) and payable (credit purchases).

pub mod ledger;
pub mod service;

pub use ledger::{AccountError, AccountId, AccountKind, AccountPayment, Counterparty, DebtAccount, PaymentId};
pub use service::{AccountsService, AccountsServiceError};

use crate::catalog::CompanyId;
use crate::store::RepositoryError;

pub trait AccountsRepository: Send + Sync {
    fn insert_account(&self, account: DebtAccount) -> Result<DebtAccount, RepositoryError>;
    fn update_account(&self, account: DebtAccount) -> Result<(), RepositoryError>;
    fn account(&self, id: &AccountId) -> Result<Option<DebtAccount>, RepositoryError>;
    fn accounts_for(
        &self,
        company: &CompanyId,
        kind: AccountKind,
    ) -> Result<Vec<DebtAccount>, RepositoryError>;
    /// Account opened for an invoice or purchase, if any.
    fn account_for_document(&self, document: &str) -> Result<Option<DebtAccount>, RepositoryError>;
    fn delete_account(&self, id: &AccountId) -> Result<(), RepositoryError>;
}
