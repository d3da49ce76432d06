use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use super::ledger::{AccountError, AccountId, AccountPayment, DebtAccount, PaymentId};
use super::AccountsRepository;
use crate::store::RepositoryError;

static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_payment_id() -> PaymentId {
    let id = PAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PaymentId(format!("pay-{id:06}"))
}

/// Records and reverts payments against receivable and payable accounts.
pub struct AccountsService<R: ?Sized> {
    repository: Arc<R>,
}

impl<R> AccountsService<R>
where
    R: AccountsRepository + ?Sized,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    fn load(&self, id: &AccountId) -> Result<DebtAccount, AccountsServiceError> {
        Ok(self
            .repository
            .account(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    pub fn pay(
        &self,
        id: &AccountId,
        date: NaiveDate,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<(DebtAccount, AccountPayment), AccountsServiceError> {
        let mut account = self.load(id)?;
        let payment = account
            .add_payment(next_payment_id(), date, amount, description)?
            .clone();
        self.repository.update_account(account.clone())?;
        info!(account = %id.0, amount = %amount, balance = %account.balance, "payment recorded");
        Ok((account, payment))
    }

    pub fn remove_payment(
        &self,
        id: &AccountId,
        payment: &PaymentId,
    ) -> Result<DebtAccount, AccountsServiceError> {
        let mut account = self.load(id)?;
        account.remove_payment(payment)?;
        self.repository.update_account(account.clone())?;
        Ok(account)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccountsServiceError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
