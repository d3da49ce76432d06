use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{CompanyId, CustomerId, ProviderId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Receivable,
    Payable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Counterparty {
    Customer(CustomerId),
    Provider(ProviderId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPayment {
    pub id: PaymentId,
    pub date_joined: NaiveDate,
    pub amount: Decimal,
    pub description: String,
}

/// Debt opened by a credit sale or purchase and settled by payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtAccount {
    pub id: AccountId,
    pub company: CompanyId,
    pub kind: AccountKind,
    pub counterparty: Counterparty,
    /// Invoice or purchase that opened the account.
    pub document: String,
    pub date_joined: NaiveDate,
    pub end_date: NaiveDate,
    pub debt: Decimal,
    pub balance: Decimal,
    pub active: bool,
    pub payments: Vec<AccountPayment>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("payment amount must be positive")]
    NonPositiveAmount,
    #[error("payment of {amount} exceeds outstanding balance {balance}")]
    Overpayment { amount: Decimal, balance: Decimal },
    #[error("payment {0} not found")]
    UnknownPayment(String),
}

impl DebtAccount {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: AccountId,
        company: CompanyId,
        kind: AccountKind,
        counterparty: Counterparty,
        document: String,
        date_joined: NaiveDate,
        end_date: NaiveDate,
        debt: Decimal,
    ) -> Self {
        Self {
            id,
            company,
            kind,
            counterparty,
            document,
            date_joined,
            end_date,
            debt,
            balance: debt,
            active: debt > Decimal::ZERO,
            payments: Vec::new(),
        }
    }

    pub fn paid(&self) -> Decimal {
        self.payments.iter().map(|payment| payment.amount).sum()
    }

    /// `balance = debt - paid`; the account stays active while something is owed.
    pub fn recompute(&mut self) {
        self.balance = self.debt - self.paid();
        self.active = self.balance > Decimal::ZERO;
    }

    pub fn add_payment(
        &mut self,
        id: PaymentId,
        date_joined: NaiveDate,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<&AccountPayment, AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::NonPositiveAmount);
        }
        if amount > self.balance {
            return Err(AccountError::Overpayment {
                amount,
                balance: self.balance,
            });
        }
        let description = description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "s/n".to_string());
        self.payments.push(AccountPayment {
            id,
            date_joined,
            amount,
            description,
        });
        self.recompute();
        Ok(&self.payments[self.payments.len() - 1])
    }

    pub fn remove_payment(&mut self, id: &PaymentId) -> Result<AccountPayment, AccountError> {
        let index = self
            .payments
            .iter()
            .position(|payment| &payment.id == id)
            .ok_or_else(|| AccountError::UnknownPayment(id.0.clone()))?;
        let removed = self.payments.remove(index);
        self.recompute();
        Ok(removed)
    }
}
