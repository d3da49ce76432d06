use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::billing::totals::round_money;
use crate::catalog::choices::PaymentType;
use crate::catalog::{CompanyId, ProductId, ProviderId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseId(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLineInput {
    pub product: ProductId,
    pub quantity: i64,
    /// Unit cost.
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product: ProductId,
    pub quantity: i64,
    pub price: Decimal,
    pub subtotal: Decimal,
}

impl PurchaseLine {
    pub fn compute(input: PurchaseLineInput) -> Self {
        Self {
            subtotal: input.price * Decimal::from(input.quantity),
            product: input.product,
            quantity: input.quantity,
            price: input.price,
        }
    }
}

/// Purchase as entered by the user, before totals are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseDraft {
    pub company: CompanyId,
    /// Provider's invoice number.
    pub number: String,
    pub provider: ProviderId,
    pub payment_type: PaymentType,
    pub date_joined: NaiveDate,
    /// Due date of a credit purchase; defaults to `date_joined`.
    #[serde(default)]
    pub end_credit: Option<NaiveDate>,
    pub lines: Vec<PurchaseLineInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub company: CompanyId,
    pub number: String,
    pub provider: ProviderId,
    pub payment_type: PaymentType,
    pub date_joined: NaiveDate,
    pub end_credit: NaiveDate,
    pub lines: Vec<PurchaseLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total_tax: Decimal,
    pub total: Decimal,
}

impl Purchase {
    /// `total_tax = round2(subtotal * tax)`, `total = round2(subtotal) + total_tax`.
    pub fn from_draft(id: PurchaseId, draft: PurchaseDraft, tax_rate: Decimal) -> Self {
        let lines: Vec<PurchaseLine> = draft.lines.into_iter().map(PurchaseLine::compute).collect();
        let subtotal: Decimal = lines.iter().map(|line| line.subtotal).sum();
        let total_tax = round_money(subtotal * tax_rate);
        Self {
            id,
            company: draft.company,
            number: draft.number,
            provider: draft.provider,
            payment_type: draft.payment_type,
            end_credit: draft.end_credit.unwrap_or(draft.date_joined),
            date_joined: draft.date_joined,
            lines,
            subtotal,
            tax: tax_rate,
            total_tax,
            total: round_money(subtotal) + total_tax,
        }
    }
}
