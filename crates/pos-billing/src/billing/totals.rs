//! Line and document arithmetic shared by invoices, credit notes and quotations.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::catalog::ProductId;

/// Rounds a money amount to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest quantity a single line accepts.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Ceiling for `price * quantity` on one line: fourteen integer digits, as in the SRI schemas.
const MAX_LINE_AMOUNT: i64 = 100_000_000_000_000;

/// `price * quantity`, or `None` when the quantity is out of range or the amount does not fit
/// a document.
pub fn line_amount(price: Decimal, quantity: i64) -> Option<Decimal> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return None;
    }
    price
        .checked_mul(Decimal::from(quantity))
        .filter(|amount| amount.abs() < Decimal::from(MAX_LINE_AMOUNT))
}

/// Values captured from the product and the form when a line is added.
#[derive(Debug, Clone, PartialEq)]
pub struct LineInput {
    pub product: ProductId,
    pub code: String,
    pub description: String,
    pub quantity: i64,
    pub price: Decimal,
    /// Fraction of the line subtotal discounted (0.10 for 10%).
    pub discount: Decimal,
    pub has_tax: bool,
    pub is_inventoried: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product: ProductId,
    pub code: String,
    pub description: String,
    pub quantity: i64,
    pub price: Decimal,
    pub price_with_tax: Decimal,
    pub subtotal: Decimal,
    /// Tax fraction applied to the line; zero for untaxed products.
    pub tax: Decimal,
    pub total_tax: Decimal,
    pub discount: Decimal,
    pub total_discount: Decimal,
    pub total_amount: Decimal,
    pub has_tax: bool,
    pub is_inventoried: bool,
}

impl LineItem {
    pub fn compute(input: LineInput, tax_rate: Decimal) -> Self {
        let quantity = Decimal::from(input.quantity);
        let subtotal = input.price * quantity;
        let total_discount = subtotal * input.discount;
        let total_amount = subtotal - total_discount;
        let tax = if input.has_tax { tax_rate } else { Decimal::ZERO };
        let total_tax = total_amount * tax;

        Self {
            product: input.product,
            code: input.code,
            description: input.description,
            quantity: input.quantity,
            price: input.price,
            price_with_tax: input.price + input.price * tax,
            subtotal,
            tax,
            total_tax,
            discount: input.discount,
            total_discount,
            total_amount,
            has_tax: input.has_tax,
            is_inventoried: input.is_inventoried,
        }
    }

    /// Tax percentage printed as `tarifa` (15.00 for 0.15).
    pub fn tax_rate_percent(&self) -> Decimal {
        self.tax * Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal_without_tax: Decimal,
    pub subtotal_with_tax: Decimal,
    /// Document tax fraction.
    pub tax: Decimal,
    pub total_tax: Decimal,
    pub total_discount: Decimal,
    pub total_amount: Decimal,
}

impl DocumentTotals {
    pub fn from_lines(lines: &[LineItem], tax_rate: Decimal) -> Self {
        let mut totals = DocumentTotals {
            tax: tax_rate,
            ..Default::default()
        };
        let mut tax_sum = Decimal::ZERO;
        for line in lines {
            if line.has_tax {
                totals.subtotal_with_tax += line.total_amount;
                tax_sum += line.total_tax;
            } else {
                totals.subtotal_without_tax += line.total_amount;
            }
            totals.total_discount += line.total_discount;
        }
        totals.total_tax = round_money(tax_sum);
        totals.total_amount = round_money(totals.subtotal()) + totals.total_tax;
        totals
    }

    /// Taxable plus non-taxable base (`totalSinImpuestos`).
    pub fn subtotal(&self) -> Decimal {
        self.subtotal_with_tax + self.subtotal_without_tax
    }
}

/// Computes lines and totals in one pass.
pub fn compute_document(inputs: Vec<LineInput>, tax_rate: Decimal) -> (Vec<LineItem>, DocumentTotals) {
    let lines: Vec<LineItem> = inputs
        .into_iter()
        .map(|input| LineItem::compute(input, tax_rate))
        .collect();
    let totals = DocumentTotals::from_lines(&lines, tax_rate);
    (lines, totals)
}
