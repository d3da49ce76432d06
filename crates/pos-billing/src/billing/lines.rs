//! Resolves requested sale lines against the catalog.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::totals::{line_amount, LineInput, LineItem, MAX_LINE_QUANTITY};
use crate::catalog::{CatalogRepository, CompanyId, ProductId};
use crate::store::RepositoryError;

/// Line as submitted by a cashier: the price comes from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product: ProductId,
    pub quantity: i64,
    /// Fraction of the line subtotal discounted.
    #[serde(default)]
    pub discount: Decimal,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LineError {
    #[error("a document needs at least one line")]
    Empty,
    #[error("unknown product {0}")]
    UnknownProduct(String),
    #[error("quantity for product {0} is out of range")]
    InvalidQuantity(String),
    #[error("discount for product {0} must be between 0 and 1")]
    InvalidDiscount(String),
    #[error("not enough stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Looks every product up and prices it at its current (promotion aware) price on `day`.
pub fn resolve_lines<C>(
    catalog: &C,
    company: &CompanyId,
    requests: &[LineRequest],
    day: NaiveDate,
) -> Result<Vec<LineInput>, LineError>
where
    C: CatalogRepository + ?Sized,
{
    if requests.is_empty() {
        return Err(LineError::Empty);
    }
    let promotions = catalog.promotions(company)?;
    requests
        .iter()
        .map(|request| {
            if !(1..=MAX_LINE_QUANTITY).contains(&request.quantity) {
                return Err(LineError::InvalidQuantity(request.product.0.clone()));
            }
            if request.discount < Decimal::ZERO || request.discount > Decimal::ONE {
                return Err(LineError::InvalidDiscount(request.product.0.clone()));
            }
            let product = catalog
                .product(&request.product)?
                .filter(|product| &product.company == company)
                .ok_or_else(|| LineError::UnknownProduct(request.product.0.clone()))?;
            let price = product.current_price(&promotions, day);
            if line_amount(price, request.quantity).is_none() {
                return Err(LineError::InvalidQuantity(request.product.0.clone()));
            }
            Ok(LineInput {
                price,
                product: product.id,
                code: product.code,
                description: product.name,
                quantity: request.quantity,
                discount: request.discount,
                has_tax: product.has_tax,
                is_inventoried: product.is_inventoried,
            })
        })
        .collect()
}

/// Re-prices nothing: the stored line keeps its price and discount.
pub fn inputs_from_items(items: &[LineItem]) -> Vec<LineInput> {
    items
        .iter()
        .map(|item| LineInput {
            product: item.product.clone(),
            code: item.code.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            price: item.price,
            discount: item.discount,
            has_tax: item.has_tax,
            is_inventoried: item.is_inventoried,
        })
        .collect()
}

/// Fails on the first inventoried line asking for more than the product has in stock.
pub fn check_stock<C>(catalog: &C, lines: &[LineItem]) -> Result<(), LineError>
where
    C: CatalogRepository + ?Sized,
{
    for line in lines.iter().filter(|line| line.is_inventoried) {
        let product = catalog
            .product(&line.product)?
            .ok_or_else(|| LineError::UnknownProduct(line.product.0.clone()))?;
        if product.is_inventoried && product.stock < line.quantity {
            return Err(LineError::InsufficientStock {
                product: product.name,
                requested: line.quantity,
                available: product.stock,
            });
        }
    }
    Ok(())
}
