//! Quotations: priced proposals that can later be turned into invoices.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::billing::lines::{check_stock, resolve_lines, LineError, LineRequest};
use crate::billing::totals::{compute_document, DocumentTotals, LineItem};
use crate::catalog::{CatalogRepository, CompanyId, CustomerId, UserId};
use crate::store::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub number: u64,
    pub company: CompanyId,
    pub customer: CustomerId,
    #[serde(default)]
    pub employee: Option<UserId>,
    pub date_joined: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Cleared once the quotation has been invoiced.
    pub active: bool,
    pub lines: Vec<LineItem>,
    pub totals: DocumentTotals,
}

impl Quotation {
    pub fn formatted_number(&self) -> String {
        format!("{:08}", self.number)
    }

    /// Every inventoried line must fit into the current stock before the quotation is sold.
    pub fn validate_stock<C>(&self, catalog: &C) -> Result<(), QuotationError>
    where
        C: CatalogRepository + ?Sized,
    {
        Ok(check_stock(catalog, &self.lines)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationDraft {
    pub company: CompanyId,
    pub customer: CustomerId,
    #[serde(default)]
    pub employee: Option<UserId>,
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, thiserror::Error)]
pub enum QuotationError {
    #[error("unknown company {0}")]
    UnknownCompany(String),
    #[error("unknown customer {0}")]
    UnknownCustomer(String),
    #[error("quotation {0} was already invoiced")]
    Inactive(String),
    #[error(transparent)]
    Lines(#[from] LineError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub trait QuotationRepository: Send + Sync {
    fn insert_quotation(&self, quotation: Quotation) -> Result<Quotation, RepositoryError>;
    fn update_quotation(&self, quotation: Quotation) -> Result<(), RepositoryError>;
    fn quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError>;
    fn quotations_for(&self, company: &CompanyId) -> Result<Vec<Quotation>, RepositoryError>;
}

pub struct QuotationService<S> {
    store: Arc<S>,
}

impl<S> QuotationService<S>
where
    S: CatalogRepository + QuotationRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Prices the draft at today's catalog prices and stores it with the company's next number.
    pub fn create(&self, draft: QuotationDraft, day: NaiveDate) -> Result<Quotation, QuotationError> {
        let company = self
            .store
            .company(&draft.company)?
            .ok_or_else(|| QuotationError::UnknownCompany(draft.company.0.clone()))?;
        self.store
            .customer(&draft.customer)?
            .filter(|customer| customer.company == company.id)
            .ok_or_else(|| QuotationError::UnknownCustomer(draft.customer.0.clone()))?;

        let inputs = resolve_lines(self.store.as_ref(), &company.id, &draft.lines, day)?;
        let (lines, totals) = compute_document(inputs, company.tax_rate());
        let number = self
            .store
            .quotations_for(&company.id)?
            .iter()
            .map(|quotation| quotation.number)
            .max()
            .unwrap_or(0)
            + 1;

        let quotation = Quotation {
            id: QuotationId(format!("{}-quo-{number:08}", company.id.0)),
            number,
            company: company.id,
            customer: draft.customer,
            employee: draft.employee,
            date_joined: day,
            created_at: Utc::now(),
            active: true,
            lines,
            totals,
        };
        let quotation = self.store.insert_quotation(quotation)?;
        info!(
            quotation = %quotation.id.0,
            number = %quotation.formatted_number(),
            total = %quotation.totals.total_amount,
            "quotation created"
        );
        Ok(quotation)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::catalog::choices::EnvironmentType;
    use crate::catalog::{Company, Customer, Product, ProductId};
    use crate::store::InMemoryStore;

    fn company_id() -> CompanyId {
        CompanyId("cmp-valle".to_string())
    }

    fn store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .save_company(Company {
                id: company_id(),
                owner: None,
                ruc: "1791122334001".to_string(),
                company_name: "Valle Verde S.A.".to_string(),
                commercial_name: "Valle Verde".to_string(),
                main_address: "Sangolquí".to_string(),
                establishment_address: "Sangolquí".to_string(),
                establishment_code: "001".to_string(),
                issuing_point_code: "001".to_string(),
                special_taxpayer: "000".to_string(),
                obligated_accounting: false,
                environment: EnvironmentType::Test,
                emission_type: Default::default(),
                retention_agent: false,
                regime: Default::default(),
                tax_percentage: Default::default(),
                email: String::new(),
                mobile: None,
                signature_key: None,
            })
            .expect("company");
        store
            .insert_customer(Customer {
                id: CustomerId("cus-ana".to_string()),
                company: company_id(),
                names: "Ana Torres".to_string(),
                ruc: None,
                dni: Some("1711122233".to_string()),
                email: None,
                mobile: None,
                address: None,
                is_credit_authorized: false,
                credit_limit: Decimal::ZERO,
            })
            .expect("customer");
        store
            .insert_product(Product {
                id: ProductId("prd-abono".to_string()),
                company: company_id(),
                category: None,
                code: "ABN-10".to_string(),
                name: "Abono orgánico 10kg".to_string(),
                price: Decimal::new(800, 2),
                pvp: Decimal::new(1200, 2),
                has_tax: true,
                is_inventoried: true,
                stock: 3,
            })
            .expect("product");
        store
    }

    fn draft(quantity: i64) -> QuotationDraft {
        QuotationDraft {
            company: company_id(),
            customer: CustomerId("cus-ana".to_string()),
            employee: Some(UserId("usr-vendedor".to_string())),
            lines: vec![LineRequest {
                product: ProductId("prd-abono".to_string()),
                quantity,
                discount: Decimal::ZERO,
            }],
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date")
    }

    #[test]
    fn quotations_are_numbered_per_company() {
        let store = store();
        let service = QuotationService::new(store.clone());

        let first = service.create(draft(1), day()).expect("first");
        let second = service.create(draft(2), day()).expect("second");

        assert_eq!(first.formatted_number(), "00000001");
        assert_eq!(second.number, 2);
        assert!(second.active);
        assert_eq!(second.totals.total_amount, Decimal::new(2760, 2));
        assert_eq!(store.quotations_for(&company_id()).expect("list").len(), 2);
    }

    #[test]
    fn stock_is_checked_when_selling_not_when_quoting() {
        let store = store();
        let quotation = QuotationService::new(store.clone())
            .create(draft(5), day())
            .expect("quoted beyond stock");

        let err = quotation
            .validate_stock(store.as_ref())
            .expect_err("not enough stock");
        assert!(matches!(
            err,
            QuotationError::Lines(LineError::InsufficientStock {
                requested: 5,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn customer_must_belong_to_the_company() {
        let service = QuotationService::new(store());
        let mut foreign = draft(1);
        foreign.customer = CustomerId("cus-otro".to_string());

        let err = service.create(foreign, day()).expect_err("unknown customer");
        assert!(matches!(err, QuotationError::UnknownCustomer(_)));
    }
}
