use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use tracing::info;

use super::company::{Company, CompanyId, CompanyValidationError};
use super::customer::{Customer, CustomerId};
use super::product::{Category, CategoryId, Product, ProductId};
use super::provider::{Provider, ProviderId};
use super::repository::CatalogRepository;
use crate::billing::receipt::{ReceiptRepository, ReceiptSequencer, SequencerError};
use crate::store::RepositoryError;
use crate::subscription::{ensure_quota, QuotaError, QuotaKind, SubscriptionRepository, UsageCounter};

static CATALOG_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let id = CATALOG_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

/// Master-data operations that carry business rules: quota-gated creation and receipt upkeep
/// when a company's emission codes change.
pub struct CatalogService<S> {
    store: Arc<S>,
    sequencer: Arc<ReceiptSequencer<S>>,
}

impl<S> CatalogService<S>
where
    S: CatalogRepository + ReceiptRepository + SubscriptionRepository + UsageCounter + 'static,
{
    pub fn new(store: Arc<S>, sequencer: Arc<ReceiptSequencer<S>>) -> Self {
        Self { store, sequencer }
    }

    fn company(&self, id: &CompanyId) -> Result<Company, CatalogError> {
        self.store
            .company(id)?
            .ok_or_else(|| CatalogError::UnknownCompany(id.0.clone()))
    }

    /// Stores a validated company and seeds a zeroed receipt per voucher type.
    pub fn register_company(&self, company: Company) -> Result<Company, CatalogError> {
        company.validate()?;
        self.store.save_company(company.clone())?;
        self.sequencer.ensure_receipts(&company)?;
        info!(company = %company.id.0, ruc = %company.ruc, "company registered");
        Ok(company)
    }

    /// Saves company changes. When the establishment or issuing point moves, existing receipts
    /// follow the new codes with their sequences intact.
    pub async fn update_company(&self, company: Company) -> Result<Company, CatalogError> {
        company.validate()?;
        let previous = self.company(&company.id)?;
        self.store.save_company(company.clone())?;

        if previous.establishment_code != company.establishment_code
            || previous.issuing_point_code != company.issuing_point_code
        {
            self.sequencer
                .realign_codes(
                    &company.id,
                    &company.establishment_code,
                    &company.issuing_point_code,
                )
                .await?;
        }
        self.sequencer.ensure_receipts(&company)?;
        Ok(company)
    }

    pub fn register_customer(&self, mut customer: Customer) -> Result<Customer, CatalogError> {
        let company = self.company(&customer.company)?;
        ensure_quota(self.store.as_ref(), &company, QuotaKind::Customer, today())?;
        if customer.id.0.is_empty() {
            customer.id = CustomerId(next_id("cus"));
        }
        Ok(self.store.insert_customer(customer)?)
    }

    pub fn register_product(&self, mut product: Product) -> Result<Product, CatalogError> {
        let company = self.company(&product.company)?;
        ensure_quota(self.store.as_ref(), &company, QuotaKind::Product, today())?;
        if product.pvp < Decimal::ZERO || product.price < Decimal::ZERO {
            return Err(CatalogError::Invalid("prices cannot be negative".into()));
        }
        if product.id.0.is_empty() {
            product.id = ProductId(next_id("prd"));
        }
        Ok(self.store.insert_product(product)?)
    }

    pub fn register_category(&self, company: &CompanyId, name: &str) -> Result<Category, CatalogError> {
        self.company(company)?;
        let category = Category {
            id: CategoryId(next_id("cat")),
            company: company.clone(),
            name: name.trim().to_string(),
        };
        Ok(self.store.insert_category(category)?)
    }

    pub fn register_provider(&self, mut provider: Provider) -> Result<Provider, CatalogError> {
        self.company(&provider.company)?;
        if provider.id.0.is_empty() {
            provider.id = ProviderId(next_id("prv"));
        }
        Ok(self.store.insert_provider(provider)?)
    }

    /// Sale price of a product on `day`, honoring the company's promotions.
    pub fn product_price(&self, id: &ProductId, day: NaiveDate) -> Result<Decimal, CatalogError> {
        let product = self.store.product(id)?.ok_or(RepositoryError::NotFound)?;
        let promotions = self.store.promotions(&product.company)?;
        Ok(product.current_price(&promotions, day))
    }
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown company {0}")]
    UnknownCompany(String),
    #[error("invalid catalog entry: {0}")]
    Invalid(String),
    #[error(transparent)]
    Validation(#[from] CompanyValidationError),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
