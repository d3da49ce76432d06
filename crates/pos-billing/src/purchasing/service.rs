use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use super::domain::{Purchase, PurchaseDraft, PurchaseId, PurchaseLineInput};
use crate::accounts::{AccountId, AccountKind, Counterparty, DebtAccount};
use crate::billing::totals::line_amount;
use crate::catalog::choices::PaymentType;
use crate::catalog::CompanyId;
use crate::store::{PurchaseStore, RepositoryError};

static PURCHASE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let id = PURCHASE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    #[error("unknown company {0}")]
    UnknownCompany(String),
    #[error("unknown provider {0}")]
    UnknownProvider(String),
    #[error("invalid purchase: {0}")]
    Invalid(String),
    #[error("purchase {0} has payments recorded and cannot be deleted")]
    HasPayments(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Records purchases, moving stock and opening payables for credit purchases.
pub struct PurchaseService<S> {
    store: Arc<S>,
}

impl<S> PurchaseService<S>
where
    S: PurchaseStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn record(&self, draft: PurchaseDraft) -> Result<Purchase, PurchaseError> {
        let company = self
            .store
            .company(&draft.company)?
            .ok_or_else(|| PurchaseError::UnknownCompany(draft.company.0.clone()))?;
        self.store
            .provider(&draft.provider)?
            .ok_or_else(|| PurchaseError::UnknownProvider(draft.provider.0.clone()))?;
        if draft.lines.is_empty() {
            return Err(PurchaseError::Invalid("a purchase needs at least one line".into()));
        }
        let out_of_range = |line: &&PurchaseLineInput| {
            line.price < Decimal::ZERO || line_amount(line.price, line.quantity).is_none()
        };
        if let Some(line) = draft.lines.iter().find(out_of_range) {
            return Err(PurchaseError::Invalid(format!(
                "quantity or cost for product {} is out of range",
                line.product.0
            )));
        }
        if matches!(draft.end_credit, Some(end) if end < draft.date_joined) {
            return Err(PurchaseError::Invalid("credit end date precedes the purchase".into()));
        }

        let purchase = Purchase::from_draft(PurchaseId(next_id("pur")), draft, company.tax_rate());
        let purchase = self.store.insert_purchase(purchase)?;

        for line in &purchase.lines {
            self.store.adjust_stock(&line.product, line.quantity)?;
        }

        if purchase.payment_type == PaymentType::Credit {
            let account = DebtAccount::open(
                AccountId(next_id("acc")),
                purchase.company.clone(),
                AccountKind::Payable,
                Counterparty::Provider(purchase.provider.clone()),
                purchase.id.0.clone(),
                purchase.date_joined,
                purchase.end_credit,
                purchase.total,
            );
            self.store.insert_account(account)?;
        }

        info!(
            purchase = %purchase.id.0,
            company = %purchase.company.0,
            total = %purchase.total,
            "purchase recorded"
        );
        Ok(purchase)
    }

    /// Removes a purchase and takes its stock back out. Purchases whose payable already has
    /// payments stay.
    pub fn delete(&self, id: &PurchaseId) -> Result<Purchase, PurchaseError> {
        let purchase = self.store.purchase(id)?.ok_or(RepositoryError::NotFound)?;
        if let Some(account) = self.store.account_for_document(&purchase.id.0)? {
            if !account.payments.is_empty() {
                return Err(PurchaseError::HasPayments(purchase.id.0.clone()));
            }
            self.store.delete_account(&account.id)?;
        }
        let purchase = self.store.delete_purchase(id)?;
        for line in &purchase.lines {
            self.store.adjust_stock(&line.product, -line.quantity)?;
        }
        info!(purchase = %purchase.id.0, "purchase deleted; stock reverted");
        Ok(purchase)
    }

    pub fn purchases(&self, company: &CompanyId) -> Result<Vec<Purchase>, PurchaseError> {
        Ok(self.store.purchases_for(company)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::accounts::{AccountKind, AccountsRepository, AccountsService};
    use crate::catalog::choices::EnvironmentType;
    use crate::catalog::{CatalogRepository, Company, Product, ProductId, Provider, ProviderId};
    use crate::purchasing::{PurchaseDraft, PurchaseLineInput};
    use crate::store::InMemoryStore;

    fn company_id() -> CompanyId {
        CompanyId("cmp-costa".to_string())
    }

    fn store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .save_company(Company {
                id: company_id(),
                owner: None,
                ruc: "0990011122001".to_string(),
                company_name: "Ferretería Costa".to_string(),
                commercial_name: "Costa".to_string(),
                main_address: "Guayaquil".to_string(),
                establishment_address: "Guayaquil".to_string(),
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
            .insert_provider(Provider {
                id: ProviderId("prv-acero".to_string()),
                company: company_id(),
                name: "Aceros del Pacífico".to_string(),
                ruc: "0991234567001".to_string(),
                mobile: None,
                address: None,
                email: None,
            })
            .expect("provider");
        store
            .insert_product(Product {
                id: ProductId("prd-clavo".to_string()),
                company: company_id(),
                category: None,
                code: "CLV-2".to_string(),
                name: "Clavos 2\"".to_string(),
                price: Decimal::new(150, 2),
                pvp: Decimal::new(250, 2),
                has_tax: true,
                is_inventoried: true,
                stock: 4,
            })
            .expect("product");
        store
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 2).expect("valid date")
    }

    fn draft(payment_type: PaymentType) -> PurchaseDraft {
        PurchaseDraft {
            company: company_id(),
            number: "001-001-000004512".to_string(),
            provider: ProviderId("prv-acero".to_string()),
            payment_type,
            date_joined: day(),
            end_credit: Some(day() + chrono::Duration::days(45)),
            lines: vec![PurchaseLineInput {
                product: ProductId("prd-clavo".to_string()),
                quantity: 20,
                price: Decimal::new(150, 2),
            }],
        }
    }

    fn stock(store: &InMemoryStore) -> i64 {
        store
            .product(&ProductId("prd-clavo".to_string()))
            .expect("lookup")
            .expect("product")
            .stock
    }

    #[test]
    fn cash_purchase_adds_stock_only() {
        let store = store();
        let service = PurchaseService::new(store.clone());

        let purchase = service.record(draft(PaymentType::Cash)).expect("recorded");

        assert_eq!(purchase.subtotal, Decimal::new(3000, 2));
        assert_eq!(purchase.total_tax, Decimal::new(450, 2));
        assert_eq!(purchase.total, Decimal::new(3450, 2));
        assert_eq!(stock(&store), 24);
        assert!(store
            .account_for_document(&purchase.id.0)
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn credit_purchase_opens_a_payable_until_its_due_date() {
        let store = store();
        let service = PurchaseService::new(store.clone());

        let purchase = service.record(draft(PaymentType::Credit)).expect("recorded");

        let account = store
            .account_for_document(&purchase.id.0)
            .expect("lookup")
            .expect("payable");
        assert_eq!(account.kind, AccountKind::Payable);
        assert_eq!(account.debt, purchase.total);
        assert_eq!(account.end_date, day() + chrono::Duration::days(45));
        assert_eq!(
            account.counterparty,
            crate::accounts::Counterparty::Provider(ProviderId("prv-acero".to_string()))
        );
    }

    #[test]
    fn same_provider_number_is_recorded_once() {
        let store = store();
        let service = PurchaseService::new(store.clone());
        service.record(draft(PaymentType::Cash)).expect("recorded");

        let err = service.record(draft(PaymentType::Cash)).expect_err("duplicate");
        assert!(matches!(err, PurchaseError::Repository(RepositoryError::Conflict)));
        assert_eq!(stock(&store), 24);
    }

    #[test]
    fn invalid_drafts_are_refused() {
        let service = PurchaseService::new(store());

        let mut empty = draft(PaymentType::Cash);
        empty.lines.clear();
        assert!(matches!(service.record(empty), Err(PurchaseError::Invalid(_))));

        let mut early = draft(PaymentType::Credit);
        early.end_credit = Some(day() - chrono::Duration::days(1));
        assert!(matches!(service.record(early), Err(PurchaseError::Invalid(_))));

        let mut oversized = draft(PaymentType::Cash);
        oversized.lines[0].quantity = i64::MAX;
        oversized.lines[0].price = Decimal::new(100_000_000_000, 0);
        assert!(matches!(service.record(oversized), Err(PurchaseError::Invalid(_))));

        let mut stranger = draft(PaymentType::Cash);
        stranger.provider = ProviderId("prv-ghost".to_string());
        assert!(matches!(
            service.record(stranger),
            Err(PurchaseError::UnknownProvider(_))
        ));
    }

    #[test]
    fn deleting_reverts_stock_and_payable() {
        let store = store();
        let service = PurchaseService::new(store.clone());
        let purchase = service.record(draft(PaymentType::Credit)).expect("recorded");

        service.delete(&purchase.id).expect("deleted");

        assert_eq!(stock(&store), 4);
        assert!(store
            .account_for_document(&purchase.id.0)
            .expect("lookup")
            .is_none());
        assert!(service.purchases(&company_id()).expect("list").is_empty());
    }

    #[test]
    fn paid_purchases_cannot_be_deleted() {
        let store = store();
        let service = PurchaseService::new(store.clone());
        let purchase = service.record(draft(PaymentType::Credit)).expect("recorded");
        let account = store
            .account_for_document(&purchase.id.0)
            .expect("lookup")
            .expect("payable");
        AccountsService::new(store.clone())
            .pay(&account.id, day(), Decimal::new(1000, 2), None)
            .expect("paid");

        let err = service.delete(&purchase.id).expect_err("has payments");
        assert!(matches!(err, PurchaseError::HasPayments(_)));
        assert_eq!(stock(&store), 24);
    }
}
