use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::RepositoryError;
use crate::accounts::{AccountId, AccountKind, AccountsRepository, DebtAccount};
use crate::billing::document::{CreditNote, CreditNoteId, Invoice, InvoiceId};
use crate::billing::receipt::{Receipt, ReceiptKey, ReceiptRepository};
use crate::billing::receipt_error::{ReceiptErrorRecord, ReceiptErrorRepository};
use crate::billing::repository::DocumentRepository;
use crate::catalog::{
    CatalogRepository, Category, CategoryId, Company, CompanyId, Customer, CustomerId, Product,
    ProductId, Promotion, PromotionId, Provider, ProviderId, UserId,
};
use crate::purchasing::{Purchase, PurchaseId, PurchaseRepository};
use crate::quotation::{Quotation, QuotationId, QuotationRepository};
use crate::subscription::{Plan, PlanId, QuotaKind, Subscription, SubscriptionId, SubscriptionRepository, UsageCounter};

#[derive(Default)]
struct Tables {
    companies: BTreeMap<CompanyId, Company>,
    customers: HashMap<CustomerId, Customer>,
    products: BTreeMap<ProductId, Product>,
    categories: HashMap<CategoryId, Category>,
    providers: HashMap<ProviderId, Provider>,
    promotions: HashMap<PromotionId, Promotion>,
    receipts: HashMap<ReceiptKey, Receipt>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    credit_notes: BTreeMap<CreditNoteId, CreditNote>,
    receipt_errors: Vec<ReceiptErrorRecord>,
    accounts: HashMap<AccountId, DebtAccount>,
    purchases: HashMap<PurchaseId, Purchase>,
    quotations: HashMap<QuotationId, Quotation>,
    plans: HashMap<PlanId, Plan>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

/// Process-local store backing every repository seam. Clones share the same tables.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".into()))
    }
}

fn same_value(left: &Option<String>, right: &Option<String>) -> bool {
    match (left.as_deref().map(str::trim), right.as_deref().map(str::trim)) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// Another invoice of the same receipt already carries this number.
fn number_taken(tables: &Tables, invoice: &Invoice) -> bool {
    let Some(number) = invoice.header.receipt_number else {
        return false;
    };
    tables.invoices.values().any(|other| {
        other.id != invoice.id
            && other.header.receipt == invoice.header.receipt
            && other.header.receipt_number == Some(number)
    })
}

impl CatalogRepository for InMemoryStore {
    fn company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.lock()?.companies.get(id).cloned())
    }

    fn save_company(&self, company: Company) -> Result<(), RepositoryError> {
        self.lock()?.companies.insert(company.id.clone(), company);
        Ok(())
    }

    fn insert_customer(&self, customer: Customer) -> Result<Customer, RepositoryError> {
        let mut tables = self.lock()?;
        let duplicate = tables.customers.values().any(|other| {
            other.id == customer.id
                || (other.company == customer.company
                    && (same_value(&other.ruc, &customer.ruc) || same_value(&other.dni, &customer.dni)))
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    fn customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        Ok(self.lock()?.customers.get(id).cloned())
    }

    fn insert_product(&self, product: Product) -> Result<Product, RepositoryError> {
        let mut tables = self.lock()?;
        let duplicate = tables.products.values().any(|other| {
            other.id == product.id || (other.company == product.company && other.code == product.code)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.products.insert(product.id.clone(), product.clone());
        Ok(product)
    }

    fn product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock()?.products.get(id).cloned())
    }

    fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let product = tables.products.get_mut(id).ok_or(RepositoryError::NotFound)?;
        product.adjust_stock(delta);
        Ok(())
    }

    fn insert_category(&self, category: Category) -> Result<Category, RepositoryError> {
        let mut tables = self.lock()?;
        let duplicate = tables.categories.values().any(|other| {
            other.id == category.id
                || (other.company == category.company && other.name.eq_ignore_ascii_case(&category.name))
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.categories.insert(category.id.clone(), category.clone());
        Ok(category)
    }

    fn insert_provider(&self, provider: Provider) -> Result<Provider, RepositoryError> {
        let mut tables = self.lock()?;
        let duplicate = tables.providers.values().any(|other| {
            other.id == provider.id || (other.company == provider.company && other.ruc == provider.ruc)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.providers.insert(provider.id.clone(), provider.clone());
        Ok(provider)
    }

    fn provider(&self, id: &ProviderId) -> Result<Option<Provider>, RepositoryError> {
        Ok(self.lock()?.providers.get(id).cloned())
    }

    fn save_promotion(&self, promotion: Promotion) -> Result<(), RepositoryError> {
        self.lock()?.promotions.insert(promotion.id.clone(), promotion);
        Ok(())
    }

    fn promotions(&self, company: &CompanyId) -> Result<Vec<Promotion>, RepositoryError> {
        Ok(self
            .lock()?
            .promotions
            .values()
            .filter(|promotion| &promotion.company == company)
            .cloned()
            .collect())
    }
}

impl ReceiptRepository for InMemoryStore {
    fn receipt(&self, key: &ReceiptKey) -> Result<Option<Receipt>, RepositoryError> {
        Ok(self.lock()?.receipts.get(key).cloned())
    }

    fn receipts_for(&self, company: &CompanyId) -> Result<Vec<Receipt>, RepositoryError> {
        let mut receipts: Vec<Receipt> = self
            .lock()?
            .receipts
            .values()
            .filter(|receipt| &receipt.key.company == company)
            .cloned()
            .collect();
        receipts.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(receipts)
    }

    fn insert_receipt(&self, receipt: Receipt) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if tables.receipts.contains_key(&receipt.key) {
            return Err(RepositoryError::Conflict);
        }
        tables.receipts.insert(receipt.key.clone(), receipt);
        Ok(())
    }

    fn swap_sequence(&self, key: &ReceiptKey, expected: u64, new: u64) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let receipt = tables.receipts.get_mut(key).ok_or(RepositoryError::NotFound)?;
        if receipt.sequence != expected {
            return Err(RepositoryError::Stale {
                expected,
                found: receipt.sequence,
            });
        }
        receipt.sequence = new;
        Ok(())
    }

    fn rekey_receipt(&self, from: &ReceiptKey, to: ReceiptKey) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if tables.receipts.contains_key(&to) {
            return Err(RepositoryError::Conflict);
        }
        let mut receipt = tables.receipts.remove(from).ok_or(RepositoryError::NotFound)?;
        receipt.key = to.clone();
        tables.receipts.insert(to, receipt);
        Ok(())
    }
}

impl DocumentRepository for InMemoryStore {
    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.invoices.contains_key(&invoice.id) || number_taken(&tables, &invoice) {
            return Err(RepositoryError::Conflict);
        }
        tables.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice)
    }

    fn update_invoice(&self, invoice: Invoice) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.invoices.contains_key(&invoice.id) {
            return Err(RepositoryError::NotFound);
        }
        if number_taken(&tables, &invoice) {
            return Err(RepositoryError::Conflict);
        }
        tables.invoices.insert(invoice.id.clone(), invoice);
        Ok(())
    }

    fn invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        Ok(self.lock()?.invoices.get(id).cloned())
    }

    fn insert_credit_note(&self, note: CreditNote) -> Result<CreditNote, RepositoryError> {
        let mut tables = self.lock()?;
        let duplicate = tables.credit_notes.values().any(|other| {
            other.id == note.id
                || (other.header.receipt == note.header.receipt
                    && other.header.receipt_number.is_some()
                    && other.header.receipt_number == note.header.receipt_number)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.credit_notes.insert(note.id.clone(), note.clone());
        Ok(note)
    }

    fn credit_note(&self, id: &CreditNoteId) -> Result<Option<CreditNote>, RepositoryError> {
        Ok(self.lock()?.credit_notes.get(id).cloned())
    }

    fn credit_notes_for(&self, invoice: &InvoiceId) -> Result<Vec<CreditNote>, RepositoryError> {
        Ok(self
            .lock()?
            .credit_notes
            .values()
            .filter(|note| &note.invoice == invoice)
            .cloned()
            .collect())
    }
}

impl ReceiptErrorRepository for InMemoryStore {
    fn record_receipt_error(&self, record: ReceiptErrorRecord) -> Result<(), RepositoryError> {
        self.lock()?.receipt_errors.push(record);
        Ok(())
    }

    fn receipt_errors(&self, company: &CompanyId) -> Result<Vec<ReceiptErrorRecord>, RepositoryError> {
        let tables = self.lock()?;
        let mut records: Vec<ReceiptErrorRecord> = tables
            .receipt_errors
            .iter()
            .rev()
            .filter(|record| &record.receipt.company == company)
            .cloned()
            .collect();
        // stable sort: entries logged within the same second stay newest first
        records.sort_by(|a, b| b.recorded_at().cmp(&a.recorded_at()));
        Ok(records)
    }
}

impl AccountsRepository for InMemoryStore {
    fn insert_account(&self, account: DebtAccount) -> Result<DebtAccount, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.accounts.contains_key(&account.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    fn update_account(&self, account: DebtAccount) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match tables.accounts.get_mut(&account.id) {
            Some(slot) => {
                *slot = account;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn account(&self, id: &AccountId) -> Result<Option<DebtAccount>, RepositoryError> {
        Ok(self.lock()?.accounts.get(id).cloned())
    }

    fn accounts_for(&self, company: &CompanyId, kind: AccountKind) -> Result<Vec<DebtAccount>, RepositoryError> {
        let mut accounts: Vec<DebtAccount> = self
            .lock()?
            .accounts
            .values()
            .filter(|account| &account.company == company && account.kind == kind)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.date_joined.cmp(&b.date_joined).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(accounts)
    }

    fn account_for_document(&self, document: &str) -> Result<Option<DebtAccount>, RepositoryError> {
        Ok(self
            .lock()?
            .accounts
            .values()
            .find(|account| account.document == document)
            .cloned())
    }

    fn delete_account(&self, id: &AccountId) -> Result<(), RepositoryError> {
        self.lock()?
            .accounts
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl PurchaseRepository for InMemoryStore {
    fn insert_purchase(&self, purchase: Purchase) -> Result<Purchase, RepositoryError> {
        let mut tables = self.lock()?;
        let duplicate = tables.purchases.values().any(|other| {
            other.id == purchase.id
                || (other.company == purchase.company
                    && other.provider == purchase.provider
                    && other.number == purchase.number)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.purchases.insert(purchase.id.clone(), purchase.clone());
        Ok(purchase)
    }

    fn purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>, RepositoryError> {
        Ok(self.lock()?.purchases.get(id).cloned())
    }

    fn purchases_for(&self, company: &CompanyId) -> Result<Vec<Purchase>, RepositoryError> {
        let mut purchases: Vec<Purchase> = self
            .lock()?
            .purchases
            .values()
            .filter(|purchase| &purchase.company == company)
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.date_joined.cmp(&a.date_joined));
        Ok(purchases)
    }

    fn delete_purchase(&self, id: &PurchaseId) -> Result<Purchase, RepositoryError> {
        self.lock()?.purchases.remove(id).ok_or(RepositoryError::NotFound)
    }
}

impl QuotationRepository for InMemoryStore {
    fn insert_quotation(&self, quotation: Quotation) -> Result<Quotation, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.quotations.contains_key(&quotation.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.quotations.insert(quotation.id.clone(), quotation.clone());
        Ok(quotation)
    }

    fn update_quotation(&self, quotation: Quotation) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match tables.quotations.get_mut(&quotation.id) {
            Some(slot) => {
                *slot = quotation;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn quotation(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        Ok(self.lock()?.quotations.get(id).cloned())
    }

    fn quotations_for(&self, company: &CompanyId) -> Result<Vec<Quotation>, RepositoryError> {
        let mut quotations: Vec<Quotation> = self
            .lock()?
            .quotations
            .values()
            .filter(|quotation| &quotation.company == company)
            .cloned()
            .collect();
        quotations.sort_by_key(|quotation| quotation.number);
        Ok(quotations)
    }
}

impl SubscriptionRepository for InMemoryStore {
    fn plans(&self) -> Result<Vec<Plan>, RepositoryError> {
        Ok(self.lock()?.plans.values().cloned().collect())
    }

    fn plan(&self, id: &PlanId) -> Result<Option<Plan>, RepositoryError> {
        Ok(self.lock()?.plans.get(id).cloned())
    }

    fn save_plan(&self, plan: Plan) -> Result<(), RepositoryError> {
        self.lock()?.plans.insert(plan.id.clone(), plan);
        Ok(())
    }

    fn subscriptions_for(&self, owner: &UserId) -> Result<Vec<Subscription>, RepositoryError> {
        Ok(self
            .lock()?
            .subscriptions
            .values()
            .filter(|subscription| &subscription.owner == owner)
            .cloned()
            .collect())
    }

    fn save_subscription(&self, subscription: Subscription) -> Result<(), RepositoryError> {
        self.lock()?.subscriptions.insert(subscription.id.clone(), subscription);
        Ok(())
    }
}

impl UsageCounter for InMemoryStore {
    fn usage(&self, company: &CompanyId, kind: QuotaKind) -> Result<u64, RepositoryError> {
        let tables = self.lock()?;
        let count = match kind {
            QuotaKind::Invoice => tables
                .invoices
                .values()
                .filter(|invoice| &invoice.header.company == company)
                .count(),
            QuotaKind::Customer => tables
                .customers
                .values()
                .filter(|customer| &customer.company == company)
                .count(),
            QuotaKind::Product => tables
                .products
                .values()
                .filter(|product| &product.company == company)
                .count(),
        };
        Ok(count as u64)
    }
}
