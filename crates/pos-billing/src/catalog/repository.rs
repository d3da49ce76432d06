use super::company::{Company, CompanyId};
use super::customer::{Customer, CustomerId};
use super::product::{Category, Product, ProductId};
use super::promotion::Promotion;
use super::provider::{Provider, ProviderId};
use crate::store::RepositoryError;

/// Storage abstraction for tenant master data.
pub trait CatalogRepository: Send + Sync {
    fn company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn save_company(&self, company: Company) -> Result<(), RepositoryError>;

    /// Conflicts when the company already has a customer with the same RUC or cédula.
    fn insert_customer(&self, customer: Customer) -> Result<Customer, RepositoryError>;
    fn customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;

    /// Conflicts on a duplicate product code.
    fn insert_product(&self, product: Product) -> Result<Product, RepositoryError>;
    fn product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    /// Applies `delta` to the stock of an inventoried product atomically.
    fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<(), RepositoryError>;

    fn insert_category(&self, category: Category) -> Result<Category, RepositoryError>;
    fn insert_provider(&self, provider: Provider) -> Result<Provider, RepositoryError>;
    fn provider(&self, id: &ProviderId) -> Result<Option<Provider>, RepositoryError>;

    fn save_promotion(&self, promotion: Promotion) -> Result<(), RepositoryError>;
    fn promotions(&self, company: &CompanyId) -> Result<Vec<Promotion>, RepositoryError>;
}
